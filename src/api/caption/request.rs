// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption request types and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::vision::{BackendId, DEFAULT_BLIP2_PROMPT, DEFAULT_BLIP_PROMPT, DEFAULT_MAX_NEW_TOKENS};

/// Supported caption modes
pub const SUPPORTED_MODES: &[&str] = &["blip", "blip2", "both"];

/// Range exposed by the upload page slider
pub const MIN_NEW_TOKENS: usize = 50;
pub const MAX_NEW_TOKENS: usize = 500;

/// Which backend(s) to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionMode {
    Blip,
    Blip2,
    Both,
}

impl CaptionMode {
    pub fn parse(mode: &str) -> Result<Self, ApiError> {
        match mode.trim().to_lowercase().as_str() {
            "blip" => Ok(Self::Blip),
            "blip2" | "blip-2" => Ok(Self::Blip2),
            "both" => Ok(Self::Both),
            other => Err(ApiError::ValidationError {
                field: "mode".to_string(),
                message: format!("unsupported mode '{}', supported: {:?}", other, SUPPORTED_MODES),
            }),
        }
    }

    pub fn backends(&self) -> &'static [BackendId] {
        match self {
            Self::Blip => &[BackendId::Blip],
            Self::Blip2 => &[BackendId::Blip2],
            Self::Both => &BackendId::ALL,
        }
    }
}

fn default_mode() -> String {
    "blip".to_string()
}

fn default_blip_prompt() -> String {
    DEFAULT_BLIP_PROMPT.to_string()
}

fn default_blip2_prompt() -> String {
    DEFAULT_BLIP2_PROMPT.to_string()
}

fn default_max_new_tokens() -> usize {
    DEFAULT_MAX_NEW_TOKENS
}

/// Request for one or two captions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionRequest {
    /// Base64-encoded image data (a `data:` URL prefix is accepted)
    #[serde(default)]
    pub image: Option<String>,

    /// blip, blip2 or both
    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default = "default_blip_prompt")]
    pub blip_prompt: String,

    #[serde(default = "default_blip2_prompt")]
    pub blip2_prompt: String,

    /// BLIP-2 generation cap (50-500)
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
}

impl Default for CaptionRequest {
    fn default() -> Self {
        Self {
            image: None,
            mode: default_mode(),
            blip_prompt: default_blip_prompt(),
            blip2_prompt: default_blip2_prompt(),
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

impl CaptionRequest {
    /// Validate the request, returning the parsed mode
    pub fn validate(&self) -> Result<CaptionMode, ApiError> {
        if self.image.as_ref().map(|s| s.trim().is_empty()).unwrap_or(true) {
            return Err(ApiError::ValidationError {
                field: "image".to_string(),
                message: "image is required".to_string(),
            });
        }

        self.validate_options()
    }

    /// Validate everything except the image payload
    pub fn validate_options(&self) -> Result<CaptionMode, ApiError> {
        let mode = CaptionMode::parse(&self.mode)?;

        if mode.backends().contains(&BackendId::Blip) && self.blip_prompt.trim().is_empty() {
            return Err(ApiError::ValidationError {
                field: "blipPrompt".to_string(),
                message: "blipPrompt must not be empty".to_string(),
            });
        }

        if mode.backends().contains(&BackendId::Blip2) {
            if self.blip2_prompt.trim().is_empty() {
                return Err(ApiError::ValidationError {
                    field: "blip2Prompt".to_string(),
                    message: "blip2Prompt must not be empty".to_string(),
                });
            }
            if !(MIN_NEW_TOKENS..=MAX_NEW_TOKENS).contains(&self.max_new_tokens) {
                return Err(ApiError::ValidationError {
                    field: "maxNewTokens".to_string(),
                    message: format!(
                        "maxNewTokens must be between {} and {}, got {}",
                        MIN_NEW_TOKENS, MAX_NEW_TOKENS, self.max_new_tokens
                    ),
                });
            }
        }

        Ok(mode)
    }
}
