// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Captioning backend abstraction
//!
//! A backend is one pretrained model pairing (preprocessor, encoder,
//! generator, tokenizer) bound to a device at load time.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::device::{ComputeDevice, Precision};

/// Default prompt for BLIP: a short cue phrase
pub const DEFAULT_BLIP_PROMPT: &str = "a photography of";

/// Default prompt for BLIP-2: a free-form instruction
pub const DEFAULT_BLIP2_PROMPT: &str = "Describe this image in detail with at least three sentences.";

/// Default cap on tokens generated by BLIP-2
pub const DEFAULT_MAX_NEW_TOKENS: usize = 200;

/// BLIP's total sequence length cap (prompt included), from its generation config
pub const BLIP_MAX_LENGTH: usize = 20;

/// Identifies one of the two backends owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Backend A
    Blip,
    /// Backend B
    Blip2,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::Blip, BackendId::Blip2];

    /// Key used on the wire (`blip`, `blip2`)
    pub fn key(&self) -> &'static str {
        match self {
            Self::Blip => "blip",
            Self::Blip2 => "blip2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Blip => "BLIP",
            Self::Blip2 => "BLIP-2",
        }
    }

    pub fn default_prompt(&self) -> &'static str {
        match self {
            Self::Blip => DEFAULT_BLIP_PROMPT,
            Self::Blip2 => DEFAULT_BLIP2_PROMPT,
        }
    }

    /// Hugging Face repository of the original weights
    pub fn upstream_model(&self) -> &'static str {
        match self {
            Self::Blip => "Salesforce/blip-image-captioning-large",
            Self::Blip2 => "Salesforce/blip2-flan-t5-xl",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blip" | "a" => Ok(Self::Blip),
            "blip2" | "blip-2" | "b" => Ok(Self::Blip2),
            other => Err(format!("unknown backend '{}', expected blip or blip2", other)),
        }
    }
}

/// Per-backend generation settings, fixed at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Device every request to this backend runs on
    pub device: ComputeDevice,
    /// Numeric precision of the loaded graphs
    pub precision: Precision,
    /// Default cap on generated tokens when the caller gives none
    pub max_new_tokens: usize,
    /// Total sequence cap including the prompt (0 = no cap)
    pub max_length: usize,
    /// Square input resolution of the vision encoder
    pub image_size: u32,
}

impl BackendConfig {
    pub fn for_backend(backend: BackendId, device: ComputeDevice) -> Self {
        let precision = Precision::for_backend(backend, device);
        match backend {
            BackendId::Blip => Self {
                device,
                precision,
                max_new_tokens: BLIP_MAX_LENGTH,
                max_length: BLIP_MAX_LENGTH,
                image_size: 384,
            },
            BackendId::Blip2 => Self {
                device,
                precision,
                max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
                max_length: 0,
                image_size: 224,
            },
        }
    }
}

/// Loaded captioning model.
///
/// Implementations take `&self` so a single instance can be shared behind
/// an `Arc`; any interior runtime state must be synchronized internally.
#[cfg_attr(test, mockall::automock)]
pub trait CaptionBackend: Send + Sync {
    fn id(&self) -> BackendId;

    fn config(&self) -> BackendConfig;

    /// Encode `image` with `prompt`, generate, and decode to text.
    ///
    /// `image` is already RGB. `max_new_tokens` is a hint; backends that do
    /// not support it ignore it.
    fn caption(
        &self,
        image: &DynamicImage,
        prompt: &str,
        max_new_tokens: Option<usize>,
    ) -> anyhow::Result<String>;
}

/// Description of a loaded backend, for listings and logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub id: BackendId,
    pub name: String,
    pub upstream_model: String,
    pub device: ComputeDevice,
    pub precision: Precision,
    pub default_prompt: String,
    pub max_new_tokens: usize,
    /// Where the artifacts were loaded from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl BackendInfo {
    pub fn from_backend(backend: &dyn CaptionBackend) -> Self {
        let id = backend.id();
        let config = backend.config();
        Self {
            id,
            name: id.display_name().to_string(),
            upstream_model: id.upstream_model().to_string(),
            device: config.device,
            precision: config.precision,
            default_prompt: id.default_prompt().to_string(),
            max_new_tokens: config.max_new_tokens,
            source: None,
        }
    }
}
