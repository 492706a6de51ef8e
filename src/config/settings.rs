// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Host and API settings
//!
//! Values come from built-in defaults, an optional TOML file and then
//! environment variables, in that order of increasing priority.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::vision::artifacts::ModelSource;
use crate::vision::device::DevicePreference;
use crate::vision::image_utils::MAX_IMAGE_SIZE;

/// Default local export of `Salesforce/blip-image-captioning-large`
pub const DEFAULT_BLIP_DIR: &str = "./models/blip-image-captioning-large-onnx";

/// Default local export of `Salesforce/blip2-flan-t5-xl`
pub const DEFAULT_BLIP2_DIR: &str = "./models/blip2-flan-t5-xl-onnx";

/// Environment variable pointing at a TOML settings file
pub const CONFIG_PATH_ENV: &str = "CAPTION_CONFIG";

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound on an uploaded image, in bytes
    pub max_image_bytes: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_image_bytes: MAX_IMAGE_SIZE,
        }
    }
}

/// Everything needed to build a [`CaptionHost`](crate::vision::CaptionHost)
/// and serve it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub device: DevicePreference,
    pub blip: ModelSource,
    pub blip2: ModelSource,
    pub api: ApiSettings,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            device: DevicePreference::Auto,
            blip: ModelSource::local(DEFAULT_BLIP_DIR),
            blip2: ModelSource::local(DEFAULT_BLIP2_DIR),
            api: ApiSettings::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// File named by `CAPTION_CONFIG` (if set), then environment overrides
    pub fn load() -> Result<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`.
    ///
    /// A `*_MODEL_REPO` variable takes precedence over `*_MODEL_DIR`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(device) = lookup("CAPTION_DEVICE") {
            self.device = device
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Invalid CAPTION_DEVICE: {}", e))?;
        }

        if let Some(source) = source_override(&lookup, "BLIP") {
            self.blip = source;
        }
        if let Some(source) = source_override(&lookup, "BLIP2") {
            self.blip2 = source;
        }

        if let Some(host) = lookup("API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.api.port = port
                .parse()
                .with_context(|| format!("Invalid API_PORT: {}", port))?;
        }
        if let Some(max) = lookup("MAX_IMAGE_BYTES") {
            self.api.max_image_bytes = max
                .parse()
                .with_context(|| format!("Invalid MAX_IMAGE_BYTES: {}", max))?;
        }

        Ok(self)
    }
}

fn source_override<F>(lookup: &F, prefix: &str) -> Option<ModelSource>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(repo) = lookup(&format!("{}_MODEL_REPO", prefix)) {
        return Some(ModelSource::Hub {
            repo,
            revision: lookup(&format!("{}_MODEL_REVISION", prefix)),
        });
    }
    lookup(&format!("{}_MODEL_DIR", prefix)).map(ModelSource::local)
}
