// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Typed failures surfaced by the caption host

use thiserror::Error;

use super::backend::BackendId;
use super::image_utils::ImageError;

/// Errors returned by [`CaptionHost`](super::CaptionHost) operations.
///
/// Nothing is retried or swallowed inside the host: every failure reaches
/// the caller as one of these variants.
#[derive(Debug, Error)]
pub enum CaptionError {
    /// A backend's artifacts could not be obtained or initialized.
    #[error("Failed to load {backend} backend: {message}")]
    BackendLoad { backend: BackendId, message: String },

    /// GPU was requested explicitly but no CUDA device is usable.
    #[error("GPU requested but no CUDA execution provider is available")]
    DeviceUnavailable,

    /// The caller-supplied image could not be normalized to RGB.
    #[error("Image decode failed: {0}")]
    ImageDecode(#[from] ImageError),

    /// Prompt was empty or whitespace only.
    #[error("Prompt for {backend} must not be empty")]
    InvalidPrompt { backend: BackendId },

    /// The underlying runtime or tokenizer failed during generation.
    #[error("{backend} generation failed: {message}")]
    Generation { backend: BackendId, message: String },
}

impl CaptionError {
    pub(crate) fn load(backend: BackendId, err: anyhow::Error) -> Self {
        Self::BackendLoad {
            backend,
            message: format!("{:#}", err),
        }
    }

    pub(crate) fn generation(backend: BackendId, err: anyhow::Error) -> Self {
        Self::Generation {
            backend,
            message: format!("{:#}", err),
        }
    }

    /// True for failures that happen while constructing the host.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::BackendLoad { .. } | Self::DeviceUnavailable)
    }
}
