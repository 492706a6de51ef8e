// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and normalization for captioning

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum image size (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Custom error types for image processing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format (expected JPEG or PNG)")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Failed to read image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a caller's image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image held in memory (upload body, decoded base64)
    Bytes(Vec<u8>),
    /// Encoded image on disk
    Path(PathBuf),
}

impl ImageSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Load an image from any source and convert it to 8-bit RGB
pub fn load_image(source: &ImageSource) -> Result<DynamicImage, ImageError> {
    match source {
        ImageSource::Bytes(bytes) => decode_image_bytes(bytes),
        ImageSource::Path(path) => load_image_file(path),
    }
}

/// Read and decode an image file
pub fn load_image_file(path: &Path) -> Result<DynamicImage, ImageError> {
    let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_image_bytes(&bytes)
}

/// Decode raw image bytes into an RGB image, capped at [`MAX_IMAGE_SIZE`]
///
/// # Returns
/// * `Ok(DynamicImage)` - always the `ImageRgb8` variant
/// * `Err(ImageError)` - if the data is empty, too large, not JPEG/PNG, or corrupt
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    decode_image_bytes_with_limit(bytes, MAX_IMAGE_SIZE)
}

/// Same as [`decode_image_bytes`] with a caller-chosen size cap
pub fn decode_image_bytes_with_limit(
    bytes: &[u8],
    max_bytes: usize,
) -> Result<DynamicImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), max_bytes));
    }

    // Detect format from magic bytes
    let format = detect_format(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    Ok(to_rgb(img))
}

/// Decode a base64 payload into raw image bytes (no image decoding)
pub fn decode_base64_payload(base64_str: &str) -> Result<Vec<u8>, ImageError> {
    if base64_str.is_empty() {
        return Err(ImageError::EmptyData);
    }

    // Accept data URLs as produced by browsers
    let payload = match base64_str.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => base64_str,
    };

    let bytes = STANDARD.decode(payload.trim())?;
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }
    Ok(bytes)
}

/// Normalize any color model to 3-channel RGB
pub fn to_rgb(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Detect image format from magic bytes
///
/// Only JPEG and PNG are accepted.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF (JFIF, EXIF and raw variants)
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        _ => Err(ImageError::UnsupportedFormat),
    }
}

/// Check a file name against the accepted upload extensions
pub fn is_supported_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}
