// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Dual-model image captioning
//!
//! This module provides:
//! - BLIP: short captions continuing a cue phrase
//! - BLIP-2 (Flan-T5): longer, instruction-following descriptions
//!
//! Both backends run through ONNX Runtime on a device chosen once when the
//! [`CaptionHost`] is built.

pub mod artifacts;
pub mod backend;
pub mod blip;
pub mod blip2;
pub mod device;
pub mod error;
pub mod generation;
pub mod host;
pub mod image_utils;
pub mod preprocessing;
pub mod session;

pub use artifacts::ModelSource;
pub use backend::{
    BackendConfig, BackendId, BackendInfo, CaptionBackend, DEFAULT_BLIP2_PROMPT,
    DEFAULT_BLIP_PROMPT, DEFAULT_MAX_NEW_TOKENS,
};
pub use device::{ComputeDevice, DevicePreference, HostDevices, Precision};
pub use error::CaptionError;
pub use host::{CaptionHost, CaptionPair, ComparisonReport};
pub use image_utils::{
    decode_base64_payload, decode_image_bytes, decode_image_bytes_with_limit, detect_format,
    load_image, ImageError, ImageSource,
};
