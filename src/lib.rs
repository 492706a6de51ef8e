// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod version;
pub mod vision;

// Re-export the captioning surface
pub use config::HostConfig;
pub use vision::{
    BackendId, CaptionError, CaptionHost, CaptionPair, ComparisonReport, ComputeDevice,
    DevicePreference, ImageSource, Precision,
};
