// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption response types

use serde::{Deserialize, Serialize};

use super::request::CaptionMode;
use crate::vision::ComputeDevice;

/// Captions keyed by backend; absent keys were not requested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Captions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blip2: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionResponse {
    pub mode: CaptionMode,
    pub captions: Captions,
    /// Device both backends run on
    pub device: ComputeDevice,
    /// Decode plus generation time in milliseconds
    pub processing_time_ms: u64,
}
