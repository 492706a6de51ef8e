// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Compute device and precision resolution
//!
//! The device is resolved exactly once, when the host is constructed, and
//! applied to both backends. Nothing here is re-evaluated per request.

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::backend::BackendId;
use super::error::CaptionError;

/// Device requested by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// GPU when one is available at construction time, CPU otherwise
    #[default]
    Auto,
    Cpu,
    #[serde(alias = "cuda")]
    Gpu,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "gpu" | "cuda" => Ok(Self::Gpu),
            other => Err(format!(
                "unknown device '{}', expected one of: auto, cpu, gpu",
                other
            )),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        };
        f.write_str(s)
    }
}

/// Device a backend is bound to after resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Gpu,
}

impl ComputeDevice {
    pub fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu)
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Gpu => f.write_str("gpu"),
        }
    }
}

/// Numeric width used for model computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// float32
    Full,
    /// float16
    Half,
}

impl Precision {
    /// BLIP-2 runs in half precision on GPU; everything else stays in float32.
    pub fn for_backend(backend: BackendId, device: ComputeDevice) -> Self {
        match (backend, device) {
            (BackendId::Blip2, ComputeDevice::Gpu) => Self::Half,
            _ => Self::Full,
        }
    }

    /// File name suffix of the ONNX export matching this precision
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Full => "",
            Self::Half => "_fp16",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("fp32"),
            Self::Half => f.write_str("fp16"),
        }
    }
}

/// Probe ONNX Runtime for a usable CUDA execution provider
pub fn gpu_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => {
            debug!("CUDA execution provider available: {}", available);
            available
        }
        Err(e) => {
            warn!("Failed to probe CUDA execution provider: {}", e);
            false
        }
    }
}

/// Resolve a preference against the GPU probe result.
///
/// An explicit `gpu` request on a machine without a usable GPU fails here,
/// at construction, instead of on the first generation call.
pub fn resolve_device(
    preference: DevicePreference,
    gpu_available: bool,
) -> Result<ComputeDevice, CaptionError> {
    match preference {
        DevicePreference::Auto if gpu_available => Ok(ComputeDevice::Gpu),
        DevicePreference::Auto => Ok(ComputeDevice::Cpu),
        DevicePreference::Cpu => Ok(ComputeDevice::Cpu),
        DevicePreference::Gpu if gpu_available => Ok(ComputeDevice::Gpu),
        DevicePreference::Gpu => Err(CaptionError::DeviceUnavailable),
    }
}

/// Device and per-backend precision, resolved once for the whole host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDevices {
    pub device: ComputeDevice,
    pub blip: Precision,
    pub blip2: Precision,
}

impl HostDevices {
    pub fn resolve(preference: DevicePreference, gpu_available: bool) -> Result<Self, CaptionError> {
        let device = resolve_device(preference, gpu_available)?;
        Ok(Self::for_device(device))
    }

    pub fn for_device(device: ComputeDevice) -> Self {
        Self {
            device,
            blip: Precision::for_backend(BackendId::Blip, device),
            blip2: Precision::for_backend(BackendId::Blip2, device),
        }
    }

    pub fn precision(&self, backend: BackendId) -> Precision {
        match backend {
            BackendId::Blip => self.blip,
            BackendId::Blip2 => self.blip2,
        }
    }
}
