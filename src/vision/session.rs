// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session construction and tensor conversion helpers

use anyhow::{Context, Result};
use half::f16;
use ndarray::{Array, ArrayD, Dimension};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{DynValue, Value, ValueType};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::device::{ComputeDevice, Precision};

/// Intra-op threads for every session
const INTRA_THREADS: usize = 4;

/// Session shared between clones of a model component
pub type SharedSession = Arc<Mutex<Session>>;

/// Load an ONNX graph bound to `device`.
///
/// The CUDA provider is registered with `error_on_failure`, so a GPU-bound
/// session never silently falls back to CPU.
pub fn load_session(model_path: &Path, device: ComputeDevice) -> Result<SharedSession> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model not found: {}", model_path.display());
    }

    debug!("Loading {} on {}", model_path.display(), device);

    let builder = Session::builder().context("Failed to create session builder")?;
    let builder = match device {
        ComputeDevice::Gpu => builder
            .with_execution_providers([CUDAExecutionProvider::default()
                .build()
                .error_on_failure()])
            .context("Failed to set CUDA execution provider")?,
        ComputeDevice::Cpu => builder
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?,
    };

    let session = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(INTRA_THREADS)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

    let input_names: Vec<_> = session.inputs.iter().map(|i| &i.name).collect();
    info!(
        "Loaded {} ({}), inputs: {:?}",
        model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        device,
        input_names
    );

    Ok(Arc::new(Mutex::new(session)))
}

/// Lock a shared session, turning poisoning into an error
pub fn lock(session: &SharedSession) -> Result<MutexGuard<'_, Session>> {
    session
        .lock()
        .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned by an earlier panic"))
}

/// Element type the graph expects for its first floating-point input.
///
/// Half-precision exports usually keep fp16 inputs, but some keep fp32 at
/// the boundary; asking the graph avoids guessing.
pub fn float_input_precision(session: &Session, fallback: Precision) -> Precision {
    session
        .inputs
        .iter()
        .find_map(|input| match &input.input_type {
            ValueType::Tensor { ty, .. } => match ty {
                TensorElementType::Float16 => Some(Precision::Half),
                TensorElementType::Float32 => Some(Precision::Full),
                _ => None,
            },
            _ => None,
        })
        .unwrap_or(fallback)
}

/// Build a floating-point input tensor in the requested precision
pub fn float_tensor<D: Dimension + 'static>(
    array: Array<f32, D>,
    precision: Precision,
) -> Result<DynValue> {
    let value = match precision {
        Precision::Full => Value::from_array(array)
            .context("Failed to create f32 tensor")?
            .into_dyn(),
        Precision::Half => Value::from_array(array.mapv(f16::from_f32))
            .context("Failed to create f16 tensor")?
            .into_dyn(),
    };
    Ok(value)
}

/// Build an i64 input tensor (token ids, attention masks)
pub fn int_tensor<D: Dimension + 'static>(array: Array<i64, D>) -> Result<DynValue> {
    Ok(Value::from_array(array)
        .context("Failed to create i64 tensor")?
        .into_dyn())
}

/// Copy a floating-point output into an owned f32 array, whatever its width
pub fn extract_f32(value: &DynValue) -> Result<ArrayD<f32>> {
    if let Ok(view) = value.try_extract_array::<f32>() {
        return Ok(view.to_owned());
    }
    let view = value
        .try_extract_array::<f16>()
        .context("Output tensor is neither f32 nor f16")?;
    Ok(view.mapv(f16::to_f32))
}
