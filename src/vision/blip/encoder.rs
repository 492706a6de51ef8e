// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! BLIP vision transformer
//!
//! Turns a preprocessed image into the patch embeddings the text decoder
//! cross-attends to.

use anyhow::{Context, Result};
use ndarray::{Array3, Array4};
use std::path::Path;
use tracing::debug;

use crate::vision::device::{ComputeDevice, Precision};
use crate::vision::session::{self, SharedSession};

/// BLIP vision encoder (`vision_model.onnx`)
#[derive(Clone)]
pub struct BlipVisionEncoder {
    session: SharedSession,
    input_name: String,
    precision: Precision,
}

impl std::fmt::Debug for BlipVisionEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlipVisionEncoder")
            .field("input_name", &self.input_name)
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

impl BlipVisionEncoder {
    pub fn new(model_path: &Path, device: ComputeDevice, precision: Precision) -> Result<Self> {
        let session = session::load_session(model_path, device)
            .context("Failed to load BLIP vision model")?;

        let (input_name, precision) = {
            let guard = session::lock(&session)?;
            let name = guard
                .inputs
                .first()
                .map(|input| input.name.clone())
                .unwrap_or_else(|| "pixel_values".to_string());
            (name, session::float_input_precision(&guard, precision))
        };

        Ok(Self {
            session,
            input_name,
            precision,
        })
    }

    /// Encode `[1, 3, H, W]` pixels into `[1, patches, hidden]` embeddings
    pub fn encode(&self, pixel_values: Array4<f32>) -> Result<Array3<f32>> {
        let shape = pixel_values.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }

        let input = session::float_tensor(pixel_values, self.precision)?;

        let mut guard = session::lock(&self.session)?;
        let outputs = guard
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("BLIP vision inference failed")?;

        let hidden = session::extract_f32(&outputs[0])?;
        debug!("BLIP image embeddings shape: {:?}", hidden.shape());

        hidden
            .into_dimensionality::<ndarray::Ix3>()
            .context("Unexpected BLIP vision output rank")
    }
}
