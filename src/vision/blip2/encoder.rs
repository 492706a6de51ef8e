// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! BLIP-2 vision tower, Q-Former and language projection
//!
//! Exported as a single graph that maps pixels to the query embeddings fed
//! to the language model.

use anyhow::{Context, Result};
use ndarray::{Array3, Array4};
use std::path::Path;
use tracing::debug;

use crate::vision::device::{ComputeDevice, Precision};
use crate::vision::session::{self, SharedSession};

/// Pixels to `[1, num_query_tokens, lm_hidden]` query embeddings
#[derive(Clone)]
pub struct Blip2VisionEncoder {
    session: SharedSession,
    precision: Precision,
}

impl std::fmt::Debug for Blip2VisionEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blip2VisionEncoder")
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

impl Blip2VisionEncoder {
    pub fn new(model_path: &Path, device: ComputeDevice, precision: Precision) -> Result<Self> {
        let session = session::load_session(model_path, device)
            .context("Failed to load BLIP-2 vision encoder")?;
        let precision = {
            let guard = session::lock(&session)?;
            session::float_input_precision(&guard, precision)
        };

        Ok(Self { session, precision })
    }

    pub fn encode(&self, pixel_values: Array4<f32>) -> Result<Array3<f32>> {
        let input = session::float_tensor(pixel_values, self.precision)?;

        let mut guard = session::lock(&self.session)?;
        let outputs = guard
            .run(ort::inputs!["pixel_values" => input])
            .context("BLIP-2 vision inference failed")?;

        let query_embeds = session::extract_f32(&outputs[0])?
            .into_dimensionality::<ndarray::Ix3>()
            .context("Unexpected BLIP-2 query embedding rank")?;
        debug!("BLIP-2 query embeddings shape: {:?}", query_embeds.shape());

        Ok(query_embeds)
    }
}
