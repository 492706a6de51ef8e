// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! BLIP captioning backend (backend A)
//!
//! Components:
//! - `encoder` - ViT image encoder
//! - `decoder` - BERT-style text decoder with tokenizer
//!
//! Produces short captions continuing a cue phrase such as
//! `"a photography of"`.

pub mod decoder;
pub mod encoder;

pub use decoder::BlipTextDecoder;
pub use encoder::BlipVisionEncoder;

use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::vision::backend::{BackendConfig, BackendId, CaptionBackend};
use crate::vision::preprocessing::preprocess_image;

const VISION_MODEL_FILE: &str = "onnx/vision_model.onnx";
const TEXT_DECODER_FILE: &str = "onnx/text_decoder_model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// BLIP image-captioning model
#[derive(Clone)]
pub struct BlipModel {
    encoder: BlipVisionEncoder,
    decoder: BlipTextDecoder,
    config: BackendConfig,
}

impl std::fmt::Debug for BlipModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlipModel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BlipModel {
    /// Files the model directory must contain, relative to its root
    pub fn artifact_files() -> Vec<String> {
        vec![
            TOKENIZER_FILE.to_string(),
            VISION_MODEL_FILE.to_string(),
            TEXT_DECODER_FILE.to_string(),
        ]
    }

    /// Load BLIP from a model directory
    ///
    /// Expected layout:
    /// - `onnx/vision_model.onnx`
    /// - `onnx/text_decoder_model.onnx`
    /// - `tokenizer.json`
    pub fn new<P: AsRef<Path>>(model_dir: P, config: BackendConfig) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        if !model_dir.exists() {
            anyhow::bail!("BLIP model directory not found: {}", model_dir.display());
        }

        info!(
            "Loading BLIP from {} on {} ({})",
            model_dir.display(),
            config.device,
            config.precision
        );

        let encoder = BlipVisionEncoder::new(
            &model_dir.join(VISION_MODEL_FILE),
            config.device,
            config.precision,
        )?;

        let decoder = BlipTextDecoder::new(
            &model_dir.join(TEXT_DECODER_FILE),
            &model_dir.join(TOKENIZER_FILE),
            config.device,
            config.precision,
        )?;

        info!("✅ BLIP ready on {}", config.device);

        Ok(Self {
            encoder,
            decoder,
            config,
        })
    }
}

impl CaptionBackend for BlipModel {
    fn id(&self) -> BackendId {
        BackendId::Blip
    }

    fn config(&self) -> BackendConfig {
        self.config.clone()
    }

    fn caption(
        &self,
        image: &DynamicImage,
        prompt: &str,
        max_new_tokens: Option<usize>,
    ) -> Result<String> {
        let start = Instant::now();
        if max_new_tokens.is_some() {
            debug!("BLIP ignores max_new_tokens, using max_length {}", self.config.max_length);
        }

        let pixel_values = preprocess_image(image, self.config.image_size);
        let image_embeds = self
            .encoder
            .encode(pixel_values)
            .context("Failed to encode image")?;

        let caption = self
            .decoder
            .generate(&image_embeds, prompt, self.config.max_length)
            .context("Failed to generate caption")?;

        info!(
            "BLIP caption: {} chars in {}ms",
            caption.len(),
            start.elapsed().as_millis()
        );
        Ok(caption)
    }
}
