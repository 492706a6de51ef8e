// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! BLIP-2 captioning backend (backend B)
//!
//! Vision tower + Q-Former produce query embeddings that condition a
//! Flan-T5 encoder-decoder. Follows free-form instructions and writes
//! longer descriptions than BLIP.

pub mod decoder;
pub mod encoder;

pub use decoder::{Blip2LanguageModel, LanguageModelFiles};
pub use encoder::Blip2VisionEncoder;

use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::vision::backend::{BackendConfig, BackendId, CaptionBackend};
use crate::vision::device::Precision;
use crate::vision::preprocessing::preprocess_image;

const TOKENIZER_FILE: &str = "tokenizer.json";

fn graph_file(stem: &str, precision: Precision) -> String {
    format!("{}{}.onnx", stem, precision.file_suffix())
}

/// BLIP-2 (Flan-T5) image-captioning model
#[derive(Clone)]
pub struct Blip2Model {
    vision: Blip2VisionEncoder,
    language: Blip2LanguageModel,
    config: BackendConfig,
}

impl std::fmt::Debug for Blip2Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blip2Model")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Blip2Model {
    /// Files needed for `precision`; half precision selects the `_fp16` graphs
    pub fn artifact_files(precision: Precision) -> Vec<String> {
        let mut files: Vec<String> = ["vision_encoder", "embed_tokens", "encoder_model", "decoder_model"]
            .iter()
            .map(|stem| graph_file(stem, precision))
            .collect();
        files.insert(0, TOKENIZER_FILE.to_string());
        files
    }

    pub fn new<P: AsRef<Path>>(model_dir: P, config: BackendConfig) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        if !model_dir.exists() {
            anyhow::bail!("BLIP-2 model directory not found: {}", model_dir.display());
        }

        info!(
            "Loading BLIP-2 from {} on {} ({})",
            model_dir.display(),
            config.device,
            config.precision
        );

        let path = |stem: &str| model_dir.join(graph_file(stem, config.precision));

        let vision = Blip2VisionEncoder::new(&path("vision_encoder"), config.device, config.precision)?;

        let (embed_tokens, encoder, decoder) =
            (path("embed_tokens"), path("encoder_model"), path("decoder_model"));
        let tokenizer = model_dir.join(TOKENIZER_FILE);
        let language = Blip2LanguageModel::new(
            LanguageModelFiles {
                embed_tokens: &embed_tokens,
                encoder: &encoder,
                decoder: &decoder,
                tokenizer: &tokenizer,
            },
            config.device,
            config.precision,
        )?;

        info!("✅ BLIP-2 ready on {} ({})", config.device, config.precision);

        Ok(Self {
            vision,
            language,
            config,
        })
    }
}

impl CaptionBackend for Blip2Model {
    fn id(&self) -> BackendId {
        BackendId::Blip2
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
        let max_new_tokens = max_new_tokens.unwrap_or(self.config.max_new_tokens);

        let pixel_values = preprocess_image(image, self.config.image_size);
        let query_embeds = self
            .vision
            .encode(pixel_values)
            .context("Failed to encode image")?;

        let caption = self
            .language
            .generate(&query_embeds, prompt, max_new_tokens)
            .context("Failed to generate caption")?;

        info!(
            "BLIP-2 caption: {} chars (max {} tokens) in {}ms",
            caption.len(),
            max_new_tokens,
            start.elapsed().as_millis()
        );
        Ok(caption)
    }
}
