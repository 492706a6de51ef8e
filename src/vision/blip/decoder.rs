// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! BLIP text decoder
//!
//! A BERT-style causal decoder cross-attending to the image embeddings.
//! Generation starts from the `[DEC]` token followed by the prompt and
//! stops at `[SEP]`.

use anyhow::{Context, Result};
use ndarray::{Array2, Array3};
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::vision::device::{ComputeDevice, Precision};
use crate::vision::generation::{clean_caption, greedy_generate, last_position_logits};
use crate::vision::session::{self, SharedSession};

/// `[DEC]` token id in the BLIP vocabulary
pub const BOS_TOKEN_ID: u32 = 30522;

/// `[SEP]` token id
pub const SEP_TOKEN_ID: u32 = 102;

/// BLIP text decoder (`text_decoder_model.onnx`) plus tokenizer
#[derive(Clone)]
pub struct BlipTextDecoder {
    session: SharedSession,
    tokenizer: Arc<Tokenizer>,
    precision: Precision,
    bos_token_id: u32,
    sep_token_id: u32,
}

impl std::fmt::Debug for BlipTextDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlipTextDecoder")
            .field("precision", &self.precision)
            .field("bos_token_id", &self.bos_token_id)
            .field("sep_token_id", &self.sep_token_id)
            .finish_non_exhaustive()
    }
}

impl BlipTextDecoder {
    pub fn new(
        model_path: &Path,
        tokenizer_path: &Path,
        device: ComputeDevice,
        precision: Precision,
    ) -> Result<Self> {
        if !tokenizer_path.exists() {
            anyhow::bail!("BLIP tokenizer not found: {}", tokenizer_path.display());
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        info!(
            "Loaded BLIP tokenizer with {} tokens",
            tokenizer.get_vocab_size(true)
        );

        let bos_token_id = tokenizer.token_to_id("[DEC]").unwrap_or(BOS_TOKEN_ID);
        let sep_token_id = tokenizer.token_to_id("[SEP]").unwrap_or(SEP_TOKEN_ID);
        debug!("Special tokens - BOS: {}, SEP: {}", bos_token_id, sep_token_id);

        let session = session::load_session(model_path, device)
            .context("Failed to load BLIP text decoder")?;
        let precision = {
            let guard = session::lock(&session)?;
            session::float_input_precision(&guard, precision)
        };

        Ok(Self {
            session,
            tokenizer: Arc::new(tokenizer),
            precision,
            bos_token_id,
            sep_token_id,
        })
    }

    /// Prompt ids prefixed with `[DEC]`, without `[CLS]`/`[SEP]`
    pub fn prompt_tokens(&self, prompt: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| anyhow::anyhow!("Failed to encode prompt: {}", e))?;

        let mut tokens = vec![self.bos_token_id];
        tokens.extend(encoding.get_ids().iter().copied());
        Ok(tokens)
    }

    /// Generate a caption conditioned on `image_embeds` and `prompt`.
    ///
    /// `max_length` caps the whole sequence, prompt included. The returned
    /// text contains the prompt followed by the generated continuation.
    pub fn generate(
        &self,
        image_embeds: &Array3<f32>,
        prompt: &str,
        max_length: usize,
    ) -> Result<String> {
        let prefix = self.prompt_tokens(prompt)?;
        let budget = max_length.saturating_sub(prefix.len());
        debug!(
            "BLIP prompt '{}' -> {} tokens, budget {}",
            prompt,
            prefix.len(),
            budget
        );

        let generated = greedy_generate(&prefix, self.sep_token_id, budget, |sequence| {
            self.forward(image_embeds, sequence)
        })?;

        let mut all_tokens = prefix;
        all_tokens.extend(generated);

        let text = self
            .tokenizer
            .decode(&all_tokens, true)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))?;

        Ok(clean_caption(&text))
    }

    /// One decoder pass over the full sequence, returning next-token logits
    fn forward(&self, image_embeds: &Array3<f32>, input_ids: &[u32]) -> Result<Vec<f32>> {
        let ids: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let len = ids.len();

        let input_ids = Array2::from_shape_vec((1, len), ids).context("Failed to shape input ids")?;
        let attention_mask = Array2::<i64>::ones((1, len));

        let inputs = ort::inputs![
            "input_ids" => session::int_tensor(input_ids)?,
            "attention_mask" => session::int_tensor(attention_mask)?,
            "encoder_hidden_states" => session::float_tensor(image_embeds.clone(), self.precision)?
        ];

        let mut guard = session::lock(&self.session)?;
        let outputs = guard.run(inputs).context("BLIP decoder inference failed")?;
        let logits = session::extract_f32(&outputs[0])?;

        last_position_logits(&logits)
    }
}
