// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Flan-T5 language model conditioned on BLIP-2 query embeddings
//!
//! Three graphs make up the language side:
//! - `embed_tokens` - prompt ids to token embeddings
//! - `encoder_model` - T5 encoder over `[query embeds ; prompt embeds]`
//! - `decoder_model` - T5 decoder producing next-token logits
//!
//! The decoder runs without a KV cache, re-feeding the whole decoder
//! sequence each step.

use anyhow::{Context, Result};
use ndarray::{concatenate, Array2, Array3, Axis};
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::vision::device::{ComputeDevice, Precision};
use crate::vision::generation::{clean_caption, greedy_generate, last_position_logits};
use crate::vision::session::{self, SharedSession};

/// `decoder_start_token_id` of T5 (`<pad>`)
pub const DECODER_START_TOKEN_ID: u32 = 0;

/// `</s>`
pub const EOS_TOKEN_ID: u32 = 1;

/// Paths of the language-model graphs for one precision
#[derive(Debug, Clone)]
pub struct LanguageModelFiles<'a> {
    pub embed_tokens: &'a Path,
    pub encoder: &'a Path,
    pub decoder: &'a Path,
    pub tokenizer: &'a Path,
}

#[derive(Clone)]
struct Graph {
    session: SharedSession,
    precision: Precision,
}

impl Graph {
    fn load(path: &Path, device: ComputeDevice, precision: Precision, what: &str) -> Result<Self> {
        let session = session::load_session(path, device)
            .with_context(|| format!("Failed to load BLIP-2 {}", what))?;
        let precision = {
            let guard = session::lock(&session)?;
            session::float_input_precision(&guard, precision)
        };
        Ok(Self { session, precision })
    }
}

/// T5 encoder-decoder plus tokenizer
#[derive(Clone)]
pub struct Blip2LanguageModel {
    embed_tokens: Graph,
    encoder: Graph,
    decoder: Graph,
    tokenizer: Arc<Tokenizer>,
    eos_token_id: u32,
    decoder_start_token_id: u32,
}

impl std::fmt::Debug for Blip2LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blip2LanguageModel")
            .field("eos_token_id", &self.eos_token_id)
            .field("decoder_start_token_id", &self.decoder_start_token_id)
            .finish_non_exhaustive()
    }
}

impl Blip2LanguageModel {
    pub fn new(
        files: LanguageModelFiles<'_>,
        device: ComputeDevice,
        precision: Precision,
    ) -> Result<Self> {
        if !files.tokenizer.exists() {
            anyhow::bail!("BLIP-2 tokenizer not found: {}", files.tokenizer.display());
        }
        let tokenizer = Tokenizer::from_file(files.tokenizer)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        info!(
            "Loaded T5 tokenizer with {} tokens",
            tokenizer.get_vocab_size(true)
        );

        let eos_token_id = tokenizer.token_to_id("</s>").unwrap_or(EOS_TOKEN_ID);
        let decoder_start_token_id = tokenizer
            .token_to_id("<pad>")
            .unwrap_or(DECODER_START_TOKEN_ID);

        let embed_tokens = Graph::load(files.embed_tokens, device, precision, "token embeddings")?;
        let encoder = Graph::load(files.encoder, device, precision, "T5 encoder")?;
        let decoder = Graph::load(files.decoder, device, precision, "T5 decoder")?;

        Ok(Self {
            embed_tokens,
            encoder,
            decoder,
            tokenizer: Arc::new(tokenizer),
            eos_token_id,
            decoder_start_token_id,
        })
    }

    /// Prompt ids terminated by `</s>`
    pub fn prompt_tokens(&self, prompt: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| anyhow::anyhow!("Failed to encode prompt: {}", e))?;

        let mut ids = encoding.get_ids().to_vec();
        if ids.last() != Some(&self.eos_token_id) {
            ids.push(self.eos_token_id);
        }
        Ok(ids)
    }

    /// Generate at most `max_new_tokens` tokens and decode them.
    ///
    /// Only the generated continuation is returned, never the prompt.
    pub fn generate(
        &self,
        query_embeds: &Array3<f32>,
        prompt: &str,
        max_new_tokens: usize,
    ) -> Result<String> {
        let prompt_ids = self.prompt_tokens(prompt)?;
        let prompt_embeds = self.embed(&prompt_ids)?;

        let inputs_embeds = concatenate(Axis(1), &[query_embeds.view(), prompt_embeds.view()])
            .context("Query and prompt embeddings have mismatched hidden sizes")?;
        let encoder_len = inputs_embeds.shape()[1];
        let attention_mask = Array2::<i64>::ones((1, encoder_len));
        debug!(
            "BLIP-2 encoder input: {} query + {} prompt tokens",
            query_embeds.shape()[1],
            prompt_ids.len()
        );

        let encoder_hidden = self.encode(inputs_embeds, attention_mask.clone())?;

        let generated = greedy_generate(
            &[self.decoder_start_token_id],
            self.eos_token_id,
            max_new_tokens,
            |sequence| self.decode_step(&encoder_hidden, &attention_mask, sequence),
        )?;
        debug!("BLIP-2 generated {} tokens", generated.len());

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))?;

        Ok(clean_caption(&text))
    }

    fn embed(&self, ids: &[u32]) -> Result<Array3<f32>> {
        let ids: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
        let input_ids =
            Array2::from_shape_vec((1, ids.len()), ids).context("Failed to shape prompt ids")?;

        let mut guard = session::lock(&self.embed_tokens.session)?;
        let outputs = guard
            .run(ort::inputs!["input_ids" => session::int_tensor(input_ids)?])
            .context("BLIP-2 token embedding failed")?;

        session::extract_f32(&outputs[0])?
            .into_dimensionality::<ndarray::Ix3>()
            .context("Unexpected token embedding rank")
    }

    fn encode(&self, inputs_embeds: Array3<f32>, attention_mask: Array2<i64>) -> Result<Array3<f32>> {
        let inputs = ort::inputs![
            "inputs_embeds" => session::float_tensor(inputs_embeds, self.encoder.precision)?,
            "attention_mask" => session::int_tensor(attention_mask)?
        ];

        let mut guard = session::lock(&self.encoder.session)?;
        let outputs = guard.run(inputs).context("BLIP-2 T5 encoder failed")?;

        session::extract_f32(&outputs[0])?
            .into_dimensionality::<ndarray::Ix3>()
            .context("Unexpected encoder output rank")
    }

    fn decode_step(
        &self,
        encoder_hidden: &Array3<f32>,
        encoder_mask: &Array2<i64>,
        decoder_ids: &[u32],
    ) -> Result<Vec<f32>> {
        let ids: Vec<i64> = decoder_ids.iter().map(|&id| id as i64).collect();
        let input_ids =
            Array2::from_shape_vec((1, ids.len()), ids).context("Failed to shape decoder ids")?;

        let inputs = ort::inputs![
            "input_ids" => session::int_tensor(input_ids)?,
            "encoder_attention_mask" => session::int_tensor(encoder_mask.clone())?,
            "encoder_hidden_states" => session::float_tensor(encoder_hidden.clone(), self.decoder.precision)?
        ];

        let mut guard = session::lock(&self.decoder.session)?;
        let outputs = guard.run(inputs).context("BLIP-2 T5 decoder failed")?;
        let logits = session::extract_f32(&outputs[0])?;

        last_position_logits(&logits)
    }
}
