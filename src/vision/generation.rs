// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Greedy autoregressive decoding shared by both backends

use anyhow::Result;
use ndarray::{ArrayD, IxDyn};
use tracing::debug;

/// Run greedy decoding until `eos_token_id` or `max_new_tokens` tokens.
///
/// `step` receives the full sequence so far (prefix plus generated tokens)
/// and returns the logits for the next position. The returned vector holds
/// only the generated tokens, never including the EOS token, so its length
/// is at most `max_new_tokens`.
pub fn greedy_generate<F>(
    prefix: &[u32],
    eos_token_id: u32,
    max_new_tokens: usize,
    mut step: F,
) -> Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>>,
{
    let mut sequence = prefix.to_vec();
    let mut generated = Vec::with_capacity(max_new_tokens.min(512));

    for index in 0..max_new_tokens {
        let logits = step(&sequence)?;
        let next_token = argmax(&logits)?;

        if next_token == eos_token_id {
            debug!("EOS after {} generated tokens", index);
            break;
        }

        sequence.push(next_token);
        generated.push(next_token);
    }

    Ok(generated)
}

/// Index of the largest logit
pub fn argmax(logits: &[f32]) -> Result<u32> {
    let (max_idx, _) = logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .ok_or_else(|| anyhow::anyhow!("Empty logits vector"))?;

    Ok(max_idx as u32)
}

/// Logits of the last sequence position from a `[batch, seq, vocab]` or
/// `[seq, vocab]` output
pub fn last_position_logits(logits: &ArrayD<f32>) -> Result<Vec<f32>> {
    let shape = logits.shape();
    let row = match shape.len() {
        3 => {
            if shape[1] == 0 {
                anyhow::bail!("Logits have an empty sequence dimension: {:?}", shape);
            }
            let last = shape[1] - 1;
            (0..shape[2])
                .map(|v| logits[IxDyn(&[0, last, v])])
                .collect()
        }
        2 => {
            if shape[0] == 0 {
                anyhow::bail!("Logits have an empty sequence dimension: {:?}", shape);
            }
            let last = shape[0] - 1;
            (0..shape[1]).map(|v| logits[IxDyn(&[last, v])]).collect()
        }
        _ => anyhow::bail!("Unexpected logits shape: {:?}", shape),
    };
    Ok(row)
}

/// Collapse whitespace left behind by special-token stripping
pub fn clean_caption(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
