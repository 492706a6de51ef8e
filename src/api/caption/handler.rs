// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption endpoint handlers

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::request::{CaptionMode, CaptionRequest};
use super::response::{CaptionResponse, Captions};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::image_utils::{
    decode_base64_payload, decode_image_bytes_with_limit, is_supported_extension,
};
use crate::vision::{BackendId, CaptionError, CaptionHost};

/// POST /v1/caption - Caption a base64-encoded image
pub async fn caption_handler(
    State(state): State<AppState>,
    Json(request): Json<CaptionRequest>,
) -> Result<Json<CaptionResponse>, ApiError> {
    let mode = request.validate()?;

    let start = Instant::now();
    let bytes = decode_base64_payload(request.image.as_deref().unwrap_or_default())
        .map_err(|e| ApiError::InvalidImage(e.to_string()))?;

    run_captions(&state, mode, bytes, request, start).await.map(Json)
}

/// POST /v1/caption/upload - Caption an uploaded image file
///
/// Form fields: `image` (file), optional `mode`, `blipPrompt`,
/// `blip2Prompt`, `maxNewTokens`.
pub async fn caption_upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CaptionResponse>, ApiError> {
    let start = Instant::now();
    let mut request = CaptionRequest::default();
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                if let Some(file_name) = field.file_name() {
                    if !is_supported_extension(file_name) {
                        return Err(ApiError::ValidationError {
                            field: "image".to_string(),
                            message: format!(
                                "unsupported file '{}', expected jpg, jpeg or png",
                                file_name
                            ),
                        });
                    }
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(format!("Failed to read image: {}", e)))?;
                image = Some(data.to_vec());
            }
            "mode" | "blipPrompt" | "blip2Prompt" | "maxNewTokens" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(format!("Failed to read {}: {}", name, e)))?;
                apply_form_field(&mut request, &name, value)?;
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let bytes = image.ok_or_else(|| ApiError::ValidationError {
        field: "image".to_string(),
        message: "image is required".to_string(),
    })?;

    let mode = request.validate_options()?;

    run_captions(&state, mode, bytes, request, start).await.map(Json)
}

fn apply_form_field(request: &mut CaptionRequest, name: &str, value: String) -> Result<(), ApiError> {
    match name {
        "mode" => request.mode = value,
        "blipPrompt" => request.blip_prompt = value,
        "blip2Prompt" => request.blip2_prompt = value,
        "maxNewTokens" => {
            request.max_new_tokens =
                value.trim().parse().map_err(|_| ApiError::ValidationError {
                    field: "maxNewTokens".to_string(),
                    message: format!("maxNewTokens must be an integer, got '{}'", value),
                })?
        }
        _ => {}
    }
    Ok(())
}

async fn run_captions(
    state: &AppState,
    mode: CaptionMode,
    bytes: Vec<u8>,
    request: CaptionRequest,
    start: Instant,
) -> Result<CaptionResponse, ApiError> {
    if bytes.len() > state.settings.max_image_bytes {
        return Err(ApiError::ValidationError {
            field: "image".to_string(),
            message: format!(
                "image exceeds maximum size of {} bytes",
                state.settings.max_image_bytes
            ),
        });
    }

    let host = state.caption_host().await?;
    let device = host.device();
    let max_image_bytes = state.settings.max_image_bytes;

    let captions = tokio::task::spawn_blocking(move || {
        caption_blocking(&host, mode, &bytes, max_image_bytes, &request)
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Caption task failed: {}", e)))??;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    info!("Captioned image in {}ms (mode {:?})", processing_time_ms, mode);

    Ok(CaptionResponse {
        mode,
        captions,
        device,
        processing_time_ms,
    })
}

/// Decode once under the configured cap, then run the requested backends
fn caption_blocking(
    host: &Arc<CaptionHost>,
    mode: CaptionMode,
    bytes: &[u8],
    max_image_bytes: usize,
    request: &CaptionRequest,
) -> Result<Captions, CaptionError> {
    let image = decode_image_bytes_with_limit(bytes, max_image_bytes)?;
    let max_new_tokens = Some(request.max_new_tokens);

    let captions = match mode {
        CaptionMode::Blip => Captions {
            blip: Some(host.caption_image(BackendId::Blip, &image, &request.blip_prompt, None)?),
            blip2: None,
        },
        CaptionMode::Blip2 => Captions {
            blip: None,
            blip2: Some(host.caption_image(
                BackendId::Blip2,
                &image,
                &request.blip2_prompt,
                max_new_tokens,
            )?),
        },
        CaptionMode::Both => {
            let pair = host.caption_pair(
                &image,
                &request.blip_prompt,
                &request.blip2_prompt,
                max_new_tokens,
            )?;
            Captions {
                blip: Some(pair.blip),
                blip2: Some(pair.blip2),
            }
        }
    };

    Ok(captions)
}
