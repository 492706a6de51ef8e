// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health and model listing handlers

use axum::{extract::State, http::Uri, Json};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::http_server::AppState;
use crate::vision::{BackendInfo, ComputeDevice};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` once the host is loaded, `loading` before
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<ComputeDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<BackendInfo>,
    pub device: ComputeDevice,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let host = state.host.read().await.clone();
    Json(HealthResponse {
        status: if host.is_some() { "ok" } else { "loading" }.to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
        device: host.map(|h| h.device()),
    })
}

/// GET /v1/models
pub async fn models_handler(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let host = state.caption_host().await?;
    Ok(Json(ModelsResponse {
        models: host.backend_info(),
        device: host.device(),
    }))
}

/// GET /v1/version
pub async fn version_handler() -> Json<serde_json::Value> {
    Json(crate::version::get_version_info())
}

/// Fallback for unknown routes
pub async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
