// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::caption::{caption_handler, caption_upload_handler};
use super::errors::ApiError;
use super::handlers::{health_handler, models_handler, not_found_handler, version_handler};
use super::ui::index_handler;
use crate::config::ApiSettings;
use crate::vision::CaptionHost;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Set once the models are loaded
    pub host: Arc<RwLock<Option<Arc<CaptionHost>>>>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(settings: ApiSettings) -> Self {
        Self {
            host: Arc::new(RwLock::new(None)),
            settings: Arc::new(settings),
        }
    }

    pub fn with_host(host: Arc<CaptionHost>, settings: ApiSettings) -> Self {
        Self {
            host: Arc::new(RwLock::new(Some(host))),
            settings: Arc::new(settings),
        }
    }

    pub fn new_for_test() -> Self {
        Self::new(ApiSettings::default())
    }

    pub async fn set_host(&self, host: Arc<CaptionHost>) {
        *self.host.write().await = Some(host);
    }

    /// Loaded host, or 503 while models are still loading
    pub async fn caption_host(&self) -> Result<Arc<CaptionHost>, ApiError> {
        self.host.read().await.clone().ok_or_else(|| {
            ApiError::ServiceUnavailable("Caption models are not loaded yet".to_string())
        })
    }
}

/// Build the router
pub fn create_app(state: AppState) -> Router {
    // base64 inflates payloads by 4/3; leave room for the JSON envelope
    let body_limit = state.settings.max_image_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/v1/models", get(models_handler))
        .route("/v1/version", get(version_handler))
        .route("/v1/caption", post(caption_handler))
        .route("/v1/caption/upload", post(caption_upload_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.settings.host, state.settings.port)
        .parse()
        .context("Invalid API listen address")?;

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app).await.context("API server error")?;

    Ok(())
}
