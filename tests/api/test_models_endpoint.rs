// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dual_caption_node::api::{create_app, AppState, HealthResponse, ModelsResponse};
use dual_caption_node::config::ApiSettings;
use dual_caption_node::vision::{BackendId, ComputeDevice, Precision};
use std::sync::Arc;
use tower::ServiceExt;

use crate::support::mock_host;

async fn get(state: AppState, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = create_app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_health_reports_loading_then_ok() {
    let state = AppState::new_for_test();

    let (status, body) = get(state.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "loading");
    assert!(health.device.is_none());

    state
        .set_host(Arc::new(mock_host(ComputeDevice::Cpu, "a", "b")))
        .await;

    let (_, body) = get(state, "/health").await;
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.device, Some(ComputeDevice::Cpu));
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_models_lists_both_backends() {
    let state = AppState::with_host(
        Arc::new(mock_host(ComputeDevice::Gpu, "a", "b")),
        ApiSettings::default(),
    );

    let (status, body) = get(state, "/v1/models").await;
    assert_eq!(status, StatusCode::OK);

    let models: ModelsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(models.device, ComputeDevice::Gpu);
    assert_eq!(models.models.len(), 2);
    assert_eq!(models.models[0].id, BackendId::Blip);
    assert_eq!(models.models[0].precision, Precision::Full);
    assert_eq!(models.models[1].id, BackendId::Blip2);
    assert_eq!(models.models[1].precision, Precision::Half);
    assert_eq!(models.models[1].upstream_model, "Salesforce/blip2-flan-t5-xl");
}

#[tokio::test]
async fn test_models_before_load_is_503() {
    let (status, _) = get(AppState::new_for_test(), "/v1/models").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
