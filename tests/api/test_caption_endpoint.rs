// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dual_caption_node::api::{create_app, AppState};
use dual_caption_node::config::ApiSettings;
use dual_caption_node::vision::{BackendId, CaptionHost, ComputeDevice};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::support::{bare_backend, mock_host, png_base64, recording_backend};

async fn post_caption(state: AppState, body: Value) -> (StatusCode, Value) {
    let app = create_app(state);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/caption")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn loaded_state() -> AppState {
    AppState::with_host(
        Arc::new(mock_host(ComputeDevice::Cpu, "a photography of a cat", "A cat on a sofa.")),
        ApiSettings::default(),
    )
}

#[tokio::test]
async fn test_blip_mode_returns_only_blip() {
    let (status, json) = post_caption(loaded_state(), json!({ "image": png_base64() })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "blip");
    assert_eq!(json["device"], "cpu");
    assert_eq!(json["captions"]["blip"], "a photography of a cat");
    assert!(json["captions"].get("blip2").is_none());
    assert!(json["processingTimeMs"].is_u64());
}

#[tokio::test]
async fn test_both_mode_returns_both() {
    let (status, json) = post_caption(
        loaded_state(),
        json!({ "image": png_base64(), "mode": "both", "maxNewTokens": 250 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "both");
    assert_eq!(json["captions"]["blip"], "a photography of a cat");
    assert_eq!(json["captions"]["blip2"], "A cat on a sofa.");
}

#[tokio::test]
async fn test_prompts_and_token_cap_reach_backends() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let host = CaptionHost::from_backends(
        Box::new(recording_backend(BackendId::Blip, ComputeDevice::Cpu, calls.clone())),
        Box::new(recording_backend(BackendId::Blip2, ComputeDevice::Cpu, calls.clone())),
    );
    let state = AppState::with_host(Arc::new(host), ApiSettings::default());

    let (status, json) = post_caption(
        state,
        json!({
            "image": format!("data:image/png;base64,{}", png_base64()),
            "mode": "blip2",
            "blip2Prompt": "What color is the car?",
            "maxNewTokens": 120
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["captions"]["blip2"], "blip2 says: What color is the car?");

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, Some(120));
}

#[tokio::test]
async fn test_unknown_mode_is_validation_error() {
    let (status, json) =
        post_caption(loaded_state(), json!({ "image": png_base64(), "mode": "clip" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorType"], "validation_error");
    assert_eq!(json["details"]["field"], "mode");
}

#[tokio::test]
async fn test_token_cap_out_of_range() {
    for tokens in [10, 501] {
        let (status, json) = post_caption(
            loaded_state(),
            json!({ "image": png_base64(), "mode": "both", "maxNewTokens": tokens }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["details"]["field"], "maxNewTokens");
    }
}

#[tokio::test]
async fn test_empty_prompt_is_rejected() {
    let (status, json) = post_caption(
        loaded_state(),
        json!({ "image": png_base64(), "blipPrompt": "  " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"]["field"], "blipPrompt");
}

#[tokio::test]
async fn test_missing_and_corrupt_images() {
    let (status, json) = post_caption(loaded_state(), json!({ "mode": "blip" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"]["field"], "image");

    let (status, json) = post_caption(loaded_state(), json!({ "image": "%%%" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorType"], "invalid_image");

    // Valid base64, not an image
    let (status, json) = post_caption(loaded_state(), json!({ "image": "aGVsbG8gd29ybGQ=" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorType"], "invalid_image");
}

#[tokio::test]
async fn test_oversized_image_is_rejected() {
    let settings = ApiSettings {
        max_image_bytes: 16,
        ..ApiSettings::default()
    };
    let state = AppState::with_host(
        Arc::new(mock_host(ComputeDevice::Cpu, "a", "b")),
        settings,
    );

    let (status, json) = post_caption(state, json!({ "image": png_base64() })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"]["field"], "image");
}

#[tokio::test]
async fn test_generation_failure_is_500_with_backend() {
    let mut blip = bare_backend(BackendId::Blip, ComputeDevice::Cpu);
    blip.expect_caption()
        .returning(|_, _, _| Err(anyhow::anyhow!("session run failed")));
    let host = CaptionHost::from_backends(
        Box::new(blip),
        Box::new(bare_backend(BackendId::Blip2, ComputeDevice::Cpu)),
    );
    let state = AppState::with_host(Arc::new(host), ApiSettings::default());

    let (status, json) = post_caption(state, json!({ "image": png_base64() })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["errorType"], "generation_error");
    assert_eq!(json["details"]["backend"], "blip");
}

#[tokio::test]
async fn test_caption_before_models_load_is_503() {
    let (status, json) =
        post_caption(AppState::new_for_test(), json!({ "image": png_base64() })).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["errorType"], "service_unavailable");
}
