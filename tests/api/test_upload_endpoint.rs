// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dual_caption_node::api::{create_app, AppState};
use dual_caption_node::config::ApiSettings;
use dual_caption_node::vision::image_utils::MAX_IMAGE_SIZE;
use dual_caption_node::vision::ComputeDevice;
use image::ImageFormat;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::support::{encoded_image, mock_host, multipart_body, noise_png, png_bytes};

const BOUNDARY: &str = "caption-test-boundary";

async fn upload(parts: &[(&str, Option<&str>, &[u8])]) -> (StatusCode, Value) {
    upload_with(ApiSettings::default(), parts).await
}

async fn upload_with(
    settings: ApiSettings,
    parts: &[(&str, Option<&str>, &[u8])],
) -> (StatusCode, Value) {
    let state = AppState::with_host(
        Arc::new(mock_host(ComputeDevice::Gpu, "a photography of a boat", "A sailboat at sea.")),
        settings,
    );
    let app = create_app(state);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/caption/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(BOUNDARY, parts)))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_upload_png_with_defaults() {
    let image = png_bytes();
    let (status, json) = upload(&[("image", Some("boat.png"), image.as_slice())]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "blip");
    assert_eq!(json["device"], "gpu");
    assert_eq!(json["captions"]["blip"], "a photography of a boat");
}

#[tokio::test]
async fn test_upload_jpeg_both_modes() {
    let image = encoded_image(64, 48, ImageFormat::Jpeg);
    let (status, json) = upload(&[
        ("mode", None, b"both".as_slice()),
        ("blip2Prompt", None, b"Describe the weather.".as_slice()),
        ("maxNewTokens", None, b"150".as_slice()),
        ("image", Some("boat.JPG"), image.as_slice()),
    ])
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "both");
    assert_eq!(json["captions"]["blip"], "a photography of a boat");
    assert_eq!(json["captions"]["blip2"], "A sailboat at sea.");
}

#[tokio::test]
async fn test_upload_rejects_other_extensions() {
    let image = png_bytes();
    let (status, json) = upload(&[("image", Some("boat.gif"), image.as_slice())]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"]["field"], "image");
}

#[tokio::test]
async fn test_upload_without_image() {
    let (status, json) = upload(&[("mode", None, b"blip".as_slice())]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"]["field"], "image");
}

#[tokio::test]
async fn test_upload_bad_token_field() {
    let image = png_bytes();
    let (status, json) = upload(&[
        ("mode", None, b"blip2".as_slice()),
        ("maxNewTokens", None, b"many".as_slice()),
        ("image", Some("boat.png"), image.as_slice()),
    ])
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"]["field"], "maxNewTokens");
}

#[tokio::test]
async fn test_upload_corrupt_png() {
    let (status, json) = upload(&[("image", Some("boat.png"), b"\x89PNG not really".as_slice())]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorType"], "invalid_image");
}

#[tokio::test]
async fn test_configured_limit_above_default_cap() {
    let image = noise_png(1900, 2000);
    assert!(image.len() > MAX_IMAGE_SIZE);

    let settings = ApiSettings {
        max_image_bytes: 32 * 1024 * 1024,
        ..ApiSettings::default()
    };
    let (status, json) = upload_with(
        settings,
        &[("mode", None, b"both".as_slice()), ("image", Some("noise.png"), image.as_slice())],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["captions"]["blip"], "a photography of a boat");
    assert_eq!(json["captions"]["blip2"], "A sailboat at sea.");
}

#[tokio::test]
async fn test_configured_limit_below_image_size() {
    let image = png_bytes();
    let settings = ApiSettings {
        max_image_bytes: image.len() - 1,
        ..ApiSettings::default()
    };
    let (status, json) =
        upload_with(settings, &[("image", Some("boat.png"), image.as_slice())]).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"]["field"], "image");
}
