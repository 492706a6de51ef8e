// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use dual_caption_node::api::{create_app, AppState};
use tower::ServiceExt;

async fn status_of(method: Method, uri: &str) -> StatusCode {
    create_app(AppState::new_for_test())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_upload_page_is_served() {
    let response = create_app(AppState::new_for_test())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/v1/caption/upload"));
}

#[tokio::test]
async fn test_caption_routes_are_post_only() {
    assert_eq!(
        status_of(Method::GET, "/v1/caption").await,
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(
        status_of(Method::GET, "/v1/caption/upload").await,
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn test_caption_route_exists() {
    // Missing image is rejected by validation, not routing
    assert_eq!(
        status_of(Method::POST, "/v1/caption").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let response = create_app(AppState::new_for_test())
        .oneshot(Request::builder().uri("/v1/embed").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["errorType"], "not_found");
    assert!(json["message"].as_str().unwrap().contains("/v1/embed"));
}

#[tokio::test]
async fn test_version_endpoint_lists_features() {
    let response = create_app(AppState::new_for_test())
        .oneshot(Request::builder().uri("/v1/version").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    let features = json["features"].as_array().unwrap();
    assert!(features.iter().any(|f| f == "blip2-captioning"));
}
