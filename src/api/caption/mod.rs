// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption API endpoint module
//!
//! Provides POST /v1/caption (base64 JSON) and POST /v1/caption/upload
//! (multipart form).

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{caption_handler, caption_upload_handler};
pub use request::{CaptionMode, CaptionRequest};
pub use response::{CaptionResponse, Captions};
