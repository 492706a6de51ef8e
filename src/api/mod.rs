// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod caption;
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod ui;

pub use caption::{caption_handler, caption_upload_handler, CaptionMode, CaptionRequest, CaptionResponse};
pub use errors::{ApiError, ErrorResponse};
pub use handlers::{HealthResponse, ModelsResponse};
pub use http_server::{create_app, start_server, AppState};
