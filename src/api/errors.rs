// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::vision::{BackendId, CaptionError};

/// Shown alongside model loading failures
pub const MISSING_MODELS_HINT: &str = "Export the ONNX models into BLIP_MODEL_DIR / BLIP2_MODEL_DIR, \
or set BLIP_MODEL_REPO / BLIP2_MODEL_REPO to download them from the Hugging Face hub";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    ValidationError {
        field: String,
        message: String,
    },
    InvalidImage(String),
    ServiceUnavailable(String),
    ModelLoad {
        backend: Option<BackendId>,
        message: String,
    },
    GenerationFailed {
        backend: BackendId,
        message: String,
    },
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::InvalidImage(msg) => ("invalid_image", msg.clone(), None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::ModelLoad { backend, message } => {
                let mut details = HashMap::new();
                if let Some(backend) = backend {
                    details.insert(
                        "backend".to_string(),
                        serde_json::Value::String(backend.key().to_string()),
                    );
                }
                details.insert(
                    "hint".to_string(),
                    serde_json::Value::String(MISSING_MODELS_HINT.to_string()),
                );
                ("model_load_error", message.clone(), Some(details))
            }
            ApiError::GenerationFailed { backend, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "backend".to_string(),
                    serde_json::Value::String(backend.key().to_string()),
                );
                ("generation_error", message.clone(), Some(details))
            }
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::InvalidImage(_) => 400,
            ApiError::ServiceUnavailable(_) | ApiError::ModelLoad { .. } => 503,
            ApiError::GenerationFailed { .. } | ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::ModelLoad { message, .. } => write!(f, "Model load failed: {}", message),
            ApiError::GenerationFailed { backend, message } => {
                write!(f, "{} generation failed: {}", backend, message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<CaptionError> for ApiError {
    fn from(err: CaptionError) -> Self {
        match err {
            CaptionError::InvalidPrompt { backend } => ApiError::ValidationError {
                field: match backend {
                    BackendId::Blip => "blipPrompt".to_string(),
                    BackendId::Blip2 => "blip2Prompt".to_string(),
                },
                message: err.to_string(),
            },
            CaptionError::ImageDecode(e) => ApiError::InvalidImage(e.to_string()),
            CaptionError::BackendLoad { backend, .. } => ApiError::ModelLoad {
                backend: Some(backend),
                message: err.to_string(),
            },
            CaptionError::DeviceUnavailable => ApiError::ModelLoad {
                backend: None,
                message: err.to_string(),
            },
            CaptionError::Generation { backend, message } => {
                ApiError::GenerationFailed { backend, message }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        (status, Json(self.to_response())).into_response()
    }
}
