//! API handlers.

pub mod currency;
pub mod files;
pub mod health;
pub mod jobs;
pub mod tools;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ToolboxError;
use crate::services::formulas::FormulaError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<ToolboxError> for ApiError {
    fn from(err: ToolboxError) -> Self {
        match err {
            ToolboxError::InvalidInput(m) => ApiError::BadRequest(m),
            ToolboxError::Formula(e) => ApiError::BadRequest(e.to_string()),
            ToolboxError::NotFound(m) => ApiError::NotFound(m),
            other => {
                tracing::error!("Request failed: {:?}", other);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<FormulaError> for ApiError {
    fn from(err: FormulaError) -> Self {
        match err {
            FormulaError::UnknownTool(id) => ApiError::NotFound(format!("Unknown tool: {}", id)),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(format!("Failed to read multipart: {}", err.body_text()))
        }
    }
}
