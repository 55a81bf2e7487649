//! API error types and JSON error response formatting.
//!
//! Every failure is rendered as `{success: false, error, message}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use mindvolta_chat::ChatError;

/// Message shown to clients for internal failures; details stay in the log.
pub const GENERIC_FAILURE: &str = "Failed to process message";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    /// Machine-readable error code (e.g., "bad_request").
    pub error: String,
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - rejected input.
    BadRequest(String),
    /// 401 Unauthorized - missing or unknown identity.
    Unauthorized(String),
    /// 500 Internal Server Error - message is shown as-is.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            success: false,
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        if err.is_validation() {
            return ApiError::BadRequest(err.to_string());
        }
        error!("Chat request failed: {}", err);
        ApiError::Internal(GENERIC_FAILURE.to_string())
    }
}
