//! Common Error Types for the Address API
//!
//! One taxonomy for everything user-visible:
//! - `Validation` - client-caused, 400 with a numeric code
//! - `NotReady` - index still syncing, 503 with sync percentage
//! - `NotFound` - index returned nothing, 404
//! - `Internal` - unexpected collaborator failure, 503 with a generic
//!   message; full detail only reaches the server log

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::index::IndexError;

/// Validation errors carry this code in responses and WS error frames.
pub const VALIDATION_CODE: u16 = 1;

/// Root user-visible error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client-caused errors (missing/invalid address, malformed batch)
    #[error("{0}")]
    Validation(String),

    /// Index still syncing; clients are expected to retry
    #[error("Server not yet ready. Sync Percentage:{progress}")]
    NotReady { progress: f64 },

    /// The index returned no data and no other error
    #[error("Not found")]
    NotFound,

    /// Unexpected collaborator failure; detail stays server-side
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to show a client. Internal detail is replaced.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Payload for a WebSocket error frame: `{"error": {"message", "code"}}`.
    ///
    /// WS transports have no status concept once established, so the code
    /// rides inside the frame: 1 for validation, 404/503 otherwise.
    pub fn ws_frame(&self) -> serde_json::Value {
        let code = match self {
            ApiError::Validation(_) => VALIDATION_CODE,
            ApiError::NotFound => 404,
            ApiError::NotReady { .. } | ApiError::Internal(_) => 503,
        };
        serde_json::json!({
            "error": { "message": self.public_message(), "code": code }
        })
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotReady { progress } => ApiError::NotReady { progress },
            IndexError::NotFound => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref detail) = self {
            tracing::error!(detail = %detail, "internal error");
        }

        let body = match self {
            ApiError::Validation(ref msg) => serde_json::json!({
                "error": format!("{}. Code:{}", msg, VALIDATION_CODE),
                "code": VALIDATION_CODE,
            }),
            ref other => serde_json::json!({ "error": other.public_message() }),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Result type alias using ApiError
pub type Result<T> = std::result::Result<T, ApiError>;
