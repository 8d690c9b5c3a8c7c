//! Error types for sentiflow-api
//!
//! Every handler error becomes a JSON body `{"detail": ..., "code": ...}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Request body did not deserialize; keeps axum's status (usually 422)
    #[error("{detail}")]
    InvalidBody { status: StatusCode, detail: String },

    /// Requested CSV column is absent (400); lists the columns that exist
    #[error("Column '{column}' is not in the CSV")]
    MissingColumn { column: String, cols: Vec<String> },

    /// Optional feature not configured (503)
    #[error("{0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// sentiflow-common error
    #[error(transparent)]
    Common(#[from] sentiflow_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use sentiflow_common::Error as CommonError;

        let message = self.to_string();
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::InvalidBody { status, .. } => (*status, "INVALID_BODY"),
            ApiError::MissingColumn { .. } => (StatusCode::BAD_REQUEST, "MISSING_COLUMN"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Common(err) => match err {
                CommonError::ChannelUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CHANNEL_UNAVAILABLE")
                }
                CommonError::Serialization(_) => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
                CommonError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                CommonError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        };

        if status.is_server_error() {
            tracing::error!(code, "request failed: {}", message);
        }

        let mut body = json!({
            "detail": message,
            "code": code,
        });
        if let ApiError::MissingColumn { cols, .. } = &self {
            body["cols"] = json!(cols);
        }

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
