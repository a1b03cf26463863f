//! API error types and HTTP mappings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use signaltrace_core::TraceError;
use thiserror::Error;

/// SignalTrace API error type
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body is missing `logs` or it is not a sequence
    #[error("invalid logs provided")]
    InvalidLogs,

    /// Remediation request is missing `log` or `reason`
    #[error("log and reason are required")]
    MissingRemediationFields,

    /// Model backend call failed
    #[error("model backend error: {0}")]
    Model(String),

    /// Core error
    #[error(transparent)]
    Core(#[from] TraceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidLogs | ApiError::MissingRemediationFields => StatusCode::BAD_REQUEST,
            ApiError::Model(_) | ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for SignalTrace API handlers
pub type ApiResult<T> = Result<T, ApiError>;
