//! Worker error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pkgmeta_metadata::MetadataError;
use serde::Serialize;

/// Error body returned by the operational endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Worker error type.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("core error: {0}")]
    Core(#[from] pkgmeta_core::Error),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("notify failed: {0}")]
    Notify(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Metadata(_) => "metadata_error",
            Self::Core(_) => "core_error",
            Self::Dispatch(_) => "dispatch_error",
            Self::Notify(_) => "notify_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Metadata(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Core(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for worker operations.
pub type WorkerResult<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_unavailable() {
        let err = WorkerError::from(MetadataError::Internal("pool closed".to_string()));
        assert_eq!(err.code(), "metadata_error");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = WorkerError::from(pkgmeta_core::Error::InvalidKind("bogus".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
