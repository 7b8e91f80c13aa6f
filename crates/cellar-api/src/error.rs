//! HTTP error response conversion.
//!
//! Handlers return `Result<impl IntoResponse, HttpError>`; lower-layer errors
//! become `HttpError` via `From` and render consistently as a status code plus
//! a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cellar_core::CellarError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling.
    pub code: &'static str,
}

/// Wrapper implementing `IntoResponse` for `CellarError` (orphan rules keep
/// us from implementing it on the foreign type directly).
#[derive(Debug)]
pub struct HttpError(pub CellarError);

impl From<CellarError> for HttpError {
    fn from(err: CellarError) -> Self {
        HttpError(err)
    }
}

impl From<cellar_storage::StorageError> for HttpError {
    fn from(err: cellar_storage::StorageError) -> Self {
        HttpError(CellarError::from(err))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CellarError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CellarError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            CellarError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            CellarError::UnknownDriver(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN_DRIVER"),
            CellarError::ConsistencyFault { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONSISTENCY_FAULT")
            }
            CellarError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            CellarError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            CellarError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if self.0.is_consistency_fault() {
            // The at-most-one-of (metadata, bytes) invariant broke; this must
            // never pass quietly.
            tracing::error!(error = ?self.0, "consistency fault surfaced to client");
        } else if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }

        // Server-side detail stays in the logs.
        let message = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}
