//! HTTP error mapping and JSON error bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cairn_diff::DiffError;
use cairn_store::StoreError;
use cairn_types::ChunkHash;
use serde::Serialize;
use tracing::warn;

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Bad query parameters or path segments.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// No chunk is stored under the requested hash.
    #[error("chunk not found: {0}")]
    NotFound(ChunkHash),

    /// The needs-diff service refused the chunk.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// A direct backend read failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Wire shape of every error response.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

fn store_status(e: &StoreError) -> (StatusCode, &'static str) {
    if e.is_retryable() {
        (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }
}

impl HttpError {
    /// Map to an HTTP status and a stable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Diff(e) => match e {
                DiffError::MalformedManifest { .. } => {
                    (StatusCode::BAD_REQUEST, "malformed_manifest")
                }
                DiffError::ChunkTooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "chunk_too_large")
                }
                DiffError::IntegrityMismatch { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "integrity_mismatch")
                }
                DiffError::Store(e) => store_status(e),
            },
            Self::Store(e) => store_status(e),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            warn!(error = %self, code, "request failed");
        }

        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
