//! Error types for the needs-diff service.

use cairn_store::StoreError;
use cairn_types::ChunkHash;

/// Errors returned by [`NeedsDiffService::submit`](crate::NeedsDiffService::submit).
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A level > 0 payload whose length is not a multiple of the hash size.
    #[error("malformed manifest: length {len} is not a multiple of 32")]
    MalformedManifest {
        /// Payload length in bytes.
        len: usize,
    },

    /// The payload exceeds the maximum chunk size.
    #[error("chunk too large: {len} bytes (max {max})")]
    ChunkTooLarge {
        /// Payload length in bytes.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// The payload does not hash to the key it was submitted under.
    #[error("integrity mismatch: claimed {claimed}, payload hashes to {actual}")]
    IntegrityMismatch {
        /// Hash sent by the client.
        claimed: ChunkHash,
        /// Hash of the received bytes.
        actual: ChunkHash,
    },

    /// The backend failed a put or an existence check.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DiffError {
    /// Whether resubmitting the same chunk may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DiffError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
