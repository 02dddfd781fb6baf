//! Error types for blob storage operations.

use cairn_types::ChunkHash;

/// Errors that can occur during blob storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes do not hash to the key they were stored under.
    #[error("blob corruption detected: expected {expected}, actual hash {actual}")]
    Corrupt {
        /// The key that was requested.
        expected: ChunkHash,
        /// The hash of the bytes actually stored.
        actual: ChunkHash,
    },
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Unavailable { .. } => true,
            StoreError::Io(_) => true,
            StoreError::Corrupt { .. } => false,
        }
    }
}
