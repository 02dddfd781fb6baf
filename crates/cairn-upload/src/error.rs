//! Error types for uploads.

use cairn_diff::DiffError;
use cairn_tree::TreeError;
use cairn_types::ChunkHash;

/// Errors that can occur while uploading a tree.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("server rejected chunk ({status} {code}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Machine-readable error code from the response body.
        code: String,
        /// Human-readable message from the response body.
        message: String,
    },

    /// A needs-list body whose length is not a multiple of the hash size.
    #[error("invalid manifest length: needs list of {len} bytes")]
    InvalidNeeds {
        /// Body length in bytes.
        len: usize,
    },

    /// The server asked for children of a leaf.
    #[error("server returned {count} needs for leaf {hash}")]
    UnexpectedNeeds {
        /// The leaf that was uploaded.
        hash: ChunkHash,
        /// Number of hashes returned.
        count: usize,
    },

    /// A requested child is not in the local chunk store.
    #[error("chunk {0} missing from local chunk store")]
    MissingChunk(ChunkHash),

    /// The in-process needs-diff service failed.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    /// Tree construction failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// An upload task panicked or could not be scheduled.
    #[error("upload task failed: {message}")]
    TaskFailed {
        /// Description of the failure.
        message: String,
    },
}

impl UploadError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Transport(_) => true,
            UploadError::Rejected { status, .. } => *status == 429 || *status >= 500,
            UploadError::Diff(e) => e.is_retryable(),
            _ => false,
        }
    }
}
