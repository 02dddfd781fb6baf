//! Error types for tree operations.

use cairn_types::ChunkHash;

/// Errors that can occur while building or walking a hash tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A manifest payload is not a whole number of hashes.
    #[error("malformed manifest: length {len} is not a multiple of 32")]
    MalformedManifest {
        /// Length of the offending payload in bytes.
        len: usize,
    },

    /// A chunk referenced by the tree is not in the local store.
    #[error("chunk not found: {0}")]
    ChunkNotFound(ChunkHash),

    /// The configured block size would tear hashes or never shrink manifests.
    #[error("invalid block size {size}: must be a multiple of {align} and at least {min} bytes")]
    InvalidBlockSize {
        /// Requested block size.
        size: usize,
        /// Smallest block size that guarantees termination.
        min: usize,
        /// Required alignment, the width of one hash.
        align: usize,
    },
}
