//! Content addressing, hash trees, and the local chunk store.
//!
//! This crate provides:
//! - [`TreeBuilder`]: recursively splits a blob into bounded chunks and
//!   hash manifests, producing a deterministic [`TreeRoot`](cairn_types::TreeRoot).
//! - [`ChunkStore`]: the in-memory map from hash to chunk bytes that the
//!   builder fills and the uploader reads from.
//! - [`encode_hashes`] / [`decode_hashes`]: the manifest codec, shared by
//!   manifests and needs-list bodies.
//! - [`reassemble`] / [`visit_tree`]: walk a built tree back to its bytes.

mod builder;
mod chunk_store;
mod error;
mod manifest;
mod walk;

pub use builder::TreeBuilder;
pub use chunk_store::ChunkStore;
pub use error::TreeError;
pub use manifest::{decode_hashes, encode_hashes};
pub use walk::{reassemble, visit_tree};
