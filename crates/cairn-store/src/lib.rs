//! Backend blob storage for cairn.
//!
//! This crate defines the [`BlobStore`] trait, an immutable
//! content-addressed key-value store keyed by [`ChunkHash`](cairn_types::ChunkHash),
//! along with three implementations:
//!
//! - [`MemoryStore`]: in-memory storage backed by a `RwLock<HashMap>`.
//! - [`FileStore`]: file-based storage with a 2-level fan-out directory layout.
//! - [`FaultyStore`]: wraps another store to add latency or fail writes in tests.

mod error;
mod faulty_store;
mod file_store;
mod memory_store;
mod traits;

pub use error::StoreError;
pub use faulty_store::FaultyStore;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::{BlobStore, StoredBlob};
