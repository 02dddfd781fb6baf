//! Core trait and types for blob storage.

use bytes::Bytes;
use cairn_types::{ChunkHash, ContentKind};

use crate::error::StoreError;

/// A blob read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// The stored bytes.
    pub data: Bytes,
    /// Content kind recorded at write time.
    pub kind: ContentKind,
}

/// Durable content-addressed blob storage.
///
/// Keys are content hashes, so writes are idempotent: storing the same key
/// twice, even concurrently, leaves the same bytes behind. Implementations
/// must tolerate unbounded concurrent `exists` calls.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under `key`, tagged with its content kind.
    async fn put(&self, key: ChunkHash, data: Bytes, kind: ContentKind) -> Result<(), StoreError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: ChunkHash) -> Result<bool, StoreError>;

    /// Retrieve a blob by key. Returns `None` if not found.
    async fn get(&self, key: ChunkHash) -> Result<Option<StoredBlob>, StoreError>;
}
