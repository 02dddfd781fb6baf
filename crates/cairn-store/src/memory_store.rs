//! In-memory blob storage backend.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use cairn_types::{ChunkHash, ContentKind};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{BlobStore, StoredBlob};

/// In-memory blob store backed by a `RwLock<HashMap>`.
///
/// Useful for testing and for servers configured to run in memory-only
/// mode. Counts `put` and `exists` calls so tests can observe traffic.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<ChunkHash, StoredBlob>>,
    puts: AtomicU64,
    exists_checks: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `put` calls served, including overwrites.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Total `exists` calls served.
    pub fn exists_count(&self) -> u64 {
        self.exists_checks.load(Ordering::Relaxed)
    }

    /// Return a reference to the inner map (for testing purposes).
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RwLock<HashMap<ChunkHash, StoredBlob>> {
        &self.blobs
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: ChunkHash, data: Bytes, kind: ContentKind) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        debug!(%key, size = data.len(), ?kind, "storing blob in memory");
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert(key, StoredBlob { data, kind });
        Ok(())
    }

    async fn exists(&self, key: ChunkHash) -> Result<bool, StoreError> {
        self.exists_checks.fetch_add(1, Ordering::Relaxed);
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(&key))
    }

    async fn get(&self, key: ChunkHash) -> Result<Option<StoredBlob>, StoreError> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(&key).cloned())
    }
}
