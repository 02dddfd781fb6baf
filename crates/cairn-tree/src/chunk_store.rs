//! In-memory chunk store filled while building trees.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use cairn_types::{ChunkHash, TreeRoot};
use tracing::debug;

use crate::manifest::decode_hashes;

/// Map from content hash to chunk bytes.
///
/// The [`TreeBuilder`](crate::TreeBuilder) registers every leaf and manifest
/// here; the uploader reads chunks back when the backend reports them
/// missing. Chunks are immutable once inserted, so re-inserting an existing
/// hash is a no-op.
#[derive(Default)]
pub struct ChunkStore {
    chunks: RwLock<HashMap<ChunkHash, Bytes>>,
}

impl ChunkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chunk under its hash. Returns `true` if it was not present.
    pub fn insert(&self, hash: ChunkHash, data: Bytes) -> bool {
        let mut map = self.chunks.write().expect("lock poisoned");
        if map.contains_key(&hash) {
            return false;
        }
        map.insert(hash, data);
        true
    }

    /// Fetch a chunk by hash. `Bytes` clones are reference-counted.
    pub fn get(&self, hash: &ChunkHash) -> Option<Bytes> {
        let map = self.chunks.read().expect("lock poisoned");
        map.get(hash).cloned()
    }

    /// Check whether a chunk is present.
    pub fn contains(&self, hash: &ChunkHash) -> bool {
        let map = self.chunks.read().expect("lock poisoned");
        map.contains_key(hash)
    }

    /// Remove a single chunk, returning its bytes if it was present.
    pub fn remove(&self, hash: &ChunkHash) -> Option<Bytes> {
        let mut map = self.chunks.write().expect("lock poisoned");
        map.remove(hash)
    }

    /// Number of distinct chunks held.
    pub fn len(&self) -> usize {
        self.chunks.read().expect("lock poisoned").len()
    }

    /// Whether the store holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held across all chunks.
    pub fn total_bytes(&self) -> u64 {
        let map = self.chunks.read().expect("lock poisoned");
        map.values().map(|v| v.len() as u64).sum()
    }

    /// Drop every chunk reachable from `root`.
    ///
    /// Call only once the whole tree is confirmed stored remotely. Chunks
    /// already absent are skipped. Returns the number of chunks removed.
    pub fn discard_tree(&self, root: TreeRoot) -> usize {
        let mut map = self.chunks.write().expect("lock poisoned");
        let mut stack = vec![(root.hash, root.height)];
        let mut removed = 0;

        // A chunk already gone ends its branch; siblings are still walked.
        while let Some((hash, level)) = stack.pop() {
            let Some(data) = map.remove(&hash) else {
                continue;
            };
            removed += 1;
            if level == 0 {
                continue;
            }
            if let Ok(children) = decode_hashes(&data) {
                stack.extend(children.into_iter().map(|child| (child, level - 1)));
            }
        }

        debug!(root = %root, removed, remaining = map.len(), "discarded local chunks");
        removed
    }
}
