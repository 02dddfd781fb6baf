//! Recursive tree builder.
//!
//! Input that fits in one block becomes a single leaf. Larger input is cut
//! into `block_size` slices whose hashes are concatenated into a manifest,
//! and the manifest is fed back in one level up until it fits.

use bytes::{Bytes, BytesMut};
use cairn_types::{BLOCK_SIZE, ChunkHash, HASH_SIZE, TreeRoot};
use tracing::{debug, trace};

use crate::chunk_store::ChunkStore;
use crate::error::TreeError;

/// Smallest block size for which every manifest is shorter than its input.
const MIN_BLOCK_SIZE: usize = 2 * HASH_SIZE;

/// Builds content-addressed hash trees into a [`ChunkStore`].
pub struct TreeBuilder<'a> {
    store: &'a ChunkStore,
    block_size: usize,
}

impl<'a> TreeBuilder<'a> {
    /// Create a builder using the standard [`BLOCK_SIZE`].
    pub fn new(store: &'a ChunkStore) -> Self {
        Self {
            store,
            block_size: BLOCK_SIZE,
        }
    }

    /// Create a builder with a custom block size.
    ///
    /// Must be a whole number of hashes and at least two hashes wide.
    /// Manifests are cut at the same size, so an unaligned block would split
    /// a hash across two manifest chunks.
    pub fn with_block_size(store: &'a ChunkStore, block_size: usize) -> Result<Self, TreeError> {
        if block_size < MIN_BLOCK_SIZE || block_size % HASH_SIZE != 0 {
            return Err(TreeError::InvalidBlockSize {
                size: block_size,
                min: MIN_BLOCK_SIZE,
                align: HASH_SIZE,
            });
        }
        Ok(Self { store, block_size })
    }

    /// Block size this builder cuts at.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Build the tree for `data` and return its root.
    ///
    /// Identical input always yields the identical root and height. Empty
    /// input produces a valid zero-length leaf at level 0.
    pub fn build(&self, data: impl Into<Bytes>) -> TreeRoot {
        let data = data.into();
        let total = data.len();
        let root = self.build_level(data, 0);
        debug!(size = total, root = %root, chunks = self.store.len(), "built hash tree");
        root
    }

    fn build_level(&self, data: Bytes, level: u32) -> TreeRoot {
        if data.len() <= self.block_size {
            let hash = ChunkHash::from_data(&data);
            self.store.insert(hash, data);
            return TreeRoot {
                hash,
                height: level,
            };
        }

        let count = data.len().div_ceil(self.block_size);
        let mut manifest = BytesMut::with_capacity(count * HASH_SIZE);

        for start in (0..data.len()).step_by(self.block_size) {
            let end = (start + self.block_size).min(data.len());
            let slice = data.slice(start..end);
            let hash = ChunkHash::from_data(&slice);
            manifest.extend_from_slice(hash.as_bytes());
            self.store.insert(hash, slice);
        }

        trace!(level, slices = count, "split level into manifest");
        self.build_level(manifest.freeze(), level + 1)
    }
}
