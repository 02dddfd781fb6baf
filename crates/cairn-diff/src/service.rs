//! The needs-diff operation.

use std::sync::Arc;

use bytes::Bytes;
use cairn_store::BlobStore;
use cairn_tree::decode_hashes;
use cairn_types::{BLOCK_SIZE, ChunkHash, ContentKind};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, warn};

use crate::error::DiffError;

/// Tunables for [`NeedsDiffService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffConfig {
    /// Recompute the payload hash and reject mismatches before storing.
    pub verify_integrity: bool,
    /// Maximum existence checks in flight for one manifest.
    pub diff_concurrency: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            verify_integrity: true,
            diff_concurrency: 16,
        }
    }
}

/// Stores submitted chunks and computes which manifest children are missing.
pub struct NeedsDiffService {
    store: Arc<dyn BlobStore>,
    config: DiffConfig,
}

impl NeedsDiffService {
    /// Create a service over `store` with default settings.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_config(store, DiffConfig::default())
    }

    /// Create a service with explicit settings.
    pub fn with_config(store: Arc<dyn BlobStore>, config: DiffConfig) -> Self {
        Self { store, config }
    }

    /// The backend this service writes to.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Settings in effect.
    pub fn config(&self) -> DiffConfig {
        self.config
    }

    /// Persist `data` under `hash` and return the children of a manifest
    /// that the backend does not hold, in manifest order.
    ///
    /// Leaves (`level == 0`) always yield an empty list. Resubmitting a
    /// chunk that is already stored is harmless.
    pub async fn submit(
        &self,
        hash: ChunkHash,
        level: u32,
        data: Bytes,
    ) -> Result<Vec<ChunkHash>, DiffError> {
        if data.len() > BLOCK_SIZE {
            return Err(DiffError::ChunkTooLarge {
                len: data.len(),
                max: BLOCK_SIZE,
            });
        }

        if self.config.verify_integrity {
            let actual = ChunkHash::from_data(&data);
            if actual != hash {
                warn!(claimed = %hash, %actual, level, "rejecting chunk with mismatched hash");
                return Err(DiffError::IntegrityMismatch {
                    claimed: hash,
                    actual,
                });
            }
        }

        let len = data.len();
        self.store
            .put(hash, data.clone(), ContentKind::for_level(level))
            .await?;

        if level == 0 {
            debug!(%hash, len, "stored leaf");
            return Ok(Vec::new());
        }

        // Stored as opaque bytes either way; only the diff is refused.
        let children =
            decode_hashes(&data).map_err(|_| DiffError::MalformedManifest { len })?;

        let store = &self.store;
        let checked: Vec<(ChunkHash, bool)> = stream::iter(children)
            .map(|child| async move { store.exists(child).await.map(|found| (child, found)) })
            .buffered(self.config.diff_concurrency.max(1))
            .try_collect()
            .await?;

        let total = checked.len();
        let needs: Vec<ChunkHash> = checked
            .into_iter()
            .filter(|(_, found)| !found)
            .map(|(child, _)| child)
            .collect();

        debug!(%hash, level, children = total, missing = needs.len(), "stored manifest");
        Ok(needs)
    }
}
