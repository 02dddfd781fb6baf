//! Build-then-upload facade.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cairn_tree::{ChunkStore, TreeBuilder};
use cairn_types::{BLOCK_SIZE, DEFAULT_MAX_CONCURRENT_UPLOADS, TreeRoot, UploadSummary};
use tracing::info;

use crate::error::UploadError;
use crate::scheduler::{UploadScheduler, UploadStats};
use crate::transport::ChunkTransport;

/// Called with the summary of every upload that completes.
pub type CompletionCallback = Arc<dyn Fn(&UploadSummary) + Send + Sync>;

/// Settings for an [`Uploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploaderConfig {
    /// Submissions allowed at once.
    pub max_concurrency: usize,
    /// Largest chunk the builder produces. Must be a multiple of 32 and at
    /// least 64.
    pub block_size: usize,
    /// Drop local chunks once nothing that might need them is pending.
    pub discard_after_upload: bool,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENT_UPLOADS,
            block_size: BLOCK_SIZE,
            discard_after_upload: true,
        }
    }
}

/// Roots whose chunks may be discarded, held back while any upload that
/// could share their chunks is still running.
#[derive(Default)]
struct DiscardQueue {
    active: usize,
    finished: Vec<TreeRoot>,
}

/// One running upload. Reports its outcome to the discard queue on drop.
struct Pending<'a> {
    uploader: &'a Uploader,
    done: Option<TreeRoot>,
}

impl<'a> Pending<'a> {
    fn begin(uploader: &'a Uploader) -> Self {
        uploader.discard.lock().expect("lock poisoned").active += 1;
        Self {
            uploader,
            done: None,
        }
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        let roots = {
            let mut queue = self.uploader.discard.lock().expect("lock poisoned");
            queue.active -= 1;
            if let Some(root) = self.done.take() {
                queue.finished.push(root);
            }
            if queue.active > 0 {
                return;
            }
            std::mem::take(&mut queue.finished)
        };

        if !self.uploader.config.discard_after_upload {
            return;
        }
        for root in roots {
            self.uploader.scheduler.chunks().discard_tree(root);
        }
    }
}

/// Builds a tree for a named blob and uploads it.
pub struct Uploader {
    scheduler: UploadScheduler,
    config: UploaderConfig,
    on_complete: Option<CompletionCallback>,
    discard: Mutex<DiscardQueue>,
}

impl Uploader {
    /// Create an uploader with its own chunk store.
    pub fn new(transport: Arc<dyn ChunkTransport>, config: UploaderConfig) -> Self {
        let chunks = Arc::new(ChunkStore::new());
        Self {
            scheduler: UploadScheduler::new(transport, chunks, config.max_concurrency),
            config,
            on_complete: None,
            discard: Mutex::new(DiscardQueue::default()),
        }
    }

    /// Register a callback run after each successful upload.
    pub fn on_complete(mut self, callback: impl Fn(&UploadSummary) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    /// Build and upload `data`, returning its summary.
    pub async fn upload(
        &self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Result<UploadSummary, UploadError> {
        let name = name.into();
        let data = data.into();
        let size = data.len() as u64;

        let mut pending = Pending::begin(self);
        let root = TreeBuilder::with_block_size(self.chunks(), self.config.block_size)?.build(data);
        info!(%name, size, %root, "tree built, uploading");

        self.scheduler.upload(root).await?;
        pending.done = Some(root);
        drop(pending);

        let summary = UploadSummary {
            name,
            content_type: content_type.into(),
            size,
            root,
        };
        info!(name = %summary.name, size, %root, "upload complete");

        if let Some(callback) = &self.on_complete {
            callback(&summary);
        }
        Ok(summary)
    }

    /// Counters from the underlying scheduler.
    pub fn stats(&self) -> UploadStats {
        self.scheduler.stats()
    }

    /// The local chunk store trees are built into.
    pub fn chunks(&self) -> &ChunkStore {
        self.scheduler.chunks()
    }

    /// Settings in effect.
    pub fn config(&self) -> UploaderConfig {
        self.config
    }
}
