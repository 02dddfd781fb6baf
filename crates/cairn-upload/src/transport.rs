//! The seam between the scheduler and the needs-diff service.

use std::sync::Arc;

use bytes::Bytes;
use cairn_diff::NeedsDiffService;
use cairn_types::ChunkHash;

use crate::error::UploadError;

/// Delivers one chunk to a needs-diff service.
///
/// Returns the missing children of a manifest, in manifest order; an empty
/// list means the chunk is stored and nothing beneath it is needed.
#[async_trait::async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Submit `data` stored under `hash` at tree level `level`.
    async fn submit(
        &self,
        hash: ChunkHash,
        level: u32,
        data: Bytes,
    ) -> Result<Vec<ChunkHash>, UploadError>;
}

/// Calls a [`NeedsDiffService`] in the same process.
pub struct LocalTransport {
    service: Arc<NeedsDiffService>,
}

impl LocalTransport {
    /// Wrap a service.
    pub fn new(service: Arc<NeedsDiffService>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl ChunkTransport for LocalTransport {
    async fn submit(
        &self,
        hash: ChunkHash,
        level: u32,
        data: Bytes,
    ) -> Result<Vec<ChunkHash>, UploadError> {
        Ok(self.service.submit(hash, level, data).await?)
    }
}
