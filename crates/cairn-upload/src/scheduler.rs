//! Bounded-concurrency, dedup-aware tree upload.
//!
//! Each chunk is one task: submit it, then spawn a task per missing child
//! and join them all. Two pieces of shared state coordinate the tasks:
//!
//! - an in-flight set. A task inserts its hash in one locked step and keeps
//!   it there until its whole subtree has settled. A second task for the
//!   same hash finds it present and returns at once with nothing to do.
//! - a fair semaphore with `K` permits. A permit is held only around the
//!   network call, never while waiting on children, so a deep tree cannot
//!   exhaust the permits with parents blocked on their own descendants.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cairn_tree::ChunkStore;
use cairn_types::{ChunkHash, TreeRoot};
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::error::UploadError;
use crate::transport::ChunkTransport;

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Chunk submissions started, successful or not.
    pub calls: u64,
    /// Chunk submissions that succeeded.
    pub chunks_uploaded: u64,
    /// Payload bytes of successful submissions.
    pub bytes_sent: u64,
    /// Admissions skipped because the hash was already in flight.
    pub deduplicated: u64,
    /// Most submissions observed running at once.
    pub peak_concurrency: usize,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    chunks_uploaded: AtomicU64,
    bytes_sent: AtomicU64,
    deduplicated: AtomicU64,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Marks one submission as running; unmarks it when dropped.
struct ActiveCall<'a>(&'a Counters);

impl<'a> ActiveCall<'a> {
    fn start(counters: &'a Counters) -> Self {
        counters.calls.fetch_add(1, Ordering::Relaxed);
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Membership of one hash in the in-flight set.
struct InFlight {
    inner: Arc<Inner>,
    hash: ChunkHash,
}

impl InFlight {
    /// Atomically claim `hash`. `None` if another task already holds it.
    fn claim(inner: &Arc<Inner>, hash: ChunkHash) -> Option<Self> {
        let inserted = inner
            .in_flight
            .lock()
            .expect("lock poisoned")
            .insert(hash);
        inserted.then(|| Self {
            inner: inner.clone(),
            hash,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .expect("lock poisoned")
            .remove(&self.hash);
    }
}

struct Inner {
    transport: Arc<dyn ChunkTransport>,
    chunks: Arc<ChunkStore>,
    permits: Semaphore,
    max_concurrency: usize,
    in_flight: Mutex<HashSet<ChunkHash>>,
    counters: Counters,
}

impl Inner {
    /// Upload one chunk and, recursively, every child the server reports
    /// missing. Resolves once the whole subtree has settled.
    fn process(
        self: Arc<Self>,
        hash: ChunkHash,
        level: u32,
        data: Bytes,
    ) -> BoxFuture<'static, Result<(), UploadError>> {
        Box::pin(async move {
            let Some(_claim) = InFlight::claim(&self, hash) else {
                self.counters.deduplicated.fetch_add(1, Ordering::Relaxed);
                debug!(%hash, level, "already in flight");
                return Ok(());
            };

            let needs = self.submit(hash, level, data).await?;
            if needs.is_empty() {
                return Ok(());
            }
            if level == 0 {
                return Err(UploadError::UnexpectedNeeds {
                    hash,
                    count: needs.len(),
                });
            }

            let mut children = Vec::with_capacity(needs.len());
            for child in needs {
                let bytes = self
                    .chunks
                    .get(&child)
                    .ok_or(UploadError::MissingChunk(child))?;
                children.push((child, bytes));
            }

            let handles: Vec<_> = children
                .into_iter()
                .map(|(child, bytes)| tokio::spawn(self.clone().process(child, level - 1, bytes)))
                .collect();

            // Every child settles before the claim is released, even after
            // a sibling has failed.
            let mut first_err = None;
            for handle in handles {
                let outcome = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(UploadError::TaskFailed {
                        message: e.to_string(),
                    }),
                };
                if let Err(e) = outcome {
                    first_err.get_or_insert(e);
                }
            }

            match first_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    /// One network call, gated by a permit.
    async fn submit(
        &self,
        hash: ChunkHash,
        level: u32,
        data: Bytes,
    ) -> Result<Vec<ChunkHash>, UploadError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| UploadError::TaskFailed {
                message: e.to_string(),
            })?;
        let _active = ActiveCall::start(&self.counters);

        let size = data.len() as u64;
        match self.transport.submit(hash, level, data).await {
            Ok(needs) => {
                self.counters.chunks_uploaded.fetch_add(1, Ordering::Relaxed);
                self.counters.bytes_sent.fetch_add(size, Ordering::Relaxed);
                debug!(%hash, level, size, needs = needs.len(), "chunk uploaded");
                Ok(needs)
            }
            Err(e) => {
                error!(%hash, level, error = %e, "chunk upload failed");
                Err(e)
            }
        }
    }
}

/// Uploads trees built into a shared [`ChunkStore`].
///
/// Cloning is cheap; clones share the in-flight set, the permits, and the
/// counters, so concurrent uploads of overlapping trees deduplicate against
/// each other.
#[derive(Clone)]
pub struct UploadScheduler {
    inner: Arc<Inner>,
}

impl UploadScheduler {
    /// Create a scheduler allowing `max_concurrency` submissions at once.
    /// Values below 1 are raised to 1.
    pub fn new(
        transport: Arc<dyn ChunkTransport>,
        chunks: Arc<ChunkStore>,
        max_concurrency: usize,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                transport,
                chunks,
                permits: Semaphore::new(max_concurrency),
                max_concurrency,
                in_flight: Mutex::new(HashSet::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Upload `root` and everything beneath it the server is missing.
    ///
    /// Resolves when the whole tree has settled. Dropping the returned
    /// future does not cancel submissions already admitted.
    pub async fn upload(&self, root: TreeRoot) -> Result<(), UploadError> {
        let data = self
            .inner
            .chunks
            .get(&root.hash)
            .ok_or(UploadError::MissingChunk(root.hash))?;

        let task = tokio::spawn(self.inner.clone().process(root.hash, root.height, data));
        task.await.map_err(|e| UploadError::TaskFailed {
            message: e.to_string(),
        })?
    }

    /// Counter snapshot.
    pub fn stats(&self) -> UploadStats {
        let c = &self.inner.counters;
        UploadStats {
            calls: c.calls.load(Ordering::Relaxed),
            chunks_uploaded: c.chunks_uploaded.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            deduplicated: c.deduplicated.load(Ordering::Relaxed),
            peak_concurrency: c.peak.load(Ordering::SeqCst),
        }
    }

    /// Number of hashes currently claimed.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().expect("lock poisoned").len()
    }

    /// The concurrency bound.
    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// The chunk store children are read from.
    pub fn chunks(&self) -> &Arc<ChunkStore> {
        &self.inner.chunks
    }
}
