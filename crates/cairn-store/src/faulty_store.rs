//! Fault injection for backend tests.
//!
//! [`FaultyStore`] sits in front of another [`BlobStore`] and can stall each
//! call for a seeded random delay, fail the first few writes as
//! unavailable, and record how many existence checks overlap. The needs-diff
//! service fans existence checks out concurrently, so the overlap count is
//! what tests assert the fan-out bound against.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use cairn_types::{ChunkHash, ContentKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{BlobStore, StoredBlob};

/// A [`BlobStore`] wrapper that injects latency and write failures.
pub struct FaultyStore {
    inner: Arc<dyn BlobStore>,
    max_delay: Duration,
    rng: Mutex<StdRng>,
    failing_puts: AtomicU32,
    checks_in_flight: AtomicUsize,
    peak_checks: AtomicUsize,
}

/// Decrements the in-flight existence check count on drop.
struct CheckGuard<'a>(&'a AtomicUsize);

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FaultyStore {
    /// Wrap `inner` with no delay and no failures.
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            max_delay: Duration::ZERO,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            failing_puts: AtomicU32::new(0),
            checks_in_flight: AtomicUsize::new(0),
            peak_checks: AtomicUsize::new(0),
        }
    }

    /// Stall every call for a random duration up to `max_delay`, drawn from
    /// an RNG seeded with `seed`.
    pub fn with_latency(self, max_delay: Duration, seed: u64) -> Self {
        Self {
            max_delay,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Fail the next `count` writes with [`StoreError::Unavailable`].
    pub fn fail_puts(self, count: u32) -> Self {
        self.failing_puts.store(count, Ordering::SeqCst);
        self
    }

    /// Most existence checks ever running at the same time.
    pub fn peak_concurrent_checks(&self) -> usize {
        self.peak_checks.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        if self.max_delay.is_zero() {
            return;
        }
        let micros = self.max_delay.as_micros() as u64;
        let wait = self
            .rng
            .lock()
            .expect("lock poisoned")
            .random_range(0..=micros);
        tokio::time::sleep(Duration::from_micros(wait)).await;
    }
}

#[async_trait::async_trait]
impl BlobStore for FaultyStore {
    async fn put(&self, key: ChunkHash, data: Bytes, kind: ContentKind) -> Result<(), StoreError> {
        self.stall().await;
        let fail = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            debug!(%key, "injected write failure");
            return Err(StoreError::Unavailable {
                message: "injected write failure".into(),
            });
        }
        self.inner.put(key, data, kind).await
    }

    async fn exists(&self, key: ChunkHash) -> Result<bool, StoreError> {
        let now = self.checks_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = CheckGuard(&self.checks_in_flight);
        self.peak_checks.fetch_max(now, Ordering::SeqCst);

        self.stall().await;
        self.inner.exists(key).await
    }

    async fn get(&self, key: ChunkHash) -> Result<Option<StoredBlob>, StoreError> {
        self.stall().await;
        self.inner.get(key).await
    }
}
