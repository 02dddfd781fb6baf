//! Shared test harness for cairn integration tests.
//!
//! Provides [`TestServer`], a needs-diff HTTP server on an ephemeral port
//! backed by a [`MemoryStore`] the test can inspect, optionally wrapped to
//! add latency or inject backend failures.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cairn_diff::NeedsDiffService;
use cairn_http::DiffServer;
use cairn_store::{BlobStore, FaultyStore, MemoryStore};
use cairn_tree::{ChunkStore, decode_hashes};
use cairn_types::{ChunkHash, TreeRoot};
use cairn_upload::{HttpTransport, RetryConfig};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// =========================================================================
// Test server
// =========================================================================

/// A running needs-diff server on `127.0.0.1:<ephemeral>`.
pub struct TestServer {
    /// Bound address.
    pub addr: SocketAddr,
    /// The memory store at the bottom of the backend stack.
    pub store: Arc<MemoryStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server over a plain memory store.
    pub async fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::start_with(store.clone(), store).await
    }

    /// Start a server whose backend stalls up to `max_delay` on every call.
    pub async fn start_slow(max_delay: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let slow = FaultyStore::new(store.clone()).with_latency(max_delay, 42);
        Self::start_with(Arc::new(slow), store).await
    }

    /// Start a server whose first `failures` backend writes fail.
    pub async fn start_flaky(failures: u32) -> Self {
        let store = Arc::new(MemoryStore::new());
        let flaky = FaultyStore::new(store.clone()).fail_puts(failures);
        Self::start_with(Arc::new(flaky), store).await
    }

    async fn start_with(backend: Arc<dyn BlobStore>, store: Arc<MemoryStore>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        let service = Arc::new(NeedsDiffService::new(backend));
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.await;
            };
            if let Err(e) = DiffServer::new(service)
                .serve_listener(listener, shutdown)
                .await
            {
                tracing::error!(error = %e, "test server failed");
            }
        });

        Self {
            addr,
            store,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Base URL, e.g. `http://127.0.0.1:40123`.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A transport pointed at this server with fast retries.
    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(self.endpoint()).with_retry(fast_retry())
    }

    /// Fetch one chunk back over `GET /api/chunks/{hash}`.
    pub async fn fetch_chunk(&self, hash: ChunkHash) -> Option<Bytes> {
        let response = reqwest::get(format!("{}/api/chunks/{hash}", self.endpoint()))
            .await
            .expect("GET chunk");
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return None;
        }
        Some(response.bytes().await.expect("chunk body"))
    }

    /// Download every chunk of a tree into a fresh local store.
    pub async fn download_tree(&self, root: TreeRoot) -> ChunkStore {
        let chunks = ChunkStore::new();
        let mut stack = vec![(root.hash, root.height)];
        while let Some((hash, level)) = stack.pop() {
            if chunks.contains(&hash) {
                continue;
            }
            let data = self
                .fetch_chunk(hash)
                .await
                .unwrap_or_else(|| panic!("chunk {hash} missing on server"));
            if level > 0 {
                for child in decode_hashes(&data).expect("valid manifest") {
                    stack.push((child, level - 1));
                }
            }
            chunks.insert(hash, data);
        }
        chunks
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Retry policy with millisecond delays.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        retry_delay_ms: 1,
        retry_max_delay_ms: 5,
    }
}

/// Deterministic, non-repeating test bytes.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}
