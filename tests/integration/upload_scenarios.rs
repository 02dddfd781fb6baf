//! Uploads over HTTP against a live server.

use std::sync::Arc;
use std::time::Duration;

use cairn_integration_tests::{TestServer, noise};
use cairn_store::BlobStore;
use cairn_tree::reassemble;
use cairn_types::BLOCK_SIZE;
use cairn_upload::{ChunkTransport, RetryConfig, UploadError, Uploader, UploaderConfig};

fn uploader(server: &TestServer, config: UploaderConfig) -> Uploader {
    Uploader::new(Arc::new(server.transport()), config)
}

fn small_blocks(max_concurrency: usize) -> UploaderConfig {
    UploaderConfig {
        max_concurrency,
        block_size: 64,
        discard_after_upload: false,
    }
}

#[tokio::test]
async fn test_ten_bytes_is_one_leaf_and_one_store_call() {
    let server = TestServer::start().await;
    let uploader = uploader(&server, UploaderConfig::default());

    let summary = uploader
        .upload("a.txt", "text/plain", b"0123456789".to_vec())
        .await
        .unwrap();

    assert_eq!(summary.root.height, 0);
    assert_eq!(server.store.put_count(), 1);
    assert_eq!(uploader.stats().calls, 1);
    server.stop().await;
}

#[tokio::test]
async fn test_two_leaves_under_one_manifest() {
    let server = TestServer::start().await;
    let uploader = uploader(&server, UploaderConfig::default());

    let summary = uploader
        .upload("b.bin", "application/octet-stream", noise(300_000, 1))
        .await
        .unwrap();

    assert_eq!(summary.root.height, 1);
    assert_eq!(summary.size, 300_000);
    assert_eq!(uploader.stats().calls, 3);
    assert_eq!(server.store.put_count(), 3);

    let manifest = server.fetch_chunk(summary.root.hash).await.unwrap();
    assert_eq!(manifest.len(), 64);
    server.stop().await;
}

#[tokio::test]
async fn test_reupload_after_success_sends_only_the_root() {
    let server = TestServer::start().await;
    let uploader = uploader(&server, UploaderConfig::default());
    let data = noise(300_000, 2);

    let first = uploader.upload("c.bin", "x", data.clone()).await.unwrap();
    let calls = uploader.stats().calls;
    let puts = server.store.put_count();

    let second = uploader.upload("c.bin", "x", data).await.unwrap();
    assert_eq!(first.root, second.root);
    assert_eq!(uploader.stats().calls - calls, 1);
    assert_eq!(server.store.put_count() - puts, 1);
    server.stop().await;
}

#[tokio::test]
async fn test_deep_tree_round_trips_through_server() {
    let server = TestServer::start().await;
    let uploader = uploader(&server, small_blocks(4));
    let data = noise(20_000, 3);

    let summary = uploader.upload("deep", "x", data.clone()).await.unwrap();
    assert!(summary.root.height >= 3);
    assert!(uploader.stats().peak_concurrency <= 4);

    let downloaded = server.download_tree(summary.root).await;
    assert_eq!(reassemble(summary.root, &downloaded).unwrap(), data);
    server.stop().await;
}

#[tokio::test]
async fn test_slow_backend_respects_concurrency_bound() {
    let server = TestServer::start_slow(Duration::from_millis(6)).await;
    let uploader = uploader(&server, small_blocks(3));

    let summary = uploader
        .upload("slow", "x", noise(64 * 64, 4))
        .await
        .unwrap();

    let stats = uploader.stats();
    assert!(stats.peak_concurrency <= 3, "peak {}", stats.peak_concurrency);
    assert!(server.store.exists(summary.root.hash).await.unwrap());
    assert_eq!(server.store.len(), uploader.chunks().len());
    server.stop().await;
}

#[tokio::test]
async fn test_transient_backend_failures_are_retried() {
    let server = TestServer::start_flaky(2).await;
    let uploader = uploader(&server, UploaderConfig::default());

    uploader
        .upload("flaky", "x", noise(300_000, 5))
        .await
        .unwrap();
    assert_eq!(server.store.len(), 3);
    server.stop().await;
}

#[tokio::test]
async fn test_failure_without_retries_then_full_retry_converges() {
    let server = TestServer::start_flaky(1).await;
    let no_retry = server.transport().with_retry(RetryConfig::none());
    let data = noise(300_000, 6);

    let strict = Uploader::new(Arc::new(no_retry), UploaderConfig::default());
    let err = strict.upload("r", "x", data.clone()).await.unwrap_err();
    assert!(matches!(err, UploadError::Rejected { status: 503, .. }));
    assert!(err.is_retryable());

    let retry = uploader(&server, UploaderConfig::default());
    let summary = retry.upload("r", "x", data).await.unwrap();
    assert_eq!(retry.stats().calls, 3);
    assert!(server.store.exists(summary.root.hash).await.unwrap());
    server.stop().await;
}

#[tokio::test]
async fn test_malformed_manifest_surfaces_as_rejection() {
    let server = TestServer::start().await;
    let transport = server.transport();
    let data = bytes::Bytes::from(vec![5u8; 33]);
    let hash = cairn_types::ChunkHash::from_data(&data);

    let err = transport.submit(hash, 1, data).await.unwrap_err();
    match err {
        UploadError::Rejected { status, code, .. } => {
            assert_eq!(status, 400);
            assert_eq!(code, "malformed_manifest");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_files_sharing_content_share_chunks() {
    let server = TestServer::start().await;
    let uploader = uploader(&server, UploaderConfig::default());

    let shared = noise(BLOCK_SIZE, 7);
    let mut a = shared.clone();
    a.extend_from_slice(&noise(1000, 8));
    let mut b = shared;
    b.extend_from_slice(&noise(1000, 9));

    uploader.upload("a", "x", a).await.unwrap();
    let leaves_before = server.store.len();
    uploader.upload("b", "x", b).await.unwrap();

    // Only b's manifest and its distinct tail leaf are new.
    assert_eq!(server.store.len() - leaves_before, 2);
    server.stop().await;
}
