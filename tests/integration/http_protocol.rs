//! Raw wire protocol checks against a live server.

use axum::Router;
use axum::http::{StatusCode as AxumStatus, header};
use axum::routing::post;
use bytes::Bytes;
use cairn_integration_tests::TestServer;
use cairn_tree::encode_hashes;
use cairn_types::{ChunkHash, MANIFEST_CONTENT_TYPE};
use cairn_upload::{ChunkTransport, HttpTransport, RetryConfig, UploadError};
use reqwest::StatusCode;

async fn post_chunk(server: &TestServer, hash: &str, level: &str, body: Bytes) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!(
            "{}/api/upload?hash={hash}&level={level}",
            server.endpoint()
        ))
        .body(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_leaf_returns_no_content() {
    let server = TestServer::start().await;
    let data = Bytes::from_static(b"leaf");
    let hash = ChunkHash::from_data(&data).to_string();

    let response = post_chunk(&server, &hash, "0", data).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    server.stop().await;
}

#[tokio::test]
async fn test_manifest_needs_come_back_in_order() {
    let server = TestServer::start().await;
    let children: Vec<ChunkHash> = (0..6u8).map(|i| ChunkHash::from_data(&[i])).collect();

    // Store children 1 and 4 first.
    for i in [1u8, 4] {
        let leaf = Bytes::from(vec![i]);
        let hash = ChunkHash::from_data(&leaf).to_string();
        post_chunk(&server, &hash, "0", leaf).await;
    }

    let manifest = encode_hashes(&children);
    let hash = ChunkHash::from_data(&manifest).to_string();
    let response = post_chunk(&server, &hash, "1", manifest).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        MANIFEST_CONTENT_TYPE
    );

    let body = response.bytes().await.unwrap();
    let expected = encode_hashes(&[children[0], children[2], children[3], children[5]]);
    assert_eq!(body, expected);
    server.stop().await;
}

#[tokio::test]
async fn test_malformed_manifest_is_400_with_json_error() {
    let server = TestServer::start().await;
    let data = Bytes::from(vec![0u8; 33]);
    let hash = ChunkHash::from_data(&data).to_string();

    let response = post_chunk(&server, &hash, "1", data).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(body["error"], "malformed_manifest");
    server.stop().await;
}

#[tokio::test]
async fn test_flaky_backend_is_503() {
    let server = TestServer::start_flaky(1).await;
    let data = Bytes::from_static(b"x");
    let hash = ChunkHash::from_data(&data).to_string();

    let response = post_chunk(&server, &hash, "0", data.clone()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // The second attempt goes through.
    let response = post_chunk(&server, &hash, "0", data).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    server.stop().await;
}

#[tokio::test]
async fn test_head_and_get_chunk() {
    let server = TestServer::start().await;
    let data = Bytes::from_static(b"readable");
    let hash = ChunkHash::from_data(&data);
    let url = format!("{}/api/chunks/{hash}", server.endpoint());
    let client = reqwest::Client::new();

    assert_eq!(
        client.head(&url).send().await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
    post_chunk(&server, &hash.to_string(), "0", data.clone()).await;
    assert_eq!(client.head(&url).send().await.unwrap().status(), StatusCode::OK);
    assert_eq!(server.fetch_chunk(hash).await.unwrap(), data);
    server.stop().await;
}

/// Serve a fixed upload response from a throwaway server.
async fn fake_server(status: AxumStatus, body: &'static [u8]) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().route(
        "/api/upload",
        post(move || async move {
            (status, [(header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE)], body)
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn test_needs_body_of_bad_length_is_invalid() {
    let (endpoint, handle) = fake_server(AxumStatus::OK, &[7u8; 33]).await;
    let transport = HttpTransport::new(endpoint).with_retry(RetryConfig::none());

    let err = transport
        .submit(ChunkHash::from_data(b"m"), 1, Bytes::from_static(b"m"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::InvalidNeeds { len: 33 }));
    handle.abort();
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(format!("http://{addr}")).with_retry(RetryConfig::none());
    let err = transport
        .submit(ChunkHash::from_data(b"z"), 0, Bytes::from_static(b"z"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Transport(_)));
    assert!(err.is_retryable());
}
