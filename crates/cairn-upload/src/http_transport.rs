//! [`ChunkTransport`] over HTTP.

use bytes::Bytes;
use cairn_tree::decode_hashes;
use cairn_types::{ChunkHash, ContentKind};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::trace;

use crate::error::UploadError;
use crate::retry::{RetryConfig, retry_async};
use crate::transport::ChunkTransport;

/// JSON error body sent by the server.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Speaks `POST /api/upload?hash=&level=` to a remote needs-diff server.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Create a transport for the server at `endpoint`, e.g. `http://127.0.0.1:4830`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Create a transport that reuses an existing client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            client,
            endpoint,
            retry: RetryConfig::default(),
        }
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL requests go to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn submit_once(
        &self,
        hash: ChunkHash,
        level: u32,
        data: Bytes,
    ) -> Result<Vec<ChunkHash>, UploadError> {
        let url = format!("{}/api/upload?hash={hash}&level={level}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, ContentKind::for_level(level).mime())
            .body(data)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::NO_CONTENT => Ok(Vec::new()),
            StatusCode::OK => {
                let body = response.bytes().await?;
                trace!(%hash, level, len = body.len(), "needs list received");
                decode_hashes(&body).map_err(|_| UploadError::InvalidNeeds { len: body.len() })
            }
            _ => {
                let body = response.bytes().await.unwrap_or_default();
                let (code, message) = match serde_json::from_slice::<ErrorBody>(&body) {
                    Ok(err) => (err.error, err.message),
                    Err(_) => (
                        "unknown".to_string(),
                        String::from_utf8_lossy(&body).into_owned(),
                    ),
                };
                Err(UploadError::Rejected {
                    status: status.as_u16(),
                    code,
                    message,
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl ChunkTransport for HttpTransport {
    async fn submit(
        &self,
        hash: ChunkHash,
        level: u32,
        data: Bytes,
    ) -> Result<Vec<ChunkHash>, UploadError> {
        retry_async(&self.retry, "upload", || {
            self.submit_once(hash, level, data.clone())
        })
        .await
    }
}
