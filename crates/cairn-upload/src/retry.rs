//! Exponential backoff with jitter for transient upload failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::UploadError;

/// Retry policy for one chunk submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry, doubled each time.
    pub retry_delay_ms: u64,
    /// Upper bound on the delay between attempts.
    pub retry_max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 200,
            retry_max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Run `f` until it succeeds, fails permanently, or retries run out.
///
/// Only errors for which [`UploadError::is_retryable`] holds are retried.
pub async fn retry_async<T, F, Fut>(
    config: &RetryConfig,
    op_name: &str,
    mut f: F,
) -> Result<T, UploadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UploadError>>,
{
    let mut delay_ms = config.retry_delay_ms;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                warn!(
                    op = op_name,
                    attempt,
                    max_retries = config.max_retries,
                    error = %e,
                    "transient error, retrying"
                );
                let jitter = rand::random::<u64>() % delay_ms.max(1);
                tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(config.retry_max_delay_ms);
            }
            Err(e) => return Err(e),
        }
    }
}
