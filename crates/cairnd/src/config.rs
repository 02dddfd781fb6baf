//! TOML configuration for `cairnd`.
//!
//! Every section and field is optional; anything left out takes its
//! default. Command-line flags override file values in `main`.

use std::path::{Path, PathBuf};

use cairn_diff::DiffConfig;
use cairn_types::{BLOCK_SIZE, DEFAULT_MAX_CONCURRENT_UPLOADS};
use cairn_upload::{RetryConfig, UploaderConfig};
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Needs-diff server settings.
    pub server: ServerSection,
    /// Upload client settings.
    pub upload: UploadSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// Where the server keeps chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One file per chunk under `data_dir`.
    File,
    /// Process memory; lost on exit.
    Memory,
}

/// `[server]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address the HTTP API binds to.
    pub listen_addr: String,
    /// Directory for chunk files. A leading `~/` expands to the home directory.
    pub data_dir: PathBuf,
    /// Storage backend.
    pub backend: Backend,
    /// Reject chunks whose bytes do not hash to the claimed key.
    pub verify_integrity: bool,
    /// Existence checks in flight per manifest.
    pub diff_concurrency: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4830".to_string(),
            data_dir: default_data_dir(),
            backend: Backend::File,
            verify_integrity: true,
            diff_concurrency: DiffConfig::default().diff_concurrency,
        }
    }
}

/// `[upload]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    /// Base URL of the server.
    pub endpoint: String,
    /// Chunk submissions in flight at once.
    pub max_concurrency: usize,
    /// Retries per chunk after a transient failure.
    pub max_retries: u32,
    /// Initial retry delay, doubled per attempt.
    pub retry_delay_ms: u64,
    /// Retry delay cap.
    pub retry_max_delay_ms: u64,
    /// Free local chunks once an upload completes.
    pub discard_after_upload: bool,
}

impl Default for UploadSection {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            endpoint: "http://127.0.0.1:4830".to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENT_UPLOADS,
            max_retries: retry.max_retries,
            retry_delay_ms: retry.retry_delay_ms,
            retry_max_delay_ms: retry.retry_max_delay_ms,
            discard_after_upload: true,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cairn"))
        .unwrap_or_else(|| PathBuf::from(".cairn"))
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config: CliConfig = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content)?
            }
            None => Self::default(),
        };
        config.server.data_dir = expand_home(&config.server.data_dir);
        Ok(config)
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Settings for the needs-diff service.
    pub fn diff_config(&self) -> DiffConfig {
        DiffConfig {
            verify_integrity: self.server.verify_integrity,
            diff_concurrency: self.server.diff_concurrency,
        }
    }

    /// Retry policy for the HTTP transport.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.upload.max_retries,
            retry_delay_ms: self.upload.retry_delay_ms,
            retry_max_delay_ms: self.upload.retry_max_delay_ms,
        }
    }

    /// Settings for the uploader.
    pub fn uploader_config(&self) -> UploaderConfig {
        UploaderConfig {
            max_concurrency: self.upload.max_concurrency,
            block_size: BLOCK_SIZE,
            discard_after_upload: self.upload.discard_after_upload,
        }
    }
}
