//! `cairnd`: serve, upload, and hash content-addressed chunk trees.
//!
//! # Usage
//!
//! ```text
//! cairnd serve                              # serve the needs-diff API
//! cairnd serve --memory -l 127.0.0.1:5000   # in-memory, custom address
//! cairnd upload photo.jpg notes.txt         # upload files to the server
//! cairnd upload -e http://host:4830 -j 4 big.iso
//! cairnd hash big.iso                       # print root hash/height only
//! ```

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use cairn_diff::NeedsDiffService;
use cairn_http::DiffServer;
use cairn_store::{BlobStore, FileStore, MemoryStore};
use cairn_tree::{ChunkStore, TreeBuilder};
use cairn_types::{CHUNK_CONTENT_TYPE, UploadSummary};
use cairn_upload::{HttpTransport, Uploader};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use config::{Backend, CliConfig};

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "cairnd",
    version,
    about = "Content-addressed chunk tree server and uploader"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, env = "CAIRN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the needs-diff HTTP service.
    Serve {
        /// Override listen address (e.g. "127.0.0.1:4831").
        #[arg(short, long)]
        listen_addr: Option<String>,

        /// Override data directory.
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Keep chunks in memory only.
        #[arg(short, long)]
        memory: bool,
    },

    /// Build and upload files, transferring only chunks the server lacks.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override server URL.
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Override the number of chunk uploads in flight.
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Content type reported for every file. Guessed from the extension
        /// when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Print a file's root hash and tree height without uploading.
    Hash {
        /// File to hash.
        file: PathBuf,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Serve {
            listen_addr,
            data_dir,
            memory,
        } => {
            // CLI args override config file values.
            if let Some(addr) = listen_addr {
                config.server.listen_addr = addr;
            }
            if let Some(dir) = data_dir {
                config.server.data_dir = dir;
            }
            if memory {
                config.server.backend = Backend::Memory;
            }
            cmd_serve(config).await
        }
        Commands::Upload {
            files,
            endpoint,
            concurrency,
            content_type,
        } => {
            if let Some(endpoint) = endpoint {
                config.upload.endpoint = endpoint;
            }
            if let Some(n) = concurrency {
                config.upload.max_concurrency = n;
            }
            cmd_upload(&config, &files, content_type.as_deref()).await
        }
        Commands::Hash { file } => cmd_hash(&file).await,
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// cairnd serve
// -----------------------------------------------------------------------

async fn cmd_serve(config: CliConfig) -> Result<()> {
    let server = &config.server;
    info!(
        addr = %server.listen_addr,
        backend = ?server.backend,
        data_dir = %server.data_dir.display(),
        verify_integrity = server.verify_integrity,
        diff_concurrency = server.diff_concurrency,
        "starting cairnd"
    );

    let store: Arc<dyn BlobStore> = match server.backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::File => Arc::new(
            FileStore::new(&server.data_dir).context("failed to open data directory")?,
        ),
    };

    let service = Arc::new(NeedsDiffService::with_config(store, config.diff_config()));
    DiffServer::new(service)
        .serve_with_shutdown(&server.listen_addr, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("cairnd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    info!("shutdown requested");
}

// -----------------------------------------------------------------------
// cairnd upload
// -----------------------------------------------------------------------

async fn cmd_upload(config: &CliConfig, files: &[PathBuf], content_type: Option<&str>) -> Result<()> {
    let transport =
        HttpTransport::new(config.upload.endpoint.as_str()).with_retry(config.retry_config());
    let uploader = Uploader::new(Arc::new(transport), config.uploader_config())
        .on_complete(|summary| println!("{}", completion_line(summary)));

    let start = Instant::now();
    let uploads = files.iter().map(|path| {
        let uploader = &uploader;
        async move {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let content_type = content_type
                .map(str::to_string)
                .unwrap_or_else(|| guess_content_type(path));
            uploader
                .upload(display_name(path), content_type, data)
                .await
                .with_context(|| format!("failed to upload {}", path.display()))
        }
    });
    let results = futures::future::join_all(uploads).await;

    let stats = uploader.stats();
    info!(
        files = files.len(),
        calls = stats.calls,
        chunks = stats.chunks_uploaded,
        bytes = stats.bytes_sent,
        deduplicated = stats.deduplicated,
        peak_concurrency = stats.peak_concurrency,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "uploads finished"
    );

    let mut failed = 0;
    for result in results {
        if let Err(e) = result {
            error!("{e:#}");
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} uploads failed; rerun to resume", files.len());
    }
    Ok(())
}

/// `Upload Complete: <name> <type> (<size>) <hash>/<height>`
fn completion_line(summary: &UploadSummary) -> String {
    format!(
        "Upload Complete: {} {} ({}) {}",
        summary.name,
        summary.content_type,
        format_bytes(summary.size),
        summary.root
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| CHUNK_CONTENT_TYPE.to_string())
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

// -----------------------------------------------------------------------
// cairnd hash
// -----------------------------------------------------------------------

async fn cmd_hash(path: &Path) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let chunks = ChunkStore::new();
    let root = TreeBuilder::new(&chunks).build(data);
    println!("{root}");
    Ok(())
}
