//! Client-side upload of cairn trees.
//!
//! - [`UploadScheduler`] walks a tree from its root, submitting each chunk
//!   and recursing into whatever the server reports missing, with at most
//!   `K` submissions running and no hash uploaded twice at once.
//! - [`ChunkTransport`] is the wire seam: [`HttpTransport`] talks to a
//!   remote server, [`LocalTransport`] calls a service in-process.
//! - [`Uploader`] builds a tree for a named blob, uploads it, and reports an
//!   [`UploadSummary`](cairn_types::UploadSummary).

mod error;
mod http_transport;
mod retry;
mod scheduler;
mod transport;
mod uploader;

pub use error::UploadError;
pub use http_transport::HttpTransport;
pub use retry::{RetryConfig, retry_async};
pub use scheduler::{UploadScheduler, UploadStats};
pub use transport::{ChunkTransport, LocalTransport};
pub use uploader::{CompletionCallback, Uploader, UploaderConfig};
