//! File-based blob storage backend.
//!
//! Stores one file per blob with a 2-level fan-out directory structure:
//! `{base_dir}/{hex[0..2]}/{hex[2..4]}/{hex}.{kind}`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use cairn_types::{ChunkHash, ContentKind};
use tracing::{debug, error};

use crate::error::StoreError;
use crate::traits::{BlobStore, StoredBlob};

/// File extensions in lookup order. A manifest and a leaf can share a hash
/// only when their bytes are identical, so either copy answers a read.
const KINDS: [ContentKind; 2] = [ContentKind::Manifest, ContentKind::Chunk];

fn extension(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Chunk => "chunk",
        ContentKind::Manifest => "manifest",
    }
}

/// File-based blob store with 2-level fan-out directory layout.
///
/// Writes are atomic: data goes to a uniquely named temporary file first
/// and is then renamed into place, so concurrent writers of the same key
/// never observe a half-written blob.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new file store rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Directory holding every blob whose hash starts like `key`.
    fn fanout_dir(&self, key: &ChunkHash) -> PathBuf {
        let hex = key.to_string();
        self.base_dir.join(&hex[0..2]).join(&hex[2..4])
    }

    /// Full path for a blob of the given kind.
    fn blob_path(&self, key: &ChunkHash, kind: ContentKind) -> PathBuf {
        self.fanout_dir(key).join(format!("{key}.{}", extension(kind)))
    }
}

#[async_trait::async_trait]
impl BlobStore for FileStore {
    async fn put(&self, key: ChunkHash, data: Bytes, kind: ContentKind) -> Result<(), StoreError> {
        let path = self.blob_path(&key, kind);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension(format!(
            "{}.{:016x}.tmp",
            extension(kind),
            rand::random::<u64>()
        ));
        tokio::fs::write(&tmp_path, &data).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!(%key, path = %path.display(), size = data.len(), "stored blob to file");
        Ok(())
    }

    async fn exists(&self, key: ChunkHash) -> Result<bool, StoreError> {
        for kind in KINDS {
            match tokio::fs::metadata(self.blob_path(&key, kind)).await {
                Ok(_) => return Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Ok(false)
    }

    async fn get(&self, key: ChunkHash) -> Result<Option<StoredBlob>, StoreError> {
        for kind in KINDS {
            let path = self.blob_path(&key, kind);
            match tokio::fs::read(&path).await {
                Ok(data) => {
                    // Verify-on-read: a blob that no longer hashes to its key
                    // is reported, never served.
                    let actual = ChunkHash::from_data(&data);
                    if actual != key {
                        error!(expected = %key, %actual, "blob corruption detected on read");
                        return Err(StoreError::Corrupt {
                            expected: key,
                            actual,
                        });
                    }
                    return Ok(Some(StoredBlob {
                        data: Bytes::from(data),
                        kind,
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Ok(None)
    }
}
