//! Shared types and identifiers for cairn.
//!
//! This crate defines the core vocabulary used across the workspace:
//! the content identifier ([`ChunkHash`]), the root of a built tree
//! ([`TreeRoot`]), the storage content kind ([`ContentKind`]), the
//! completion record of an upload ([`UploadSummary`]), and the sizing
//! constants every other crate agrees on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Size of a content hash in bytes (SHA-256).
pub const HASH_SIZE: usize = 32;

/// Maximum size of any stored chunk, leaf or manifest (256 KiB).
pub const BLOCK_SIZE: usize = 1 << 18;

/// Default number of chunk uploads allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 10;

/// MIME type for raw leaf chunks.
pub const CHUNK_CONTENT_TYPE: &str = "application/octet-stream";

/// MIME type for manifest chunks and needs-list bodies.
pub const MANIFEST_CONTENT_TYPE: &str = "application/x-swarm-manifest";

// ---------------------------------------------------------------------------
// ChunkHash
// ---------------------------------------------------------------------------

/// Content-addressed identifier for a chunk: `sha256(chunk_data)`.
///
/// Equal content always yields an equal hash, so the hash doubles as the
/// storage key on both the client and the backend.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ChunkHash([u8; HASH_SIZE]);

impl ChunkHash {
    /// Create a hash by digesting arbitrary data with SHA-256.
    pub fn from_data(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Return the raw 32-byte representation.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Build a hash from a slice that must be exactly [`HASH_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; HASH_SIZE]>::try_from(bytes).ok().map(Self)
    }
}

impl From<[u8; HASH_SIZE]> for ChunkHash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ChunkHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkHash({self})")
    }
}

/// Error returned when parsing a [`ChunkHash`] from its hex form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHashError {
    /// The string is not exactly 64 characters long.
    #[error("invalid hash length: expected {expected} hex chars, got {actual}")]
    InvalidLength {
        /// Required number of characters.
        expected: usize,
        /// Characters actually supplied.
        actual: usize,
    },

    /// The string contains a non-hex character.
    #[error("invalid hex character {0:?} in hash")]
    InvalidChar(char),
}

impl FromStr for ChunkHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let length_error = ParseHashError::InvalidLength {
            expected: HASH_SIZE * 2,
            actual: s.len(),
        };
        if s.len() != HASH_SIZE * 2 {
            return Err(length_error);
        }

        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| match e {
            hex::FromHexError::InvalidHexCharacter { c, .. } => ParseHashError::InvalidChar(c),
            _ => length_error,
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for ChunkHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChunkHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tree and storage types
// ---------------------------------------------------------------------------

/// Root of a built hash tree.
///
/// `height` is the level of the root chunk: 0 for a single raw leaf, `k > 0`
/// when the root is a manifest over level `k - 1` chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeRoot {
    /// Hash of the root chunk.
    pub hash: ChunkHash,
    /// Level of the root chunk.
    pub height: u32,
}

impl fmt::Display for TreeRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hash, self.height)
    }
}

/// How a stored chunk should be interpreted by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    /// Raw leaf data (level 0).
    Chunk,
    /// Concatenated child hashes (level > 0).
    Manifest,
}

impl ContentKind {
    /// Content kind implied by a tree level.
    pub fn for_level(level: u32) -> Self {
        if level == 0 { Self::Chunk } else { Self::Manifest }
    }

    /// MIME type used on the wire and in the backend.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Chunk => CHUNK_CONTENT_TYPE,
            Self::Manifest => MANIFEST_CONTENT_TYPE,
        }
    }
}

/// Record emitted when an upload finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Display name of the uploaded blob (usually a file name).
    pub name: String,
    /// MIME type supplied by the caller.
    pub content_type: String,
    /// Size of the original blob in bytes.
    pub size: u64,
    /// Root hash and height of the uploaded tree.
    pub root: TreeRoot,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
