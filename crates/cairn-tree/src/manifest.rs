//! Manifest codec.
//!
//! A manifest is the plain concatenation of its children's 32-byte hashes,
//! in order. Needs-list response bodies use the exact same layout.

use bytes::{Bytes, BytesMut};
use cairn_types::{ChunkHash, HASH_SIZE};

use crate::error::TreeError;

/// Concatenate hashes into a manifest payload.
pub fn encode_hashes(hashes: &[ChunkHash]) -> Bytes {
    let mut buf = BytesMut::with_capacity(hashes.len() * HASH_SIZE);
    for hash in hashes {
        buf.extend_from_slice(hash.as_bytes());
    }
    buf.freeze()
}

/// Split a manifest payload into its ordered hashes.
///
/// Fails with [`TreeError::MalformedManifest`] unless the length is a
/// multiple of [`HASH_SIZE`]. An empty payload yields an empty list.
pub fn decode_hashes(payload: &[u8]) -> Result<Vec<ChunkHash>, TreeError> {
    if payload.len() % HASH_SIZE != 0 {
        return Err(TreeError::MalformedManifest { len: payload.len() });
    }

    Ok(payload
        .chunks_exact(HASH_SIZE)
        .filter_map(ChunkHash::from_slice)
        .collect())
}
