//! Depth-first traversal of built trees.

use bytes::Bytes;
use cairn_types::{ChunkHash, TreeRoot};

use crate::chunk_store::ChunkStore;
use crate::error::TreeError;
use crate::manifest::decode_hashes;

/// Visit every chunk of a tree, parents before children, children in
/// manifest order.
///
/// The visitor sees each occurrence, so a chunk repeated within a manifest
/// is visited once per reference.
pub fn visit_tree<F>(root: TreeRoot, store: &ChunkStore, visitor: &mut F) -> Result<(), TreeError>
where
    F: FnMut(ChunkHash, u32, &Bytes),
{
    visit(root.hash, root.height, store, visitor)
}

fn visit<F>(hash: ChunkHash, level: u32, store: &ChunkStore, visitor: &mut F) -> Result<(), TreeError>
where
    F: FnMut(ChunkHash, u32, &Bytes),
{
    let data = store.get(&hash).ok_or(TreeError::ChunkNotFound(hash))?;
    visitor(hash, level, &data);

    if level == 0 {
        return Ok(());
    }

    for child in decode_hashes(&data)? {
        visit(child, level - 1, store, visitor)?;
    }
    Ok(())
}

/// Rebuild the original bytes of a tree by concatenating its leaves in order.
pub fn reassemble(root: TreeRoot, store: &ChunkStore) -> Result<Vec<u8>, TreeError> {
    let mut out = Vec::new();
    visit_tree(root, store, &mut |_hash, level, data| {
        if level == 0 {
            out.extend_from_slice(data);
        }
    })?;
    Ok(out)
}
