//! Durable storage for newsrag: the extracted-content cache and the vector index.
//!
//! - [`FileCache`]: one text file per URL hash, written atomically
//! - [`VectorIndex`]: similarity-search seam; [`MemoryIndex`] is the in-process implementation
//! - [`write_metadata_sidecar`] / [`append_metadata_sidecar`]: per-document `metadata.json` next to the index
//!
//! Handles are constructed once at startup and passed explicitly to every
//! caller; nothing in this crate is process-global.

mod cache;
mod index;
mod sidecar;

use std::path::Path;

use newsrag_shared::{NewsRagError, Result};

pub use cache::{ContentCache, FileCache, cache_key};
pub use index::{Embedder, HashingEmbedder, INDEX_FILE_NAME, MemoryIndex, VectorIndex};
pub use sidecar::{
    METADATA_FILE_NAME, SidecarEntry, append_metadata_sidecar, read_metadata_sidecar,
    write_metadata_sidecar,
};

/// Write `content` to `target` via a uniquely named temp file and a rename.
///
/// Concurrent writers to the same target never observe a torn file; the
/// last rename wins.
pub(crate) fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| NewsRagError::Storage(format!("no parent dir for {}", target.display())))?;
    std::fs::create_dir_all(dir).map_err(|e| NewsRagError::io(dir, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::now_v7()));

    std::fs::write(&temp, content).map_err(|e| NewsRagError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        NewsRagError::io(target, e)
    })?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_dir(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("newsrag-{label}-{}", uuid::Uuid::now_v7()))
}
