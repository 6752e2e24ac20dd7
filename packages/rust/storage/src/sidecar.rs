//! `metadata.json` sidecar written next to the vector index.
//!
//! One entry per source document (not per chunk), for inspecting what an
//! index was built from without loading it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use newsrag_shared::{Document, NewsRagError, Result};

use crate::write_atomic;

/// File name of the sidecar inside the index directory.
pub const METADATA_FILE_NAME: &str = "metadata.json";

const MISSING: &str = "N/A";

/// Summary of one indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarEntry {
    pub title: String,
    pub source: String,
    pub published_date: String,
    pub url: String,
}

impl From<&Document> for SidecarEntry {
    fn from(doc: &Document) -> Self {
        let meta = &doc.metadata;
        Self {
            title: meta.title.clone(),
            source: meta.source.clone(),
            published_date: meta.published_date.clone().unwrap_or_else(|| MISSING.into()),
            url: meta.url.clone().unwrap_or_else(|| MISSING.into()),
        }
    }
}

/// Write the sidecar for `docs` into `dir`. Returns the number of entries.
pub fn write_metadata_sidecar(dir: &Path, docs: &[Document]) -> Result<usize> {
    let entries: Vec<SidecarEntry> = docs.iter().map(SidecarEntry::from).collect();
    write_entries(dir, &entries)
}

/// Add `docs` to the sidecar already in `dir` (if any), skipping entries it
/// already lists. Returns the total number of entries.
pub fn append_metadata_sidecar(dir: &Path, docs: &[Document]) -> Result<usize> {
    let mut entries = read_metadata_sidecar(dir)?;
    for entry in docs.iter().map(SidecarEntry::from) {
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    write_entries(dir, &entries)
}

/// Entries of the sidecar in `dir`; empty when there is none.
pub fn read_metadata_sidecar(dir: &Path) -> Result<Vec<SidecarEntry>> {
    let path = dir.join(METADATA_FILE_NAME);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path).map_err(|e| NewsRagError::io(&path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| NewsRagError::Storage(format!("invalid {}: {e}", path.display())))
}

fn write_entries(dir: &Path, entries: &[SidecarEntry]) -> Result<usize> {
    let json = serde_json::to_string_pretty(&entries)
        .map_err(|e| NewsRagError::Storage(format!("sidecar serialization failed: {e}")))?;
    write_atomic(&dir.join(METADATA_FILE_NAME), json.as_bytes())?;
    tracing::debug!(entries = entries.len(), "metadata sidecar written");
    Ok(entries.len())
}
