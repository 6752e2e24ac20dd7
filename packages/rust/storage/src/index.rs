//! Vector index seam and the built-in in-memory implementation.
//!
//! The retrieval engine only sees [`VectorIndex`]; the embedding model and
//! index internals behind it are replaceable. [`MemoryIndex`] keeps every
//! chunk with its embedding in memory, answers queries by exhaustive cosine
//! similarity, and persists to `<dir>/index.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use newsrag_shared::{Chunk, NewsRagError, Result, RetrievalCandidate};

use crate::write_atomic;

/// File name of the persisted index inside its directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// On-disk format version.
const INDEX_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Similarity-search store over chunks.
///
/// Implementations provide their own internal consistency; callers hold a
/// `&mut` for inserts, so reads and inserts never overlap through this API.
pub trait VectorIndex: Send + Sync {
    /// Embed and store chunks.
    fn add_chunks(&mut self, chunks: Vec<Chunk>) -> Result<()>;

    /// The `k` stored chunks most similar to `query`, best first.
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>>;

    /// Persist the index into `dir`.
    fn save_to_path(&self, dir: &Path) -> Result<()>;

    /// Number of stored chunks.
    fn len(&self) -> usize;

    /// Whether the index holds no chunks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Text embedding model.
pub trait Embedder: Send + Sync {
    /// Embed text into a unit-length vector of [`Embedder::dimensions`] floats.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Output dimensionality.
    fn dimensions(&self) -> usize;
}

// ---------------------------------------------------------------------------
// HashingEmbedder
// ---------------------------------------------------------------------------

/// Feature-hashed bag of words with signed buckets, L2-normalized.
///
/// Deterministic across runs and platforms (FNV-1a), so persisted
/// embeddings stay valid.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dims as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Cosine similarity; zero when either vector is all zeros.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// ---------------------------------------------------------------------------
// MemoryIndex
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

/// Exhaustive-search in-memory index.
pub struct MemoryIndex {
    embedder: Box<dyn Embedder>,
    entries: Vec<IndexEntry>,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
        }
    }

    /// Load a persisted index from `dir`.
    ///
    /// A missing index file is [`NewsRagError::IndexUnavailable`]; a file
    /// written with a different dimensionality is a storage error.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_from_path(dir: &Path, embedder: Box<dyn Embedder>) -> Result<Self> {
        let path = dir.join(INDEX_FILE_NAME);
        if !path.exists() {
            return Err(NewsRagError::IndexUnavailable(format!(
                "no index at {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| NewsRagError::io(&path, e))?;
        let file: IndexFile = serde_json::from_str(&content)
            .map_err(|e| NewsRagError::Storage(format!("invalid {}: {e}", path.display())))?;

        if file.version != INDEX_FORMAT_VERSION {
            return Err(NewsRagError::Storage(format!(
                "unsupported index version {} (expected {INDEX_FORMAT_VERSION})",
                file.version
            )));
        }
        if file.dimensions != embedder.dimensions() {
            return Err(NewsRagError::Storage(format!(
                "index has {} dimensions, embedder produces {}",
                file.dimensions,
                embedder.dimensions()
            )));
        }

        info!(chunks = file.entries.len(), "vector index loaded");
        Ok(Self {
            embedder,
            entries: file.entries,
        })
    }

    /// Load from `dir` if an index exists there, otherwise start empty.
    pub fn open_or_create(dir: &Path, embedder: Box<dyn Embedder>) -> Result<Self> {
        if dir.join(INDEX_FILE_NAME).exists() {
            Self::load_from_path(dir, embedder)
        } else {
            debug!(dir = %dir.display(), "no existing index, starting empty");
            Ok(Self::new(embedder))
        }
    }
}

impl VectorIndex for MemoryIndex {
    fn add_chunks(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        let added = chunks.len();
        self.entries.extend(chunks.into_iter().map(|chunk| {
            let vector = self.embedder.embed(&chunk.text);
            IndexEntry { chunk, vector }
        }));
        debug!(added, total = self.entries.len(), "chunks indexed");
        Ok(())
    }

    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&query_vec, &entry.vector)))
            .collect();

        // Best first; insertion order breaks ties so results are deterministic.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| RetrievalCandidate {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    fn save_to_path(&self, dir: &Path) -> Result<()> {
        let file = IndexFile {
            version: INDEX_FORMAT_VERSION,
            dimensions: self.embedder.dimensions(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec(&file)
            .map_err(|e| NewsRagError::Storage(format!("index serialization failed: {e}")))?;
        write_atomic(&dir.join(INDEX_FILE_NAME), &json)?;
        info!(dir = %dir.display(), chunks = self.entries.len(), "vector index saved");
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_dir;
    use newsrag_shared::DocMetadata;

    fn chunk(text: &str, title: &str) -> Chunk {
        Chunk {
            text: text.into(),
            metadata: DocMetadata::new("test", title),
            ordinal: 0,
        }
    }

    fn index() -> MemoryIndex {
        MemoryIndex::new(Box::new(HashingEmbedder::new(256)))
    }

    #[test]
    fn embedding_is_unit_length_and_deterministic() {
        let e = HashingEmbedder::new(64);
        let a = e.embed("Large language models and agents");
        let b = e.embed("large LANGUAGE models, and agents!");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(e.embed("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn search_ranks_by_similarity() {
        let mut idx = index();
        idx.add_chunks(vec![
            chunk("protein folding biology microscopy", "Bio"),
            chunk("transformer language model training tokens", "LLM"),
            chunk("stock market earnings report", "Finance"),
        ])
        .unwrap();

        let hits = idx.similarity_search("language model training", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.metadata.title, "LLM");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn search_on_empty_index_is_empty() {
        let idx = index();
        assert!(idx.is_empty());
        assert!(idx.similarity_search("anything", 5).unwrap().is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = test_dir("index");
        let mut idx = index();
        idx.add_chunks(vec![chunk("agents and tools", "A"), chunk("diffusion images", "B")])
            .unwrap();
        idx.save_to_path(&dir).unwrap();

        let loaded = MemoryIndex::load_from_path(&dir, Box::new(HashingEmbedder::new(256))).unwrap();
        assert_eq!(loaded.len(), 2);
        let before = idx.similarity_search("agents", 2).unwrap();
        let after = loaded.similarity_search("agents", 2).unwrap();
        assert_eq!(before, after);

        let mismatch = MemoryIndex::load_from_path(&dir, Box::new(HashingEmbedder::new(128)));
        assert!(matches!(mismatch, Err(NewsRagError::Storage(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_index_is_unavailable() {
        let dir = test_dir("index-missing");
        let result = MemoryIndex::load_from_path(&dir, Box::new(HashingEmbedder::default()));
        assert!(matches!(result, Err(NewsRagError::IndexUnavailable(_))));

        let created = MemoryIndex::open_or_create(&dir, Box::new(HashingEmbedder::default())).unwrap();
        assert!(created.is_empty());
    }
}
