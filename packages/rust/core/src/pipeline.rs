//! End-to-end `ingest` pipeline: sources → fetch → documents → chunks → index.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use newsrag_fetch::FetchOrchestrator;
use newsrag_shared::{AppConfig, ChunkConfig, Document, FetchConfig, Result, expand_home};
use newsrag_storage::{
    Embedder, FileCache, HashingEmbedder, MemoryIndex, VectorIndex, append_metadata_sidecar,
    write_metadata_sidecar,
};

use crate::chunker::chunk_documents;
use crate::documents::{
    Record, builtin_company_records, cached_documents, dedup_documents, load_company_records,
};

/// Result of an `ingest` run.
#[derive(Debug)]
pub struct IngestReport {
    /// Cached documents not already covered by a fetched item.
    pub cached_docs: usize,
    /// Documents built from company records (parents and resources).
    pub record_docs: usize,
    /// Unique items returned by the fetch orchestrator.
    pub fetched_items: usize,
    /// Documents left after URL deduplication.
    pub documents: usize,
    /// Chunks added to the index.
    pub chunks: usize,
    /// Directory the index and sidecar were written to.
    pub index_dir: PathBuf,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once fetching finishes.
    fn items_fetched(&self, count: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn items_fetched(&self, _count: usize) {}
    fn done(&self, _report: &IngestReport) {}
}

/// The configured index, or an empty one if nothing was persisted yet.
pub fn open_index(config: &AppConfig) -> Result<MemoryIndex> {
    MemoryIndex::open_or_create(&config.index_dir(), embedder(config))
}

/// The persisted index. Fails with `IndexUnavailable` if none exists.
pub fn load_index(config: &AppConfig) -> Result<MemoryIndex> {
    MemoryIndex::load_from_path(&config.index_dir(), embedder(config))
}

fn embedder(config: &AppConfig) -> Box<dyn Embedder> {
    Box::new(HashingEmbedder::new(config.index.dimensions))
}

/// Run the full ingest pipeline into `index`.
///
/// 1. Fetch all sources (at most `max_docs` unique items)
/// 2. Load company records: the bundled profiles and/or a configured file
/// 3. Load previously cached page text not already covered by a fetched item
/// 4. Deduplicate documents by URL (fetched items win)
/// 5. Chunk, index, and persist the index plus its metadata sidecar
///
/// When `index` already holds chunks the sidecar is extended rather than
/// replaced.
#[instrument(skip_all, fields(max_docs = max_docs))]
pub async fn ingest(
    config: &AppConfig,
    index: &mut dyn VectorIndex,
    max_docs: usize,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    let start = Instant::now();
    let appending = !index.is_empty();

    let cache = Arc::new(
        FileCache::open(config.cache_dir())?
            .with_ttl(config.cache.ttl_secs.map(Duration::from_secs)),
    );

    // --- Phase 1: Fetch ---
    progress.phase("Fetching sources");
    let sources = config.sources();
    let orchestrator = FetchOrchestrator::new(FetchConfig::from(config), cache.clone())?;
    let items = orchestrator.fetch_all(&sources, max_docs).await;
    let fetched_items = items.len();
    progress.items_fetched(fetched_items);

    let fetched_text: HashSet<String> = items
        .iter()
        .map(|item| item.content.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    let mut docs: Vec<Document> = items
        .into_iter()
        .flat_map(|item| Record::FeedItem(item).into_documents())
        .collect();

    // --- Phase 2: Static records ---
    progress.phase("Loading company records");
    let mut records = Vec::new();
    if config.index.builtin_companies {
        records.extend(builtin_company_records()?);
    }
    if let Some(path) = &config.index.companies_file {
        records.extend(load_company_records(&expand_home(path))?);
    }
    let before = docs.len();
    docs.extend(
        records
            .into_iter()
            .flat_map(|record| Record::Company(record).into_documents()),
    );
    let record_docs = docs.len() - before;

    // --- Phase 3: Cache ---
    progress.phase("Loading cached documents");
    let cached: Vec<Document> = cached_documents(&cache)?
        .into_iter()
        .filter(|doc| !fetched_text.contains(doc.text.as_str()))
        .collect();
    let cached_docs = cached.len();
    docs.extend(cached);

    // --- Phase 4: Dedup ---
    let docs = dedup_documents(docs);

    // --- Phase 5: Chunk + index ---
    progress.phase("Indexing documents");
    let chunks = chunk_documents(&docs, ChunkConfig::from(config));
    let chunk_count = chunks.len();
    index.add_chunks(chunks)?;

    let index_dir = config.index_dir();
    index.save_to_path(&index_dir)?;
    if appending {
        append_metadata_sidecar(&index_dir, &docs)?;
    } else {
        write_metadata_sidecar(&index_dir, &docs)?;
    }

    let report = IngestReport {
        cached_docs,
        record_docs,
        fetched_items,
        documents: docs.len(),
        chunks: chunk_count,
        index_dir,
        elapsed: start.elapsed(),
    };

    info!(
        documents = report.documents,
        chunks = report.chunks,
        appending,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "ingest complete"
    );

    progress.done(&report);
    Ok(report)
}
