//! Concurrent multi-source fetch orchestrator.
//!
//! Each source is fetched in its own task. Feed sources are a single GET;
//! paged API sources are walked sequentially with `start` / `max_results`
//! until the per-source budget is met; Entrez sources are one search plus one
//! summary request sized to the budget. Inside each page, item content is
//! extracted concurrently (bounded by a semaphore) and one item's failure
//! never affects its siblings. Source-level failures are logged and yield
//! zero items. Results are merged in source order, deduplicated by canonical
//! URL (first seen wins), and truncated to the global budget.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use newsrag_shared::{
    FetchConfig, NewsRagError, RawItem, Result, SourceDescriptor, SourceKind, canonical_url,
};
use newsrag_storage::ContentCache;

use crate::entrez;
use crate::extract::ExtractorChain;
use crate::feed::{FeedEntry, parse_feed};
use crate::http::HttpClient;

// ---------------------------------------------------------------------------
// Budgeting and merging
// ---------------------------------------------------------------------------

/// Items each source may contribute: an even share of `max_items`, never
/// below `floor`, never above `max_items`.
pub fn per_source_budget(max_items: usize, sources: usize, floor: usize) -> usize {
    if sources == 0 {
        return 0;
    }
    (max_items / sources).max(floor).min(max_items)
}

/// Flatten per-source batches, dropping repeated URLs (first seen wins) and
/// truncating to `cap`. Items without a URL are always kept.
pub fn merge_items(batches: Vec<Vec<RawItem>>, cap: usize) -> Vec<RawItem> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for item in batches.into_iter().flatten() {
        if merged.len() >= cap {
            break;
        }
        if let Some(url) = &item.url {
            if !seen.insert(url.clone()) {
                debug!(%url, source = %item.source, "duplicate URL dropped");
                continue;
            }
        }
        merged.push(item);
    }

    merged
}

// ---------------------------------------------------------------------------
// FetchOrchestrator
// ---------------------------------------------------------------------------

/// Fetches every configured source concurrently and extracts item content.
#[derive(Clone)]
pub struct FetchOrchestrator {
    http: HttpClient,
    extractor: Arc<ExtractorChain>,
    config: FetchConfig,
}

impl FetchOrchestrator {
    /// Build an orchestrator with the standard extractor chain over `cache`.
    pub fn new(config: FetchConfig, cache: Arc<dyn ContentCache>) -> Result<Self> {
        let http = HttpClient::new(config.timeout_secs)?;
        let extractor = ExtractorChain::standard(http.clone(), cache, &config);
        Ok(Self {
            http,
            extractor: Arc::new(extractor),
            config,
        })
    }

    /// Replace the extractor chain.
    pub fn with_extractor(mut self, extractor: ExtractorChain) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Fetch all `sources` and return at most `max_items` unique items.
    #[instrument(skip_all, fields(sources = sources.len(), max_items = max_items))]
    pub async fn fetch_all(&self, sources: &[SourceDescriptor], max_items: usize) -> Vec<RawItem> {
        let budget = per_source_budget(
            max_items,
            sources.len(),
            self.config.min_items_per_source,
        );
        info!(budget, "fetching sources");

        let handles: Vec<_> = sources
            .iter()
            .cloned()
            .map(|source| {
                let this = self.clone();
                tokio::spawn(async move {
                    let result = this.fetch_source(&source, budget).await;
                    (source.name, result)
                })
            })
            .collect();

        let mut batches = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((name, Ok(items))) => {
                    debug!(source = %name, count = items.len(), "source fetched");
                    batches.push(items);
                }
                Ok((name, Err(e))) => warn!(source = %name, error = %e, "source failed"),
                Err(e) => warn!(error = %e, "source task panicked"),
            }
        }

        let fetched: usize = batches.iter().map(Vec::len).sum();
        let merged = merge_items(batches, max_items);
        info!(fetched, unique = merged.len(), "fetch complete");
        merged
    }

    async fn fetch_source(&self, source: &SourceDescriptor, budget: usize) -> Result<Vec<RawItem>> {
        match source.kind {
            SourceKind::Feed => {
                let entries = self.fetch_entries(&source.url).await?;
                let entries = entries.into_iter().take(budget).collect();
                Ok(self.extract_items(source, entries).await)
            }
            SourceKind::PagedApi => self.fetch_paged(source, budget).await,
            SourceKind::EntrezApi => {
                let entries = self.fetch_entrez(&source.url, budget).await?;
                Ok(self.extract_items(source, entries).await)
            }
        }
    }

    /// Search, then resolve the ids to summaries. No ids means no items.
    async fn fetch_entrez(&self, url: &str, budget: usize) -> Result<Vec<FeedEntry>> {
        let search = self.http.get_text(&entrez::search_url(url, budget)?).await?;
        let ids = entrez::parse_search_ids(&search)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let summaries = self.http.get_text(&entrez::summary_url(url, &ids)?).await?;
        let mut entries = entrez::parse_summaries(&summaries)?;
        entries.truncate(budget);
        Ok(entries)
    }

    /// Walk a paged API. A failed first page fails the source; a later
    /// failure keeps what was already collected.
    async fn fetch_paged(&self, source: &SourceDescriptor, budget: usize) -> Result<Vec<RawItem>> {
        let mut items = Vec::new();
        let mut start = 0;

        while items.len() < budget {
            let remaining = budget - items.len();
            let page_size = self.config.page_size.min(remaining);
            let url = page_url(&source.url, start, page_size)?;

            let entries = match self.fetch_entries(&url).await {
                Ok(entries) => entries,
                Err(e) if start == 0 => return Err(e),
                Err(e) => {
                    warn!(source = %source.name, start, error = %e, "page failed, stopping");
                    break;
                }
            };

            let received = entries.len();
            debug!(source = %source.name, start, received, "page fetched");
            let page = entries.into_iter().take(remaining).collect();
            items.extend(self.extract_items(source, page).await);

            if received < page_size {
                break;
            }
            start += received;
        }

        Ok(items)
    }

    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let xml = self.http.get_text(url).await?;
        parse_feed(&xml)
    }

    /// Extract content for every entry concurrently, preserving entry order.
    async fn extract_items(&self, source: &SourceDescriptor, entries: Vec<FeedEntry>) -> Vec<RawItem> {
        let semaphore = Arc::new(Semaphore::new(self.config.extract_concurrency));

        let pending: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let url = entry.link.as_deref().and_then(canonical_url);
                let target = url.clone();
                let extractor = self.extractor.clone();
                let semaphore = semaphore.clone();
                let handle = tokio::spawn(async move {
                    let Some(target) = target else {
                        return String::new();
                    };
                    let _permit = semaphore.acquire_owned().await.ok();
                    extractor.extract(&target).await
                });
                (entry, url, handle)
            })
            .collect();

        let mut items = Vec::with_capacity(pending.len());
        for (entry, url, handle) in pending {
            let content = match handle.await {
                Ok(content) => content,
                Err(e) => {
                    warn!(url = ?url, error = %e, "extraction task panicked");
                    String::new()
                }
            };
            items.push(RawItem {
                title: entry.title,
                summary: entry.summary,
                published: entry.published,
                url,
                source: source.name.clone(),
                category: source.category,
                organization: source.organization.clone(),
                content,
            });
        }
        items
    }
}

/// `base` with `start` and `max_results` set, replacing any existing values.
fn page_url(base: &str, start: usize, max_results: usize) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| NewsRagError::validation(format!("invalid source URL {base}: {e}")))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "start" && k != "max_results")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("start", &start.to_string())
        .append_pair("max_results", &max_results.to_string());

    Ok(url.into())
}
