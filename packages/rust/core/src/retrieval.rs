//! Retrieval and ranking: from a similarity-search pool to a citation-annotated prompt.
//!
//! [`assemble_context`] over-fetches `k * overfetch_factor` candidates from the
//! vector index and hands them to [`rank_candidates`], which:
//!
//! 1. drops candidates dated outside the requested window (unparseable dates are kept);
//!    a window that excludes every candidate yields an empty selection
//! 2. keeps candidates mentioning a domain keyword in their text or title
//! 3. tops up a starved selection with query-term matches, then the most recent
//!    candidates, capped at `k * 4`
//! 4. deduplicates by normalized `(title, source)`
//! 5. round-robins across sources until `k` chunks are picked (or takes the first `k`)
//! 6. re-orders by `2 * keyword_match + normalized_recency`
//!
//! The result is formatted into a prompt that carries the query and the answer
//! rules, including the exact [`NOT_FOUND_MESSAGE`]. Missing indexes and
//! search failures produce placeholder bundles rather than errors.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};

use newsrag_shared::{
    BundleStatus, Chunk, ContextBundle, RetrievalCandidate, RetrievalConfig, parse_timestamp,
    timestamp_or_epoch,
};
use newsrag_storage::VectorIndex;

/// Reply the generation step must give when the context lacks the answer.
pub const NOT_FOUND_MESSAGE: &str = "Sorry, the answer to your question could not be found in \
the provided research context. Try re-indexing your sources or broadening your query.";

/// Upper bound on the filtered pool, as a multiple of `k`.
const POOL_CAP_FACTOR: usize = 4;

/// Weight of a query keyword hit in the boost score.
const KEYWORD_BOOST: f64 = 2.0;

/// Timestamp mapped to recency 1.0 (2100-01-01T00:00:00Z).
const RECENCY_HORIZON_SECS: f64 = 4_102_444_800.0;

/// Query terms shorter than this never count as keyword hits.
const MIN_BOOST_TERM_CHARS: usize = 3;

const MISSING: &str = "N/A";

// ---------------------------------------------------------------------------
// ContextRequest
// ---------------------------------------------------------------------------

/// Parameters of a single context assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRequest {
    pub query: String,
    /// Chunk budget of the bundle (at least 1).
    pub k: usize,
    pub diversify_sources: bool,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl ContextRequest {
    /// Request with `k` and diversification taken from `config`, no date window.
    pub fn new(query: impl Into<String>, config: &RetrievalConfig) -> Self {
        Self {
            query: query.into(),
            k: config.k.max(1),
            diversify_sources: config.diversify_sources,
            date_from: None,
            date_to: None,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_diversify(mut self, diversify: bool) -> Self {
        self.diversify_sources = diversify;
        self
    }

    /// Restrict to `[from, to]`; either bound may be open.
    pub fn with_window(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    fn in_window(&self, chunk: &Chunk) -> bool {
        let Some(date) = chunk.metadata.published_date.as_deref().and_then(parse_timestamp) else {
            return true;
        };
        self.date_from.is_none_or(|from| date >= from) && self.date_to.is_none_or(|to| date <= to)
    }

    fn has_window(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Assemble a context bundle for `request`.
///
/// `None` or an empty index yields [`BundleStatus::IndexUnavailable`]; a
/// failed search yields [`BundleStatus::Failed`]. Neither is an error.
#[instrument(skip_all, fields(query = %request.query, k = request.k))]
pub fn assemble_context(
    index: Option<&dyn VectorIndex>,
    request: &ContextRequest,
    config: &RetrievalConfig,
) -> ContextBundle {
    let Some(index) = index.filter(|index| !index.is_empty()) else {
        error!("vector index not available");
        return ContextBundle {
            query: request.query.clone(),
            chunks: Vec::new(),
            prompt: format!(
                "User Query: {}\n\nRelevant Context:\nError: Vector index not available.",
                request.query
            ),
            status: BundleStatus::IndexUnavailable,
        };
    };

    let fetch_k = request.k * config.overfetch_factor.max(1);
    let pool = match index.similarity_search(&request.query, fetch_k) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "retrieval failed");
            let message = e.to_string();
            return ContextBundle {
                query: request.query.clone(),
                chunks: Vec::new(),
                prompt: format!(
                    "User Query: {}\n\nRelevant Context:\nError during retrieval: {message}",
                    request.query
                ),
                status: BundleStatus::Failed(message),
            };
        }
    };
    debug!(candidates = pool.len(), fetch_k, "similarity search complete");

    let chunks = rank_candidates(pool, request, &config.domain_keywords);
    info!(selected = chunks.len(), "context assembled");

    ContextBundle {
        query: request.query.clone(),
        prompt: format_prompt(&request.query, &chunks),
        chunks,
        status: BundleStatus::Ready,
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Filter, top up, deduplicate, diversify, and re-rank a similarity-ordered pool.
///
/// Returns at most `request.k` chunks. Deterministic for a given input.
pub fn rank_candidates(
    pool: Vec<RetrievalCandidate>,
    request: &ContextRequest,
    domain_keywords: &[String],
) -> Vec<Chunk> {
    let k = request.k.max(1);
    let mut pool: Vec<Chunk> = pool.into_iter().map(|c| c.chunk).collect();

    if request.has_window() {
        let before = pool.len();
        pool.retain(|chunk| request.in_window(chunk));
        debug!(before, after = pool.len(), "date window applied");
        if pool.is_empty() {
            return Vec::new();
        }
    }

    let mut selected: Vec<usize> = (0..pool.len())
        .filter(|&i| mentions_any(&pool[i], domain_keywords))
        .collect();
    debug!(topical = selected.len(), pool = pool.len(), "topical filter applied");

    if selected.len() < k {
        let fallback = starvation_fallback(&pool, &request.query, k);
        debug!(
            topical = selected.len(),
            fallback = fallback.len(),
            "too few topical candidates, using fallback"
        );
        for i in fallback {
            if !selected.contains(&i) {
                selected.push(i);
            }
        }
    }
    // Non-empty for any non-empty pool: the fallback always yields min(k, pool) indices.
    selected.truncate(k * POOL_CAP_FACTOR);

    let deduped = dedup_by_title_source(selected.into_iter().map(|i| &pool[i]));

    let chosen: Vec<&Chunk> = if request.diversify_sources {
        round_robin_by_source(deduped, k)
    } else {
        deduped.into_iter().take(k).collect()
    };

    let terms = boost_terms(&request.query);
    let mut scored: Vec<(f64, &Chunk)> = chosen
        .into_iter()
        .map(|chunk| (boost_score(chunk, &terms), chunk))
        .collect();
    // Stable: equal scores keep their diversified order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored.into_iter().map(|(_, chunk)| chunk.clone()).collect()
}

/// Lowercased text and title of a chunk.
fn haystack(chunk: &Chunk) -> (String, String) {
    (chunk.text.to_lowercase(), chunk.metadata.title.to_lowercase())
}

fn mentions_any(chunk: &Chunk, keywords: &[String]) -> bool {
    let (text, title) = haystack(chunk);
    keywords
        .iter()
        .any(|kw| text.contains(kw.as_str()) || title.contains(kw.as_str()))
}

/// Indices of up to `k` candidates: best query-term overlap first, then the
/// most recent by publish date to fill any remainder.
fn starvation_fallback(pool: &[Chunk], query: &str, k: usize) -> Vec<usize> {
    let terms: Vec<String> = unique_terms(query);

    let mut by_overlap: Vec<(usize, usize)> = pool
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let (text, title) = haystack(chunk);
            let hits = terms
                .iter()
                .filter(|t| text.contains(t.as_str()) || title.contains(t.as_str()))
                .count();
            (i, hits)
        })
        .filter(|&(_, hits)| hits > 0)
        .collect();
    by_overlap.sort_by(|a, b| b.1.cmp(&a.1));

    let mut picked: Vec<usize> = by_overlap.into_iter().take(k).map(|(i, _)| i).collect();
    if picked.len() < k {
        let mut by_recency: Vec<usize> = (0..pool.len()).collect();
        by_recency.sort_by_key(|&i| std::cmp::Reverse(published_at(&pool[i])));
        for i in by_recency {
            if picked.len() >= k {
                break;
            }
            if !picked.contains(&i) {
                picked.push(i);
            }
        }
    }
    picked
}

fn unique_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| seen.insert(t.to_string()))
        .map(String::from)
        .collect()
}

fn published_at(chunk: &Chunk) -> DateTime<Utc> {
    timestamp_or_epoch(chunk.metadata.published_date.as_deref())
}

/// First occurrence of each normalized `(title, source)` pair.
fn dedup_by_title_source<'a>(chunks: impl Iterator<Item = &'a Chunk>) -> Vec<&'a Chunk> {
    let mut seen = HashSet::new();
    chunks
        .filter(|chunk| {
            seen.insert((
                chunk.metadata.title.trim().to_lowercase(),
                chunk.metadata.source.trim().to_lowercase(),
            ))
        })
        .collect()
}

/// Take one chunk per source in turn, sources in order of first appearance.
fn round_robin_by_source(chunks: Vec<&Chunk>, k: usize) -> Vec<&Chunk> {
    let mut groups: Vec<(&str, VecDeque<&Chunk>)> = Vec::new();
    for chunk in chunks {
        let source = chunk.metadata.source.as_str();
        match groups.iter_mut().find(|(name, _)| *name == source) {
            Some((_, group)) => group.push_back(chunk),
            None => groups.push((source, VecDeque::from([chunk]))),
        }
    }

    let mut picked = Vec::with_capacity(k);
    while picked.len() < k && groups.iter().any(|(_, g)| !g.is_empty()) {
        for (_, group) in groups.iter_mut() {
            if picked.len() >= k {
                break;
            }
            if let Some(chunk) = group.pop_front() {
                picked.push(chunk);
            }
        }
    }
    picked
}

fn boost_terms(query: &str) -> Vec<String> {
    unique_terms(query)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_BOOST_TERM_CHARS)
        .collect()
}

/// `2 * keyword_match + normalized_recency`, with keyword_match in {0, 1}
/// and recency in [0, 1].
fn boost_score(chunk: &Chunk, terms: &[String]) -> f64 {
    let (text, title) = haystack(chunk);
    let keyword_match = terms
        .iter()
        .any(|t| text.contains(t.as_str()) || title.contains(t.as_str()));
    let recency = (published_at(chunk).timestamp() as f64 / RECENCY_HORIZON_SECS).clamp(0.0, 1.0);
    KEYWORD_BOOST * f64::from(u8::from(keyword_match)) + recency
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// One labeled block per chunk inside the answer-instruction template.
pub fn format_prompt(query: &str, chunks: &[Chunk]) -> String {
    let context = if chunks.is_empty() {
        "(no matching documents)".to_string()
    } else {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let meta = &chunk.metadata;
                format!(
                    "--- Document {n} ---\nTitle: {title}\nSource: {source}\nPublished: {published}\n\
                     URL: {url}\nContent: {content}",
                    n = i + 1,
                    title = meta.title,
                    source = meta.source,
                    published = meta.published_date.as_deref().unwrap_or(MISSING),
                    url = meta.url.as_deref().unwrap_or(MISSING),
                    content = chunk.text,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "Research Context:\n{context}\n\n\
         User Question: {query}\n\n\
         Instructions:\n\
         - Provide a detailed, comprehensive answer using only the research context above.\n\
         - Cite the source title and URL for every fact or claim.\n\
         - If the answer is not found in the context, reply exactly: {NOT_FOUND_MESSAGE}\n\
         - Do not use prior knowledge or make up facts.\n\n\
         Answer:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsrag_shared::{DocMetadata, NewsRagError, Result};
    use std::path::Path;

    fn chunk(source: &str, title: &str, text: &str, published: Option<&str>) -> RetrievalCandidate {
        RetrievalCandidate {
            chunk: Chunk {
                text: text.into(),
                metadata: DocMetadata::new(source, title)
                    .with_url(Some(format!(
                        "https://{}.dev/{}",
                        source.to_lowercase().replace(' ', "-"),
                        title.replace(' ', "-")
                    )))
                    .with_published(published),
                ordinal: 0,
            },
            score: 0.5,
        }
    }

    fn request(query: &str, k: usize) -> ContextRequest {
        ContextRequest::new(query, &RetrievalConfig::default()).with_k(k)
    }

    fn keywords() -> Vec<String> {
        RetrievalConfig::default().domain_keywords
    }

    fn sources(chunks: &[Chunk]) -> HashSet<String> {
        chunks.iter().map(|c| c.metadata.source.clone()).collect()
    }

    /// Index stub returning a fixed pool in order.
    struct FixedIndex {
        pool: Vec<RetrievalCandidate>,
        fail: bool,
    }

    impl VectorIndex for FixedIndex {
        fn add_chunks(&mut self, _chunks: Vec<Chunk>) -> Result<()> {
            Ok(())
        }

        fn similarity_search(&self, _query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
            if self.fail {
                return Err(NewsRagError::Storage("corrupt index".into()));
            }
            Ok(self.pool.iter().take(k).cloned().collect())
        }

        fn save_to_path(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }

        fn len(&self) -> usize {
            self.pool.len().max(1)
        }
    }

    #[test]
    fn round_robin_includes_minority_source() {
        let mut pool: Vec<_> = (0..5)
            .map(|i| chunk("A", &format!("a{i}"), "AI agents news", Some("2025-01-01")))
            .collect();
        pool.push(chunk("B", "b0", "AI agents news", Some("2025-01-01")));

        let picked = rank_candidates(pool, &request("agents", 3), &keywords());
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().any(|c| c.metadata.source == "B"));
    }

    #[test]
    fn diversified_bundle_has_exactly_k_from_many_sources() {
        let pool: Vec<_> = (0..12)
            .map(|i| {
                let source = ["A", "B", "C"][i % 3];
                chunk(source, &format!("t{i}"), "machine learning update", None)
            })
            .collect();
        let picked = rank_candidates(pool, &request("update", 6), &keywords());
        assert_eq!(picked.len(), 6);
        assert!(sources(&picked).len() > 1);
    }

    #[test]
    fn without_diversification_similarity_order_is_kept_before_boost() {
        let pool: Vec<_> = (0..5)
            .map(|i| chunk("A", &format!("a{i}"), "llm release", None))
            .chain(std::iter::once(chunk("B", "b0", "llm release", None)))
            .collect();
        let req = request("release", 3).with_diversify(false);
        let picked = rank_candidates(pool, &req, &keywords());
        assert_eq!(sources(&picked), HashSet::from(["A".to_string()]));
    }

    #[test]
    fn dedup_keeps_first_title_source_pair() {
        let pool = vec![
            chunk("OpenAI Blog", "GPT Update", "first ai text", None),
            chunk(" openai blog ", "gpt update ", "second ai text", None),
            chunk("OpenAI Blog", "Other", "third ai text", None),
        ];
        let picked = rank_candidates(pool, &request("gpt", 6), &keywords());
        let texts: Vec<_> = picked.iter().map(|c| c.text.as_str()).collect();
        assert!(texts.contains(&"first ai text"));
        assert!(!texts.contains(&"second ai text"));
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn date_window_excludes_outside_and_keeps_unparseable() {
        let pool = vec![
            chunk("A", "old", "ai old", Some("2020-01-01")),
            chunk("A", "inside", "ai inside", Some("2025-02-15T08:00:00Z")),
            chunk("B", "undated", "ai undated", Some("sometime last week")),
            chunk("B", "late", "ai late", Some("Fri, 01 Aug 2025 10:00:00 GMT")),
        ];
        let from = parse_timestamp("2025-01-01");
        let to = parse_timestamp("2025-06-30");
        let req = request("ai", 6).with_window(from, to);

        let titles: HashSet<String> = rank_candidates(pool, &req, &keywords())
            .into_iter()
            .map(|c| c.metadata.title)
            .collect();
        assert_eq!(
            titles,
            HashSet::from(["inside".to_string(), "undated".to_string()])
        );
    }

    #[test]
    fn window_excluding_every_candidate_yields_empty_bundle() {
        let pool: Vec<_> = (0..4)
            .map(|i| chunk("A", &format!("old{i}"), "ai agents", Some("2020-01-01")))
            .collect();
        let window = request("agents", 3)
            .with_window(parse_timestamp("2025-01-01"), parse_timestamp("2025-12-31"));
        assert!(rank_candidates(pool.clone(), &window, &keywords()).is_empty());

        let config = RetrievalConfig::default();
        let index = FixedIndex { pool, fail: false };
        let bundle = assemble_context(Some(&index), &window, &config);
        assert_eq!(bundle.status, BundleStatus::Ready);
        assert!(bundle.chunks.is_empty());
        assert!(bundle.prompt.contains("(no matching documents)"));
        assert!(bundle.prompt.contains(NOT_FOUND_MESSAGE));
    }

    #[test]
    fn no_topical_survivors_still_fills_k_from_pool() {
        let pool = vec![
            chunk("A", "cooking", "pasta recipes", Some("2025-05-01")),
            chunk("B", "garden", "tomato care", Some("2025-04-01")),
        ];
        let picked = rank_candidates(pool, &request("unrelated words", 2), &keywords());
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn starvation_falls_back_to_query_terms_then_recency() {
        let topic = vec!["quantum".to_string()];
        let pool = vec![
            chunk("A", "cooking", "pasta recipes", Some("2025-05-01")),
            chunk("B", "weather", "storm forecast for tuesday", Some("2024-01-01")),
            chunk("C", "quantum", "quantum computing", Some("2023-01-01")),
            chunk("D", "travel", "cheap flights", Some("2025-06-01")),
        ];
        let req = request("storm forecast", 3).with_diversify(false);
        let picked = rank_candidates(pool, &req, &topic);

        let titles: Vec<_> = picked.iter().map(|c| c.metadata.title.as_str()).collect();
        assert_eq!(picked.len(), 3);
        // Query-term match ranks first on the keyword boost.
        assert_eq!(titles[0], "weather");
        assert!(titles.contains(&"quantum"));
        // Remaining slot filled by the most recent candidate.
        assert!(titles.contains(&"travel"));
        assert!(!titles.contains(&"cooking"));
    }

    #[test]
    fn bundle_never_exceeds_k() {
        let pool: Vec<_> = (0..40)
            .map(|i| chunk(&format!("S{}", i % 7), &format!("t{i}"), "ai agents", None))
            .collect();
        for k in [1, 2, 5, 6] {
            assert!(rank_candidates(pool.clone(), &request("agents", k), &keywords()).len() <= k);
        }
    }

    #[test]
    fn boost_puts_keyword_matches_before_recency() {
        let pool = vec![
            chunk("A", "new", "ai news", Some("2025-09-01")),
            chunk("B", "old match", "ai robotics", Some("2019-01-01")),
            chunk("C", "newest", "ai news", Some("2025-10-01")),
        ];
        let picked = rank_candidates(pool, &request("robotics", 3), &keywords());
        let titles: Vec<_> = picked.iter().map(|c| c.metadata.title.as_str()).collect();
        assert_eq!(titles, vec!["old match", "newest", "new"]);
    }

    #[test]
    fn unavailable_index_yields_placeholder() {
        let config = RetrievalConfig::default();
        let bundle = assemble_context(None, &ContextRequest::new("what is new?", &config), &config);
        assert_eq!(bundle.status, BundleStatus::IndexUnavailable);
        assert!(bundle.chunks.is_empty());
        assert!(bundle.prompt.contains("User Query: what is new?"));
        assert!(bundle.prompt.contains("not available"));
    }

    #[test]
    fn search_failure_yields_diagnostic_bundle() {
        let config = RetrievalConfig::default();
        let index = FixedIndex {
            pool: Vec::new(),
            fail: true,
        };
        let request = ContextRequest::new("q", &config);
        let bundle = assemble_context(Some(&index), &request, &config);
        assert!(
            matches!(bundle.status, BundleStatus::Failed(ref m) if m.contains("corrupt index"))
        );
        assert!(bundle.prompt.contains("Error during retrieval"));
    }

    #[test]
    fn prompt_carries_blocks_query_and_rules() {
        let config = RetrievalConfig::default();
        let index = FixedIndex {
            pool: vec![
                chunk("OpenAI Blog", "Agents SDK", "New agent tooling", Some("2025-03-11")),
                chunk("Hugging Face", "Open models", "Open llm weights", None),
            ],
            fail: false,
        };
        let request = ContextRequest::new("agent tooling", &config);
        let bundle = assemble_context(Some(&index), &request, &config);

        assert_eq!(bundle.status, BundleStatus::Ready);
        assert_eq!(bundle.chunks.len(), 2);
        assert!(
            bundle
                .prompt
                .starts_with("Research Context:\n--- Document 1 ---\nTitle: Agents SDK\n")
        );
        assert!(bundle.prompt.contains("--- Document 2 ---"));
        assert!(bundle.prompt.contains("Published: N/A"));
        assert!(bundle.prompt.contains("URL: https://openai-blog.dev/Agents-SDK"));
        assert!(bundle.prompt.contains("User Question: agent tooling"));
        assert!(bundle.prompt.contains(NOT_FOUND_MESSAGE));
    }

    #[test]
    fn empty_selection_still_instructs_not_found() {
        let prompt = format_prompt("anything", &[]);
        assert!(prompt.contains("(no matching documents)"));
        assert!(prompt.contains(NOT_FOUND_MESSAGE));
    }

    #[test]
    fn assembly_is_idempotent() {
        let config = RetrievalConfig::default();
        let index = FixedIndex {
            pool: (0..30)
                .map(|i| {
                    chunk(
                        &format!("S{}", i % 4),
                        &format!("t{i}"),
                        if i % 2 == 0 { "ai agents" } else { "weather" },
                        Some(format!("2025-0{}-01", 1 + i % 9).as_str()),
                    )
                })
                .collect(),
            fail: false,
        };
        let req = ContextRequest::new("agents", &config);
        let a = assemble_context(Some(&index), &req, &config);
        let b = assemble_context(Some(&index), &req, &config);
        assert_eq!(a.chunks, b.chunks);
        assert_eq!(a.prompt, b.prompt);
    }
}
