//! Document acquisition: feed fetching, content extraction, and caching.
//!
//! This crate provides:
//! - [`HttpClient`]: timeout-bounded GET with a fixed User-Agent
//! - [`feed`]: RSS 2.0 / Atom parsing into [`FeedEntry`] values
//! - [`entrez`]: PubMed search through NCBI E-utilities
//! - [`extract`]: the ordered extractor-strategy chain backed by the content cache
//! - [`engine`]: the concurrent multi-source [`FetchOrchestrator`]

pub mod engine;
pub mod entrez;
pub mod extract;
pub mod feed;
mod http;

pub use engine::{FetchOrchestrator, merge_items, per_source_budget};
pub use extract::{ArticleExtractor, ExtractStrategy, ExtractorChain, HeuristicExtractor};
pub use feed::{FeedEntry, normalize_text, parse_feed};
pub use http::HttpClient;

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
