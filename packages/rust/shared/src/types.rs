//! Core domain types for newsrag.

use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder used when a record carries no source name.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Placeholder used when a record carries no title.
pub const UNTITLED: &str = "Untitled";

// ---------------------------------------------------------------------------
// SourceDescriptor
// ---------------------------------------------------------------------------

/// Editorial category of a feed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Blog,
    Newsletter,
    News,
    Research,
}

impl SourceCategory {
    /// Lowercase label used in document metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blog => "blog",
            Self::Newsletter => "newsletter",
            Self::News => "news",
            Self::Research => "research",
        }
    }
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a source's endpoint is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A single RSS/Atom document.
    #[default]
    Feed,
    /// An Atom search API paged with `start` / `max_results` query parameters.
    PagedApi,
    /// An NCBI E-utilities `esearch` endpoint; matching ids are resolved
    /// through the sibling `esummary` endpoint (both JSON).
    EntrezApi,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::PagedApi => "paged",
            Self::EntrezApi => "entrez",
        }
    }
}

/// A feed source in the registry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Display name, also used as the `source` metadata of fetched items.
    pub name: String,
    /// Feed or API endpoint.
    pub url: String,
    /// Editorial category.
    pub category: SourceCategory,
    /// Owning organization.
    pub organization: String,
    /// Endpoint protocol.
    #[serde(default)]
    pub kind: SourceKind,
}

// ---------------------------------------------------------------------------
// RawItem
// ---------------------------------------------------------------------------

/// One feed entry, as produced by the fetch orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    pub summary: String,
    /// Publish timestamp exactly as the feed wrote it (may be malformed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Canonical URL; `None` when the entry had no usable link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub source: String,
    pub category: SourceCategory,
    pub organization: String,
    /// Extracted full text, length-capped. Empty if extraction failed.
    #[serde(default)]
    pub content: String,
}

// ---------------------------------------------------------------------------
// Document / Chunk
// ---------------------------------------------------------------------------

/// Metadata carried by a document and copied unchanged onto its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub source: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Name of the parent record, for documents split out of a structured record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl DocMetadata {
    /// Build metadata with placeholder defaults for a blank source or title.
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        let source = non_blank(source.into()).unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
        let title = non_blank(title.into()).unwrap_or_else(|| UNTITLED.to_string());
        Self {
            source,
            title,
            url: None,
            published_date: None,
            company: None,
            doc_type: None,
            parent: None,
            category: None,
        }
    }

    /// Set the URL, dropping blank values.
    pub fn with_url(mut self, url: Option<impl Into<String>>) -> Self {
        self.url = url.and_then(|u| non_blank(u.into()));
        self
    }

    /// Set the publish date, dropping blank values.
    pub fn with_published(mut self, published: Option<impl Into<String>>) -> Self {
        self.published_date = published.and_then(|p| non_blank(p.into()));
        self
    }
}

/// A normalized text document ready for chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: DocMetadata,
}

/// A bounded, overlapping slice of a document: the unit stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: DocMetadata,
    /// Position of this chunk within its parent document.
    pub ordinal: usize,
}

/// A chunk paired with its similarity score from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub chunk: Chunk,
    pub score: f32,
}

// ---------------------------------------------------------------------------
// ContextBundle
// ---------------------------------------------------------------------------

/// Outcome of a context assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "message")]
pub enum BundleStatus {
    /// Context was assembled (possibly with zero chunks).
    Ready,
    /// The vector index was missing or uninitialized.
    IndexUnavailable,
    /// Retrieval failed; the message is embedded in the prompt.
    Failed(String),
}

/// Final selected chunks plus the citation-annotated prompt text.
#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub query: String,
    pub chunks: Vec<Chunk>,
    pub prompt: String,
    pub status: BundleStatus,
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Canonicalize a URL for deduplication (strip fragment and trailing slash).
///
/// Returns `None` for blank input. Unparseable input is kept verbatim
/// (trimmed) so two identical malformed links still deduplicate.
pub fn canonical_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let Ok(mut url) = Url::parse(raw) else {
        return Some(raw.to_string());
    };
    url.set_fragment(None);

    let mut s = url.to_string();
    // Keep the root slash (`https://host/`), drop it on deeper paths.
    if s.ends_with('/') && url.path() != "/" {
        s.pop();
    }
    Some(s)
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_placeholders() {
        let meta = DocMetadata::new("  ", "");
        assert_eq!(meta.source, UNKNOWN_SOURCE);
        assert_eq!(meta.title, UNTITLED);

        let meta = DocMetadata::new("OpenAI Blog", " GPT news ")
            .with_url(Some(""))
            .with_published(Some("2025-01-01"));
        assert_eq!(meta.title, "GPT news");
        assert!(meta.url.is_none());
        assert_eq!(meta.published_date.as_deref(), Some("2025-01-01"));
    }

    #[test]
    fn metadata_type_field_serializes_as_type() {
        let mut meta = DocMetadata::new("arXiv AI", "Paper");
        meta.doc_type = Some("research".into());
        let json = serde_json::to_string(&meta).expect("serialize");
        assert!(json.contains(r#""type":"research""#));
        assert!(!json.contains("parent"));
    }

    #[test]
    fn canonical_url_normalizes() {
        assert_eq!(
            canonical_url("https://openai.com/blog/post/#intro").as_deref(),
            Some("https://openai.com/blog/post")
        );
        assert_eq!(
            canonical_url("https://OpenAI.com/").as_deref(),
            Some("https://openai.com/")
        );
        assert_eq!(canonical_url("   "), None);
        assert_eq!(canonical_url("not a url").as_deref(), Some("not a url"));
    }

    #[test]
    fn source_descriptor_defaults_to_feed() {
        let json = r#"{"name":"X","url":"https://x.dev/rss","category":"news","organization":"X"}"#;
        let desc: SourceDescriptor = serde_json::from_str(json).expect("deserialize");
        assert_eq!(desc.kind, SourceKind::Feed);
        assert_eq!(desc.category.as_str(), "news");
    }
}
