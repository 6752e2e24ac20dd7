//! Normalization of heterogeneous records into [`Document`]s.
//!
//! Feed items, static company profiles (with nested resources), and
//! previously cached page text all become plain-text documents with a
//! [`DocMetadata`] map. [`dedup_documents`] then removes repeated URLs
//! across the whole corpus.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use newsrag_shared::{DocMetadata, Document, NewsRagError, RawItem, Result, canonical_url};
use newsrag_storage::FileCache;

/// `source` metadata of documents built from static company records.
pub const COMPANY_SOURCE: &str = "ai_companies";

/// `source` metadata of documents loaded back from the content cache.
pub const CACHE_SOURCE: &str = "cache";

/// Resources per company that become their own documents.
pub const MAX_RESOURCES_PER_RECORD: usize = 200;

// ---------------------------------------------------------------------------
// Static records
// ---------------------------------------------------------------------------

/// A titled link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRef {
    pub title: String,
    pub url: String,
}

/// A news/research/blog resource attached to a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRecord {
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
}

/// Static profile of an AI company or agent.
///
/// Scalar fields accept strings or numbers in the source JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyRecord {
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub founded: String,
    pub founders: Vec<String>,
    pub headquarters: String,
    pub ceo: String,
    #[serde(deserialize_with = "lenient_string")]
    pub valuation: String,
    #[serde(deserialize_with = "lenient_string")]
    pub funding: String,
    pub twitter: String,
    pub website: String,
    #[serde(deserialize_with = "lenient_string")]
    pub active_years: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub top_in_year: Vec<String>,
    pub latest_blog: Option<LinkRef>,
    pub products: Vec<String>,
    pub notable_projects: Vec<String>,
    pub resources: Vec<ResourceRecord>,
    /// Overrides [`COMPANY_SOURCE`] when set.
    pub source: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?
        .map(String::from)
        .unwrap_or_default())
}

fn lenient_strings<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<Scalar>>::deserialize(d)?
        .unwrap_or_default()
        .into_iter()
        .map(String::from)
        .collect())
}

/// AI company and agent-framework profiles shipped with the binary.
const BUILTIN_COMPANIES: &str = include_str!("../data/companies.json");

/// Load company records from a JSON array file.
pub fn load_company_records(path: &Path) -> Result<Vec<CompanyRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| NewsRagError::io(path, e))?;
    let records = parse_company_records(&content, &path.display().to_string())?;
    info!(path = %path.display(), count = records.len(), "company records loaded");
    Ok(records)
}

/// The bundled company profiles.
pub fn builtin_company_records() -> Result<Vec<CompanyRecord>> {
    parse_company_records(BUILTIN_COMPANIES, "bundled company records")
}

fn parse_company_records(json: &str, origin: &str) -> Result<Vec<CompanyRecord>> {
    serde_json::from_str(json)
        .map_err(|e| NewsRagError::parse(format!("invalid records in {origin}: {e}")))
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Any input that can be turned into documents.
#[derive(Debug, Clone)]
pub enum Record {
    /// One fetched feed entry.
    FeedItem(RawItem),
    /// A company profile; yields itself plus one document per resource.
    Company(CompanyRecord),
    /// A single resource split out of its parent company.
    Resource {
        resource: ResourceRecord,
        parent: String,
        category: String,
        source: String,
    },
    /// A cached extraction file.
    CachedText { text: String },
}

impl Record {
    /// Normalize into one or more documents. Blank records yield none.
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            Self::FeedItem(item) => vec![feed_item_document(item)],
            Self::Company(record) => company_documents(record),
            Self::Resource {
                resource,
                parent,
                category,
                source,
            } => vec![resource_document(resource, &parent, &category, &source)],
            Self::CachedText { text } => cached_text_document(&text).into_iter().collect(),
        }
    }
}

fn feed_item_document(item: RawItem) -> Document {
    let text = format!(
        "Resource Title: {title}\nSource: {source}\nCompany: {company}\nType: {kind}\n\
         URL: {url}\nPublished: {published}\nSummary: {summary}\n\nFull Content: {content}",
        title = item.title,
        source = item.source,
        company = item.organization,
        kind = item.category,
        url = item.url.as_deref().unwrap_or_default(),
        published = item.published.as_deref().unwrap_or_default(),
        summary = item.summary,
        content = item.content,
    );

    let mut metadata = DocMetadata::new(item.source, item.title)
        .with_url(item.url)
        .with_published(item.published);
    metadata.company = Some(item.organization).filter(|c| !c.is_empty());
    metadata.doc_type = Some(item.category.as_str().to_string());

    Document { text, metadata }
}

fn company_documents(record: CompanyRecord) -> Vec<Document> {
    let source = record
        .source
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| COMPANY_SOURCE.to_string());

    let mut lines = vec![
        format!("Name: {}", record.name),
        format!("Category: {}", record.category),
        format!("Description: {}", record.description),
        format!("Founded: {}", record.founded),
        format!("Founders: {}", record.founders.join(", ")),
        format!("Headquarters: {}", record.headquarters),
        format!("CEO: {}", record.ceo),
        format!("Valuation: {}", record.valuation),
        format!("Funding: {}", record.funding),
        format!("Twitter: {}", record.twitter),
        format!("Website: {}", record.website),
        format!("Active Years: {}", record.active_years),
        format!("Top AI Agent in Years: {}", record.top_in_year.join(", ")),
    ];
    if let Some(blog) = &record.latest_blog {
        lines.push(format!("Latest Blog: {} ({})", blog.title, blog.url));
    }
    if !record.products.is_empty() {
        lines.push(format!("Products: {}", record.products.join(", ")));
    }
    if !record.notable_projects.is_empty() {
        lines.push(format!("Notable Projects: {}", record.notable_projects.join(", ")));
    }

    let resources: Vec<ResourceRecord> = record
        .resources
        .into_iter()
        .take(MAX_RESOURCES_PER_RECORD)
        .collect();
    if !resources.is_empty() {
        lines.push("Resources:".to_string());
        for res in &resources {
            match res.summary.as_deref().filter(|s| !s.is_empty()) {
                Some(summary) => lines.push(format!(
                    "- {} ({})\n  Summary: {summary}",
                    res.title, res.url
                )),
                None => lines.push(format!("- {} ({})", res.title, res.url)),
            }
        }
    }

    let parent = Document {
        text: lines.join("\n"),
        metadata: DocMetadata::new(source.clone(), record.name.clone())
            .with_url(Some(record.website)),
    };

    let mut docs = vec![parent];
    docs.extend(resources.into_iter().flat_map(|resource| {
        Record::Resource {
            resource,
            parent: record.name.clone(),
            category: record.category.clone(),
            source: source.clone(),
        }
        .into_documents()
    }));
    docs
}

fn resource_document(resource: ResourceRecord, parent: &str, category: &str, source: &str) -> Document {
    let mut text = format!(
        "Resource Title: {}\nResource URL: {}\nParent: {parent}\nCategory: {category}",
        resource.title, resource.url
    );
    if let Some(summary) = resource.summary.as_deref().filter(|s| !s.is_empty()) {
        text.push_str(&format!("\nSummary: {summary}"));
    }

    let mut metadata = DocMetadata::new(source, resource.title).with_url(Some(resource.url));
    metadata.parent = Some(parent.to_string()).filter(|p| !p.is_empty());
    metadata.category = Some(category.to_string()).filter(|c| !c.is_empty());

    Document { text, metadata }
}

/// Cached text with optional `Title:` (first line), `URL:` and `Published:` header lines.
fn cached_text_document(raw: &str) -> Option<Document> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let title = text
        .lines()
        .next()
        .and_then(|line| header_value(line, "title"))
        .unwrap_or_default();
    let url = text.lines().find_map(|line| header_value(line, "url"));
    let published = text.lines().find_map(|line| header_value(line, "published"));

    Some(Document {
        text: text.to_string(),
        metadata: DocMetadata::new(CACHE_SOURCE, title)
            .with_url(url)
            .with_published(published),
    })
}

/// Value of a `Name: value` line, matching `name` case-insensitively.
fn header_value(line: &str, name: &str) -> Option<String> {
    let (key, value) = line.split_once(':')?;
    key.trim()
        .eq_ignore_ascii_case(name)
        .then(|| value.trim().to_string())
}

/// Every live cache entry as a document.
pub fn cached_documents(cache: &FileCache) -> Result<Vec<Document>> {
    let docs: Vec<Document> = cache
        .entries()?
        .into_iter()
        .flat_map(|(_, text)| Record::CachedText { text }.into_documents())
        .collect();
    debug!(count = docs.len(), dir = %cache.dir().display(), "cached documents loaded");
    Ok(docs)
}

/// Drop documents whose canonical URL was already seen. URL-less documents are kept.
pub fn dedup_documents(docs: Vec<Document>) -> Vec<Document> {
    let before = docs.len();
    let mut seen = HashSet::new();
    let deduped: Vec<Document> = docs
        .into_iter()
        .filter(|doc| match doc.metadata.url.as_deref().and_then(canonical_url) {
            Some(url) => seen.insert(url),
            None => true,
        })
        .collect();
    debug!(before, after = deduped.len(), "documents deduplicated");
    deduped
}
