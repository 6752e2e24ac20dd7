//! Heuristic fallback extraction.
//!
//! Re-fetches the raw HTML, takes readable text from the first matching
//! content container (article-like, then main-like, then body-like), scrapes
//! title/author/date/summary from page metadata, and composes a block with
//! a metadata header followed by the truncated body:
//!
//! ```text
//! Title: ...
//! Author: ...
//! Published: ...
//! URL: ...
//! Summary: ...
//!
//! <body text>
//! ```
//!
//! Social-card metadata (`og:*`, `twitter:*`) is preferred over generic tags.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use newsrag_shared::types::UNTITLED;

use super::{ExtractStrategy, collapse_whitespace};
use crate::http::HttpClient;
use crate::truncate_chars;

/// Content containers by priority group.
const CONTAINER_GROUPS: &[&[&str]] = &[
    &["article", r#"[role="article"]"#, ".article", ".post"],
    &["main", r#"[role="main"]"#, "#content", ".content"],
    &["body"],
];

const TITLE_SOURCES: &[&str] = &[
    r#"meta[property="og:title"]"#,
    r#"meta[name="twitter:title"]"#,
    "title",
    "h1",
];

const AUTHOR_SOURCES: &[&str] = &[
    r#"meta[property="article:author"]"#,
    r#"meta[name="twitter:creator"]"#,
    r#"meta[name="author"]"#,
    r#"[rel="author"]"#,
    r#"[itemprop="author"]"#,
];

const DATE_SOURCES: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[property="og:published_time"]"#,
    r#"meta[itemprop="datePublished"]"#,
    r#"meta[name="pubdate"]"#,
    r#"meta[name="date"]"#,
    "time[datetime]",
];

const SUMMARY_SOURCES: &[&str] = &[
    r#"meta[property="og:description"]"#,
    r#"meta[name="twitter:description"]"#,
    r#"meta[name="description"]"#,
];

/// Tags dropped before converting a container to text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "form", "iframe", "noscript", "svg",
];

static RE_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("valid regex"));

/// Metadata and body scraped from a raw page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ScrapedPage {
    pub title: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub summary: Option<String>,
    pub body: String,
}

/// Readability-style fallback over raw HTML.
pub struct HeuristicExtractor {
    http: HttpClient,
    max_chars: usize,
}

impl HeuristicExtractor {
    pub fn new(http: HttpClient, max_chars: usize) -> Self {
        Self { http, max_chars }
    }
}

#[async_trait]
impl ExtractStrategy for HeuristicExtractor {
    async fn try_extract(&self, url: &str) -> Option<String> {
        let html = match self.http.get_text(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "heuristic download failed");
                return None;
            }
        };

        let page = scrape_page(&html);
        let block = compose_block(url, &page, self.max_chars);
        if block.is_none() {
            debug!(%url, "no readable content found");
        }
        block
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Scrape metadata and container text from raw HTML.
pub(crate) fn scrape_page(html: &str) -> ScrapedPage {
    let doc = Html::parse_document(html);
    ScrapedPage {
        title: first_value(&doc, TITLE_SOURCES),
        author: first_value(&doc, AUTHOR_SOURCES),
        published: first_value(&doc, DATE_SOURCES),
        summary: first_value(&doc, SUMMARY_SOURCES),
        body: container_text(&doc),
    }
}

/// Header plus body, capped at `max_chars` in total. `None` when the page
/// has neither body text nor a summary.
pub(crate) fn compose_block(url: &str, page: &ScrapedPage, max_chars: usize) -> Option<String> {
    if page.body.is_empty() && page.summary.is_none() {
        return None;
    }

    let mut header = vec![format!(
        "Title: {}",
        page.title.as_deref().unwrap_or(UNTITLED)
    )];
    if let Some(author) = &page.author {
        header.push(format!("Author: {author}"));
    }
    if let Some(published) = &page.published {
        header.push(format!("Published: {published}"));
    }
    header.push(format!("URL: {url}"));
    if let Some(summary) = &page.summary {
        header.push(format!("Summary: {summary}"));
    }
    let header = header.join("\n");

    if page.body.is_empty() {
        return Some(header);
    }

    let budget = max_chars.saturating_sub(header.chars().count() + 2);
    Some(format!("{header}\n\n{}", truncate_chars(&page.body, budget)))
}

/// First non-empty value among `selectors`: `content`, then `datetime`, then element text.
fn first_value(doc: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(sel) = Selector::parse(raw) else {
            continue;
        };
        for el in doc.select(&sel) {
            let value = el
                .value()
                .attr("content")
                .or_else(|| el.value().attr("datetime"))
                .map(str::to_string)
                .unwrap_or_else(|| el.text().collect());
            let value = collapse_whitespace(&value);
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Readable text of the highest-priority container that has any.
fn container_text(doc: &Html) -> String {
    for group in CONTAINER_GROUPS {
        for raw in *group {
            let Ok(sel) = Selector::parse(raw) else {
                continue;
            };
            if let Some(el) = doc.select(&sel).next() {
                let text = readable_text(&el.html());
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

/// HTML fragment to plain-ish text via Markdown conversion, chrome removed.
fn readable_text(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let text = match converter.convert(html) {
        Ok(md) => md,
        Err(e) => {
            debug!(error = %e, "markdown conversion failed, using raw text");
            let fragment = Html::parse_fragment(html);
            collapse_whitespace(&fragment.root_element().text().collect::<String>())
        }
    };

    RE_BLANK_LINES.replace_all(text.trim(), "\n\n").into_owned()
}
