//! RSS 2.0 and Atom feed parsing.
//!
//! Both formats are read with `quick-xml`'s serde support into private wire
//! structs and flattened into [`FeedEntry`]. The root element decides the
//! format; anything else is a parse error for that source only.

use std::sync::LazyLock;

use quick_xml::events::Event;
use regex::Regex;
use serde::Deserialize;

use newsrag_shared::{NewsRagError, Result};

/// One entry from a feed, before content extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    /// Entry link as written in the feed (not yet canonicalized).
    pub link: Option<String>,
    /// Plain-text summary (HTML stripped, entities decoded).
    pub summary: String,
    /// Raw publish timestamp.
    pub published: Option<String>,
}

// ---------------------------------------------------------------------------
// RSS 2.0
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    id: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// `rel="alternate"` (or rel-less) link first, then any link, then the id.
    fn best_link(&self) -> Option<String> {
        let alternate = self
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
            .and_then(|l| l.href.clone());
        alternate
            .or_else(|| self.links.iter().find_map(|l| l.href.clone()))
            .or_else(|| self.id.clone().filter(|id| id.starts_with("http")))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an RSS 2.0 or Atom document.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let xml = scrub_html_entities_for_xml(xml);

    match root_element(&xml)?.as_str() {
        "rss" => {
            let rss: Rss = quick_xml::de::from_str(&xml)
                .map_err(|e| NewsRagError::parse(format!("invalid RSS: {e}")))?;
            Ok(rss.channel.items.into_iter().map(FeedEntry::from).collect())
        }
        "feed" => {
            let feed: AtomFeed = quick_xml::de::from_str(&xml)
                .map_err(|e| NewsRagError::parse(format!("invalid Atom: {e}")))?;
            Ok(feed.entries.into_iter().map(FeedEntry::from).collect())
        }
        other => Err(NewsRagError::parse(format!(
            "unsupported feed root element <{other}>"
        ))),
    }
}

impl From<RssItem> for FeedEntry {
    fn from(item: RssItem) -> Self {
        let link = item
            .link
            .filter(|l| !l.trim().is_empty())
            .or_else(|| item.guid.filter(|g| g.starts_with("http")));
        Self {
            title: normalize_text(item.title.as_deref().unwrap_or_default()),
            link: link.map(|l| l.trim().to_string()),
            summary: normalize_text(item.description.as_deref().unwrap_or_default()),
            published: item.pub_date.map(|d| d.trim().to_string()),
        }
    }
}

impl From<AtomEntry> for FeedEntry {
    fn from(entry: AtomEntry) -> Self {
        let link = entry.best_link().map(|l| l.trim().to_string());
        let summary = entry
            .summary
            .as_deref()
            .or(entry.content.as_deref())
            .unwrap_or_default();
        Self {
            title: normalize_text(entry.title.as_deref().unwrap_or_default()),
            link,
            summary: normalize_text(summary),
            published: entry
                .published
                .or(entry.updated)
                .map(|d| d.trim().to_string()),
        }
    }
}

/// Local name of the document's root element.
fn root_element(xml: &str) -> Result<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err(NewsRagError::parse("empty feed document")),
            Ok(_) => continue,
            Err(e) => return Err(NewsRagError::parse(format!("malformed XML: {e}"))),
        }
    }
}

/// Replace HTML-only named entities that XML parsers reject.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

static RE_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"));
static RE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Decode entities, strip tags, and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}
