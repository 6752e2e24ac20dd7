//! NCBI E-utilities (PubMed) search.
//!
//! A source URL points at an `esearch.fcgi` endpoint carrying `db` and
//! `term`. The search returns matching ids; those are resolved to titles,
//! journals, authors, and dates through the sibling `esummary.fcgi`
//! endpoint. Both responses are JSON.

use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use newsrag_shared::{NewsRagError, Result};

use crate::feed::{FeedEntry, normalize_text};

/// Article page for a PubMed id.
pub const PUBMED_ARTICLE_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov";

const SEARCH_ENDPOINT: &str = "esearch.fcgi";
const SUMMARY_ENDPOINT: &str = "esummary.fcgi";

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// `base` with `retmax` and `retmode=json` set, replacing any existing values.
pub fn search_url(base: &str, retmax: usize) -> Result<String> {
    let mut url = parse(base)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "retmax" && k != "retmode")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("retmax", &retmax.to_string())
        .append_pair("retmode", "json");
    Ok(url.into())
}

/// The `esummary` URL for `ids`, next to the `esearch` endpoint in `base`.
///
/// Only `db` (and `api_key`, if present) carry over from the search URL.
pub fn summary_url(base: &str, ids: &[String]) -> Result<String> {
    let mut url = parse(base)?;

    let path = url.path();
    let summary_path = match path.strip_suffix(SEARCH_ENDPOINT) {
        Some(prefix) => format!("{prefix}{SUMMARY_ENDPOINT}"),
        None => {
            return Err(NewsRagError::validation(format!(
                "Entrez source URL must end in {SEARCH_ENDPOINT}: {base}"
            )));
        }
    };
    url.set_path(&summary_path);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k == "db" || k == "api_key")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("id", &ids.join(","))
        .append_pair("retmode", "json");
    Ok(url.into())
}

fn parse(base: &str) -> Result<Url> {
    Url::parse(base)
        .map_err(|e| NewsRagError::validation(format!("invalid source URL {base}: {e}")))
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SummaryResponse {
    result: SummaryResult,
}

#[derive(Deserialize)]
struct SummaryResult {
    #[serde(default)]
    uids: Vec<String>,
    #[serde(flatten)]
    docs: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DocSummary {
    title: String,
    source: String,
    fulljournalname: String,
    pubdate: String,
    sortpubdate: String,
    authors: Vec<Author>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Author {
    name: String,
}

/// Ids listed by an `esearch` response. A server-reported error is a parse error.
pub fn parse_search_ids(json: &str) -> Result<Vec<String>> {
    let response: SearchResponse = serde_json::from_str(json)
        .map_err(|e| NewsRagError::parse(format!("invalid esearch response: {e}")))?;
    match response.esearchresult.error {
        Some(error) => Err(NewsRagError::parse(format!("esearch error: {error}"))),
        None => Ok(response.esearchresult.idlist),
    }
}

/// Entries of an `esummary` response, in `uids` order.
///
/// The summary is the journal name plus the author list; the publish date
/// prefers the sortable `YYYY/MM/DD` form.
pub fn parse_summaries(json: &str) -> Result<Vec<FeedEntry>> {
    let response: SummaryResponse = serde_json::from_str(json)
        .map_err(|e| NewsRagError::parse(format!("invalid esummary response: {e}")))?;
    let SummaryResult { uids, mut docs } = response.result;

    let entries = uids
        .into_iter()
        .filter_map(|uid| {
            let doc: DocSummary = serde_json::from_value(docs.remove(&uid)?).ok()?;
            Some(entry(&uid, doc))
        })
        .collect();
    Ok(entries)
}

fn entry(uid: &str, doc: DocSummary) -> FeedEntry {
    let journal = if doc.fulljournalname.trim().is_empty() {
        doc.source
    } else {
        doc.fulljournalname
    };
    let authors: Vec<&str> = doc
        .authors
        .iter()
        .map(|a| a.name.trim())
        .filter(|n| !n.is_empty())
        .collect();
    let summary = if authors.is_empty() {
        journal
    } else {
        format!("{journal}. Authors: {}", authors.join(", "))
    };

    let published = [doc.sortpubdate, doc.pubdate]
        .into_iter()
        .map(|d| d.trim().to_string())
        .find(|d| !d.is_empty());

    FeedEntry {
        title: normalize_text(&doc.title),
        link: Some(format!("{PUBMED_ARTICLE_BASE}/{uid}/")),
        summary: normalize_text(&summary),
        published,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str =
        r#"{"header":{"type":"esearch"},"esearchresult":{"count":"2","retmax":"2","idlist":["401","402"]}}"#;

    const SUMMARY: &str = r#"{
      "header": {"type": "esummary"},
      "result": {
        "uids": ["401", "402"],
        "401": {
          "uid": "401",
          "title": "Large language models in clinical triage.",
          "source": "Nat Med",
          "fulljournalname": "Nature medicine",
          "pubdate": "2025 Mar 4",
          "sortpubdate": "2025/03/04 00:00",
          "authors": [{"name": "Doe J", "authtype": "Author"}, {"name": "Roe R"}]
        },
        "402": {
          "uid": "402",
          "title": "Agents for &lt;i&gt;in silico&lt;/i&gt; screening",
          "source": "Bioinformatics",
          "pubdate": "2024"
        }
      }
    }"#;

    #[test]
    fn search_ids_are_listed_in_order() {
        assert_eq!(parse_search_ids(SEARCH).unwrap(), vec!["401", "402"]);
        let empty = r#"{"esearchresult":{"count":"0","idlist":[]}}"#;
        assert!(parse_search_ids(empty).unwrap().is_empty());
    }

    #[test]
    fn search_error_is_a_parse_error() {
        let failed = r#"{"esearchresult":{"ERROR":"Invalid db name specified: pubmedd"}}"#;
        assert!(matches!(parse_search_ids(failed), Err(NewsRagError::Parse { .. })));
        assert!(parse_search_ids("<html>").is_err());
    }

    #[test]
    fn summaries_become_entries() {
        let entries = parse_summaries(SUMMARY).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Large language models in clinical triage.");
        assert_eq!(entries[0].link.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/401/"));
        assert_eq!(entries[0].summary, "Nature medicine. Authors: Doe J, Roe R");
        assert_eq!(entries[0].published.as_deref(), Some("2025/03/04 00:00"));

        assert_eq!(entries[1].title, "Agents for in silico screening");
        assert_eq!(entries[1].summary, "Bioinformatics");
        assert_eq!(entries[1].published.as_deref(), Some("2024"));
    }

    #[test]
    fn urls_keep_query_and_swap_endpoint() {
        let base = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?db=pubmed&term=llm&retmax=5";

        let search = Url::parse(&search_url(base, 20).unwrap()).unwrap();
        let pairs: Vec<(String, String)> = search
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("db".to_string(), "pubmed".to_string()),
                ("term".to_string(), "llm".to_string()),
                ("retmax".to_string(), "20".to_string()),
                ("retmode".to_string(), "json".to_string()),
            ]
        );

        let summary = summary_url(base, &["1".into(), "2".into()]).unwrap();
        assert_eq!(
            summary,
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi?db=pubmed&id=1%2C2&retmode=json"
        );

        assert!(summary_url("https://example.com/search", &["1".into()]).is_err());
    }
}
