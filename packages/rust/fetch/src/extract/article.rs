//! Structured article extraction.
//!
//! Picks the candidate container holding the most paragraph text and
//! returns its paragraphs. Output shorter than the configured minimum is
//! reported as a failure so the chain moves on.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{ExtractStrategy, collapse_whitespace};
use crate::http::HttpClient;

/// Containers that usually wrap an article body, most specific first.
const ARTICLE_CANDIDATES: &[&str] = &[
    r#"[itemprop="articleBody"]"#,
    "article",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".article-content",
    "main",
];

/// Downloads a page and extracts its main article body.
pub struct ArticleExtractor {
    http: HttpClient,
    min_chars: usize,
}

impl ArticleExtractor {
    pub fn new(http: HttpClient, min_chars: usize) -> Self {
        Self { http, min_chars }
    }
}

#[async_trait]
impl ExtractStrategy for ArticleExtractor {
    async fn try_extract(&self, url: &str) -> Option<String> {
        let html = match self.http.get_text(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%url, error = %e, "article download failed");
                return None;
            }
        };

        let text = article_text(&html);
        let len = text.chars().count();
        if len < self.min_chars {
            debug!(%url, len, min = self.min_chars, "article body too short");
            return None;
        }
        Some(text)
    }

    fn name(&self) -> &str {
        "article"
    }
}

/// Paragraph text of the richest article container, blank-line separated.
pub(crate) fn article_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(p_sel) = Selector::parse("p") else {
        return String::new();
    };

    let mut best: Vec<String> = Vec::new();
    let mut best_len = 0;

    for candidate in ARTICLE_CANDIDATES {
        let Ok(sel) = Selector::parse(candidate) else {
            continue;
        };
        for el in doc.select(&sel) {
            let paragraphs = paragraphs(&el, &p_sel);
            let len: usize = paragraphs.iter().map(String::len).sum();
            // Strictly greater: earlier (more specific) candidates win ties.
            if len > best_len {
                best_len = len;
                best = paragraphs;
            }
        }
    }

    if best.is_empty() {
        best = paragraphs(&doc.root_element(), &p_sel);
    }

    best.join("\n\n")
}

fn paragraphs(el: &ElementRef<'_>, p_sel: &Selector) -> Vec<String> {
    el.select(p_sel)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect()
}
