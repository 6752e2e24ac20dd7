//! Content extraction chain.
//!
//! An [`ExtractorChain`] consults the content cache first, then tries each
//! [`ExtractStrategy`] in order until one produces text. The winning output
//! is length-capped, written to the cache under the URL hash, and returned.
//! When every strategy fails the chain returns an empty string; it never
//! raises to the caller.

mod article;
mod heuristic;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use newsrag_shared::{FetchConfig, NewsRagError, Result};
use newsrag_storage::{ContentCache, cache_key};

use crate::http::HttpClient;
use crate::truncate_chars;

pub use article::ArticleExtractor;
pub use heuristic::HeuristicExtractor;

/// One way of turning a URL into readable text.
#[async_trait]
pub trait ExtractStrategy: Send + Sync {
    /// Extract text from `url`, or `None` if this strategy cannot.
    async fn try_extract(&self, url: &str) -> Option<String>;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

/// Cache-fronted, ordered list of extraction strategies.
pub struct ExtractorChain {
    cache: Arc<dyn ContentCache>,
    strategies: Vec<Box<dyn ExtractStrategy>>,
    max_chars: usize,
}

impl ExtractorChain {
    /// Build a chain from explicit strategies (tried in the given order).
    pub fn new(
        cache: Arc<dyn ContentCache>,
        strategies: Vec<Box<dyn ExtractStrategy>>,
        max_chars: usize,
    ) -> Self {
        Self {
            cache,
            strategies,
            max_chars,
        }
    }

    /// The standard chain: structured article extraction, then the heuristic fallback.
    pub fn standard(http: HttpClient, cache: Arc<dyn ContentCache>, config: &FetchConfig) -> Self {
        Self::new(
            cache,
            vec![
                Box::new(ArticleExtractor::new(http.clone(), config.min_article_chars)),
                Box::new(HeuristicExtractor::new(http, config.max_content_chars)),
            ],
            config.max_content_chars,
        )
    }

    /// Extract capped text for `url`, using and filling the cache.
    ///
    /// Returns an empty string when every strategy fails.
    #[instrument(skip(self))]
    pub async fn extract(&self, url: &str) -> String {
        match self.try_chain(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "extraction failed");
                String::new()
            }
        }
    }

    /// Cache lookup, then each strategy in order. Fails with
    /// [`NewsRagError::Extraction`] once every strategy has declined.
    async fn try_chain(&self, url: &str) -> Result<String> {
        let key = cache_key(url);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        for strategy in &self.strategies {
            match strategy.try_extract(url).await {
                Some(text) => {
                    let text = truncate_chars(&text, self.max_chars);
                    if let Err(e) = self.cache.put(&key, &text) {
                        warn!(error = %e, "failed to cache extracted content");
                    }
                    debug!(strategy = strategy.name(), len = text.len(), "extracted");
                    return Ok(text);
                }
                None => debug!(strategy = strategy.name(), "strategy failed"),
            }
        }

        Err(NewsRagError::Extraction(format!(
            "{} strategies exhausted for {url}",
            self.strategies.len()
        )))
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<Vec<(String, String)>>,
    }

    impl ContentCache for MemoryCache {
        fn get(&self, key: &str) -> Option<String> {
            let entries = self.entries.lock().unwrap();
            entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        }

        fn put(&self, key: &str, text: &str) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .push((key.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct Fixed {
        output: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExtractStrategy for Fixed {
        async fn try_extract(&self, _url: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output.map(String::from)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn fixed(output: Option<&'static str>) -> (Box<dyn ExtractStrategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Fixed {
                output,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[tokio::test]
    async fn falls_through_to_second_strategy_and_caches() {
        let cache = Arc::new(MemoryCache::default());
        let (first, first_calls) = fixed(None);
        let (second, second_calls) = fixed(Some("fallback text"));
        let chain = ExtractorChain::new(cache.clone(), vec![first, second], 100);

        assert_eq!(chain.extract("https://a.dev/x").await, "fallback text");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get(&cache_key("https://a.dev/x")).as_deref(),
            Some("fallback text")
        );

        // Second call is served from cache
        assert_eq!(chain.extract("https://a.dev/x").await, "fallback text");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failures_yield_empty_and_cache_nothing() {
        let cache = Arc::new(MemoryCache::default());
        let (a, _) = fixed(None);
        let (b, _) = fixed(None);
        let chain = ExtractorChain::new(cache.clone(), vec![a, b], 100);

        assert_eq!(chain.extract("https://a.dev/y").await, "");
        assert!(cache.entries.lock().unwrap().is_empty());

        let exhausted = chain.try_chain("https://a.dev/y").await;
        assert!(
            matches!(exhausted, Err(NewsRagError::Extraction(msg)) if msg.contains("2 strategies"))
        );
    }

    #[tokio::test]
    async fn output_is_capped() {
        let cache = Arc::new(MemoryCache::default());
        let (a, _) = fixed(Some("0123456789"));
        let chain = ExtractorChain::new(cache, vec![a], 4);
        assert_eq!(chain.extract("https://a.dev/z").await, "0123");
    }

    mod over_http {
        use std::path::PathBuf;

        use uuid::Uuid;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use newsrag_storage::FileCache;

        use super::*;

        fn chain(dir: &PathBuf) -> (ExtractorChain, Arc<FileCache>) {
            let cache = Arc::new(FileCache::open(dir).unwrap());
            let config = FetchConfig {
                min_article_chars: 200,
                max_content_chars: 2000,
                ..FetchConfig::default()
            };
            let http = HttpClient::new(5).unwrap();
            (ExtractorChain::standard(http, cache.clone(), &config), cache)
        }

        #[tokio::test]
        async fn short_article_falls_back_to_heuristic() {
            let server = MockServer::start().await;
            let page = r#"<html><head>
                <meta property="og:title" content="Agents Ship">
                <meta property="og:description" content="A short note.">
                </head><body><article><p>Too short.</p></article></body></html>"#;
            Mock::given(method("GET"))
                .and(path("/short"))
                .respond_with(ResponseTemplate::new(200).set_body_string(page))
                .expect(2)
                .mount(&server)
                .await;

            let dir = std::env::temp_dir().join(format!("newsrag-chain-{}", Uuid::now_v7()));
            let (chain, cache) = chain(&dir);
            let url = format!("{}/short", server.uri());

            let text = chain.extract(&url).await;
            assert!(text.starts_with("Title: Agents Ship\n"));
            assert!(text.contains("Summary: A short note."));
            assert!(text.contains("Too short."));
            assert_eq!(cache.get(&cache_key(&url)).as_deref(), Some(text.as_str()));

            let _ = std::fs::remove_dir_all(&dir);
        }

        #[tokio::test]
        async fn second_extraction_is_served_from_cache() {
            let server = MockServer::start().await;
            let body = "Large language model agents are reshaping research. ".repeat(10);
            let page = format!("<html><body><article><p>{body}</p></article></body></html>");
            Mock::given(method("GET"))
                .and(path("/long"))
                .respond_with(ResponseTemplate::new(200).set_body_string(page))
                .expect(1)
                .mount(&server)
                .await;

            let dir = std::env::temp_dir().join(format!("newsrag-chain-{}", Uuid::now_v7()));
            let (chain, _cache) = chain(&dir);
            let url = format!("{}/long", server.uri());

            let first = chain.extract(&url).await;
            let second = chain.extract(&url).await;
            assert_eq!(first, second);
            assert!(first.starts_with("Large language model agents"));

            let _ = std::fs::remove_dir_all(&dir);
        }

        #[tokio::test]
        async fn unreachable_page_yields_empty_text() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let dir = std::env::temp_dir().join(format!("newsrag-chain-{}", Uuid::now_v7()));
            let (chain, _cache) = chain(&dir);

            assert_eq!(chain.extract(&format!("{}/gone", server.uri())).await, "");
            let _ = std::fs::remove_dir_all(&dir);
        }
    }
}
