//! Thin HTTP GET wrapper shared by feed fetching and content extraction.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use newsrag_shared::{NewsRagError, Result};

/// User-Agent string for all outgoing requests.
const USER_AGENT: &str = concat!("newsrag/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// Cloneable HTTP client with a per-request timeout.
///
/// No retries: a failed or timed-out request is reported once and the
/// caller decides how to degrade.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Build a client whose every request times out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| NewsRagError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url` and return the body as text. Non-2xx statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!(%url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NewsRagError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsRagError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| NewsRagError::Network(format!("{url}: body read failed: {e}")))
    }
}
