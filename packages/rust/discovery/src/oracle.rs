//! Search oracles: anything that turns a query into ranked candidate URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use postsmith_shared::{PostsmithError, Result, SearchConfig};

/// Per-request timeout for search calls.
const SEARCH_TIMEOUT_SECS: u64 = 15;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
}

/// A web-search backend, treated as a black box.
#[async_trait]
pub trait SearchOracle: Send + Sync {
    /// Results in the backend's ranking order.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Serper (Google Search)
// ---------------------------------------------------------------------------

pub struct SerperOracle {
    api_key: String,
    endpoint: String,
    num_results: u32,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
}

impl SerperOracle {
    pub fn new(api_key: impl Into<String>, config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| PostsmithError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            endpoint: config.endpoint.clone(),
            num_results: config.num_results,
            client,
        })
    }

    /// Override the search endpoint (for tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchOracle for SerperOracle {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        info!(query, num = self.num_results, "serper search");

        let body = serde_json::json!({
            "q": query,
            "num": self.num_results,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PostsmithError::Network(format!("search request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PostsmithError::Network(format!("search returned HTTP {status}")));
        }

        let data: SerperResponse = resp
            .json()
            .await
            .map_err(|e| PostsmithError::parse(format!("bad search response: {e}")))?;

        let hits: Vec<SearchHit> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| SearchHit {
                url: r.link,
                title: r.title,
            })
            .collect();

        debug!(query, count = hits.len(), "serper search complete");
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "serper"
    }
}

// ---------------------------------------------------------------------------
// Fixed list
// ---------------------------------------------------------------------------

/// Returns the same operator-supplied URLs for every query.
pub struct FixedOracle {
    urls: Vec<String>,
}

impl FixedOracle {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl SearchOracle for FixedOracle {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
        Ok(self
            .urls
            .iter()
            .map(|url| SearchHit {
                url: url.clone(),
                title: String::new(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

// ---------------------------------------------------------------------------
// Unconfigured
// ---------------------------------------------------------------------------

/// Stand-in when no search backend is configured; every query fails.
pub struct UnconfiguredOracle {
    pub key_env: String,
}

#[async_trait]
impl SearchOracle for UnconfiguredOracle {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
        Err(PostsmithError::config(format!(
            "no search API key found (set {})",
            self.key_env
        )))
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}
