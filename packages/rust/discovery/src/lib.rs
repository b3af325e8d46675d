//! Competitor discovery.
//!
//! Given an article title, asks a [`SearchOracle`] for candidate pages,
//! drops anything hosted on the source blog's own domain, and keeps the
//! first few survivors in ranking order. Discovery never fails: an oracle
//! error is logged and yields an empty list.

mod oracle;

use tracing::{debug, info, instrument, warn};
use url::Url;

use postsmith_shared::{AppConfig, Result};

pub use oracle::{FixedOracle, SearchHit, SearchOracle, SerperOracle, UnconfiguredOracle};

// ---------------------------------------------------------------------------
// CompetitorDiscovery
// ---------------------------------------------------------------------------

pub struct CompetitorDiscovery {
    oracle: Box<dyn SearchOracle>,
    /// Registrable host of the source blog, without `www.`.
    excluded_domain: String,
    limit: usize,
}

impl CompetitorDiscovery {
    pub fn new(oracle: Box<dyn SearchOracle>, excluded_domain: impl Into<String>, limit: usize) -> Self {
        let excluded_domain = excluded_domain.into().to_ascii_lowercase();
        let excluded_domain = excluded_domain
            .strip_prefix("www.")
            .map(String::from)
            .unwrap_or(excluded_domain);

        Self {
            oracle,
            excluded_domain,
            limit,
        }
    }

    /// Pick the oracle from configuration.
    ///
    /// A fixed URL list (from the config file or `MOCK_SEARCH_RESULTS`)
    /// wins over live search. Without a fixed list or an API key every
    /// discovery returns an empty list.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fixed = config.competitors.effective_fixed_urls();

        let oracle: Box<dyn SearchOracle> = if !fixed.is_empty() {
            info!(count = fixed.len(), "using fixed competitor list");
            Box::new(FixedOracle::new(fixed))
        } else if let Some(key) = config.search.api_key() {
            Box::new(SerperOracle::new(key, &config.search)?)
        } else {
            warn!(
                env = %config.search.api_key_env,
                "no search API key configured, discovery will find nothing"
            );
            Box::new(UnconfiguredOracle {
                key_env: config.search.api_key_env.clone(),
            })
        };

        Ok(Self::new(
            oracle,
            config.source.domain()?,
            config.competitors.max_results,
        ))
    }

    /// Up to `limit` competitor URLs for `title`, in oracle order.
    #[instrument(skip_all, fields(oracle = self.oracle.name()))]
    pub async fn discover(&self, title: &str) -> Vec<String> {
        let hits = match self.oracle.search(title).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(title, error = %e, "search failed, continuing without competitors");
                return Vec::new();
            }
        };

        let total = hits.len();
        let urls: Vec<String> = hits
            .into_iter()
            .map(|hit| hit.url)
            .filter(|url| self.is_external(url))
            .take(self.limit)
            .collect();

        info!(title, total, kept = urls.len(), "competitors discovered");
        urls
    }

    /// Whether `raw` parses and is hosted outside the excluded domain.
    fn is_external(&self, raw: &str) -> bool {
        let Ok(url) = Url::parse(raw) else {
            debug!(url = raw, "dropping unparseable search result");
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        let host = host.to_ascii_lowercase();
        let own = host == self.excluded_domain
            || host
                .strip_suffix(&self.excluded_domain)
                .is_some_and(|prefix| prefix.ends_with('.'));
        if own {
            debug!(url = raw, "dropping self-hosted search result");
        }
        !own
    }
}
