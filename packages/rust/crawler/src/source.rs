//! Source blog crawler.
//!
//! Reads the configured archive pages (the oldest ones), flips each page
//! from newest-first to oldest-first, concatenates pages from the highest
//! page number down, and keeps the first `limit` entries. [`SourceCrawler::ingest`]
//! then writes them with insert-or-ignore semantics keyed on the link.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use postsmith_shared::{CrawlConfig, NewArticle, PostsmithError, Result, normalize_date};
use postsmith_storage::ArticleStore;

use crate::extract::ListingExtractor;
use crate::http::{build_client, get_text};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What happened to one crawled article during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub title: String,
    pub link: String,
    /// Id of the stored record (new or pre-existing).
    pub id: i64,
    /// `false` when a record with the same link already existed.
    pub inserted: bool,
}

/// Summary of a crawl-and-ingest run.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub outcomes: Vec<IngestOutcome>,
    /// Archive pages that returned a listing.
    pub pages_fetched: usize,
    /// Archive pages that failed to load.
    pub pages_failed: usize,
    /// Errors encountered (link or URL, message).
    pub errors: Vec<(String, String)>,
    pub duration: Duration,
}

impl CrawlResult {
    pub fn inserted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.inserted).count()
    }

    pub fn existing_count(&self) -> usize {
        self.outcomes.len() - self.inserted_count()
    }
}

// ---------------------------------------------------------------------------
// SourceCrawler
// ---------------------------------------------------------------------------

/// Crawler for the paginated source blog archive.
pub struct SourceCrawler {
    config: CrawlConfig,
    client: Client,
    base: Url,
    extractor: ListingExtractor,
}

impl SourceCrawler {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url).map_err(|e| {
            PostsmithError::config(format!("invalid source base_url '{}': {e}", config.base_url))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            extractor: ListingExtractor::new(&config.selectors)?,
            base,
            config,
        })
    }

    /// URL of archive page `page`, e.g. `https://host/blogs/page/15/`.
    pub fn page_url(&self, page: u32) -> Result<Url> {
        self.base
            .join(&format!("page/{page}/"))
            .map_err(|e| PostsmithError::config(format!("cannot build page URL: {e}")))
    }

    /// Fetch one archive page. Any failure yields an error the caller may
    /// treat as an empty page.
    async fn fetch_listing(&self, page: u32) -> Result<Vec<NewArticle>> {
        let url = self.page_url(page)?;
        debug!(%url, page, "fetching archive page");

        let html = get_text(&self.client, url.as_str()).await?;
        let entries = self.extractor.extract(&html, Some(&url));

        Ok(entries
            .into_iter()
            .map(|e| NewArticle {
                title: e.title,
                link: e.link,
                date: normalize_date(&e.date),
                excerpt: e.excerpt,
            })
            .collect())
    }

    /// Collect the oldest articles, oldest first.
    ///
    /// Returns the articles plus per-page failures. A failed page counts
    /// as an empty page.
    #[instrument(skip_all, fields(base = %self.base))]
    pub async fn crawl_oldest(&self) -> (Vec<NewArticle>, CrawlStats) {
        let mut pages = self.config.pages.clone();
        pages.sort_unstable_by(|a, b| b.cmp(a));
        pages.dedup();

        let mut stats = CrawlStats::default();
        let mut collected = Vec::new();

        for (i, page) in pages.iter().copied().enumerate() {
            if i > 0 && self.config.rate_limit_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.rate_limit_ms)).await;
            }

            match self.fetch_listing(page).await {
                Ok(mut entries) => {
                    debug!(page, count = entries.len(), "archive page parsed");
                    stats.pages_fetched += 1;
                    entries.reverse();
                    collected.extend(entries);
                }
                Err(e) => {
                    warn!(page, error = %e, "archive page failed, treating as empty");
                    stats.pages_failed += 1;
                    stats.errors.push((format!("page {page}"), e.to_string()));
                }
            }
        }

        collected.truncate(self.config.limit);
        (collected, stats)
    }

    /// Crawl and store the oldest articles. Existing links are left untouched.
    #[instrument(skip_all)]
    pub async fn ingest(&self, store: &dyn ArticleStore) -> Result<CrawlResult> {
        let start = Instant::now();
        let (articles, mut stats) = self.crawl_oldest().await;

        let mut outcomes = Vec::with_capacity(articles.len());
        for article in articles {
            match store.insert_if_absent(&article).await {
                Ok(outcome) => {
                    if outcome.inserted {
                        info!(id = outcome.id, title = %article.title, "inserted");
                    } else {
                        info!(id = outcome.id, title = %article.title, "already exists");
                    }
                    outcomes.push(IngestOutcome {
                        title: article.title,
                        link: article.link,
                        id: outcome.id,
                        inserted: outcome.inserted,
                    });
                }
                Err(e @ PostsmithError::Validation { .. }) => {
                    warn!(link = %article.link, error = %e, "skipping invalid article");
                    stats.errors.push((article.link, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(CrawlResult {
            outcomes,
            pages_fetched: stats.pages_fetched,
            pages_failed: stats.pages_failed,
            errors: stats.errors,
            duration: start.elapsed(),
        })
    }
}

/// Page-level counters from [`SourceCrawler::crawl_oldest`].
#[derive(Debug, Clone, Default)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub errors: Vec<(String, String)>,
}
