//! Concurrent fetching of competitor article bodies.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use postsmith_shared::{FetchConfig, PostsmithError, Result};

use crate::extract::BodyExtractor;
use crate::guard::is_ssrf_target;
use crate::http::{build_guarded_client, get_text};

/// Extracted main text of one competitor page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitorPage {
    pub url: String,
    pub text: String,
}

/// Fetches competitor pages in parallel and keeps the substantive ones.
#[derive(Clone)]
pub struct CompetitorFetcher {
    client: Client,
    extractor: Arc<BodyExtractor>,
    min_chars: usize,
    /// Targets refused both as the requested URL and as a redirect hop.
    blocked: fn(&Url) -> bool,
}

impl CompetitorFetcher {
    /// Fetcher that refuses loopback, private and link-local targets.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Self::with_guard(config, is_ssrf_target)
    }

    /// Fetcher with a custom target filter. Mock-server tests pass one that
    /// lets localhost through.
    pub fn with_guard(config: &FetchConfig, blocked: fn(&Url) -> bool) -> Result<Self> {
        Ok(Self {
            client: build_guarded_client(config.timeout_secs, blocked)?,
            extractor: Arc::new(BodyExtractor::new(&config.body_selectors, config.max_chars)),
            min_chars: config.min_chars,
            blocked,
        })
    }

    /// Fetch one page and return its extracted (possibly empty) text.
    pub async fn fetch_text(&self, raw_url: &str) -> Result<String> {
        let url = Url::parse(raw_url)
            .map_err(|e| PostsmithError::validation(format!("invalid URL '{raw_url}': {e}")))?;
        if (self.blocked)(&url) {
            return Err(PostsmithError::validation(format!(
                "refusing to fetch non-public URL: {url}"
            )));
        }

        let html = get_text(&self.client, url.as_str()).await?;
        Ok(self.extractor.extract(&html))
    }

    /// Fetch all `urls` concurrently.
    ///
    /// Failed fetches are skipped. Texts of `min_chars` characters or fewer
    /// are discarded. The result keeps the input order.
    #[instrument(skip_all, fields(count = urls.len()))]
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<CompetitorPage> {
        let handles: Vec<_> = urls
            .iter()
            .cloned()
            .map(|url| {
                let fetcher = self.clone();
                tokio::spawn(async move {
                    let result = fetcher.fetch_text(&url).await;
                    (url, result)
                })
            })
            .collect();

        let mut pages = Vec::new();
        for handle in handles {
            let (url, result) = match handle.await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "competitor fetch task failed");
                    continue;
                }
            };

            match result {
                Ok(text) => {
                    let chars = text.chars().count();
                    if chars > self.min_chars {
                        debug!(%url, chars, "competitor text kept");
                        pages.push(CompetitorPage { url, text });
                    } else {
                        debug!(%url, chars, "competitor text too short, dropped");
                    }
                }
                Err(e) => warn!(%url, error = %e, "competitor fetch failed, skipping"),
            }
        }

        info!(kept = pages.len(), "competitor pages fetched");
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::http::BROWSER_USER_AGENT;

    fn page(len: usize) -> String {
        format!("<html><body><article><p>{}</p></article></body></html>", "x".repeat(len))
    }

    async fn mount(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn fetcher() -> CompetitorFetcher {
        CompetitorFetcher::with_guard(&FetchConfig::default(), |_| false).unwrap()
    }

    #[tokio::test]
    async fn short_texts_are_dropped() {
        let server = MockServer::start().await;
        mount(&server, "/short", page(50)).await;
        mount(&server, "/long", page(5_000)).await;

        let urls = vec![
            format!("{}/short", server.uri()),
            format!("{}/long", server.uri()),
        ];
        let pages = fetcher().fetch_all(&urls).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, urls[1]);
        assert_eq!(pages[0].text.chars().count(), 5_000);
    }

    #[tokio::test]
    async fn exactly_min_chars_is_dropped() {
        let server = MockServer::start().await;
        mount(&server, "/edge", page(200)).await;
        mount(&server, "/over", page(201)).await;

        let urls = vec![
            format!("{}/edge", server.uri()),
            format!("{}/over", server.uri()),
        ];
        let pages = fetcher().fetch_all(&urls).await;
        assert_eq!(pages.len(), 1);
        assert!(pages[0].url.ends_with("/over"));
    }

    #[tokio::test]
    async fn failures_are_skipped_and_order_kept() {
        let server = MockServer::start().await;
        mount(&server, "/a", page(400)).await;
        mount(&server, "/b", page(300)).await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/broken", server.uri()),
            format!("{}/a", server.uri()),
            "not a url".to_string(),
            format!("{}/b", server.uri()),
        ];
        let pages = fetcher().fetch_all(&urls).await;

        let kept: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(kept, vec![urls[1].as_str(), urls[3].as_str()]);
    }

    #[tokio::test]
    async fn long_pages_are_truncated() {
        let server = MockServer::start().await;
        mount(&server, "/huge", page(25_000)).await;

        let pages = fetcher()
            .fetch_all(&[format!("{}/huge", server.uri())])
            .await;
        assert_eq!(pages[0].text.chars().count(), 10_000);
    }

    #[tokio::test]
    async fn sends_browser_user_agent() {
        let server = MockServer::start().await;
        mount(&server, "/ua", page(500)).await;

        let pages = fetcher().fetch_all(&[format!("{}/ua", server.uri())]).await;
        assert_eq!(pages.len(), 1);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let ua = requests[0].headers.get("user-agent").unwrap();
        assert_eq!(ua.to_str().unwrap(), BROWSER_USER_AGENT);
    }

    #[tokio::test]
    async fn fixture_article_text() {
        let server = MockServer::start().await;
        let fixture = std::fs::read_to_string("../../../fixtures/html/competitor_article.html")
            .expect("missing fixture: competitor_article.html");
        mount(&server, "/post", fixture).await;

        let pages = fetcher()
            .fetch_all(&[format!("{}/post", server.uri())])
            .await;
        assert_eq!(pages.len(), 1);
        let text = &pages[0].text;
        assert!(!text.contains("trackPageView"));
        assert!(!text.contains("Copyright 2024"));
    }

    #[tokio::test]
    async fn private_targets_are_refused_by_default() {
        let strict = CompetitorFetcher::new(&FetchConfig::default()).unwrap();
        let err = strict.fetch_text("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, PostsmithError::Validation { .. }));
        assert!(strict.fetch_all(&["http://localhost/x".into()]).await.is_empty());
    }

    #[tokio::test]
    async fn empty_input_yields_nothing() {
        assert!(fetcher().fetch_all(&[]).await.is_empty());
    }

    fn blocks_internal(url: &Url) -> bool {
        url.path().starts_with("/internal")
    }

    #[tokio::test]
    async fn redirect_to_blocked_target_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hop"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/internal/meta", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/internal/meta"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(500)))
            .expect(0)
            .mount(&server)
            .await;

        let guarded =
            CompetitorFetcher::with_guard(&FetchConfig::default(), blocks_internal).unwrap();
        let err = guarded
            .fetch_text(&format!("{}/hop", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, PostsmithError::Network(_)), "{err}");
        assert!(guarded.fetch_all(&[format!("{}/hop", server.uri())]).await.is_empty());
    }

    #[tokio::test]
    async fn redirect_to_allowed_target_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hop"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("location", format!("{}/article", server.uri())),
            )
            .mount(&server)
            .await;
        mount(&server, "/article", page(500)).await;

        let guarded =
            CompetitorFetcher::with_guard(&FetchConfig::default(), blocks_internal).unwrap();
        let pages = guarded.fetch_all(&[format!("{}/hop", server.uri())]).await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text.chars().count(), 500);
    }
}
