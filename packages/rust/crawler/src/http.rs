//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use url::Url;

use postsmith_shared::{PostsmithError, Result};

/// Desktop browser User-Agent. Some blogs serve bots a stripped page.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MAX_REDIRECTS: usize = 5;

/// Build a client with the browser User-Agent and a per-request timeout.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    build(timeout_secs, Policy::limited(MAX_REDIRECTS))
}

/// Like [`build_client`], but a redirect to any URL `blocked` rejects fails
/// the request instead of being followed.
pub fn build_guarded_client(timeout_secs: u64, blocked: fn(&Url) -> bool) -> Result<Client> {
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if blocked(attempt.url()) {
            let message = format!("refusing redirect to non-public URL: {}", attempt.url());
            attempt.error(message)
        } else {
            attempt.follow()
        }
    });
    build(timeout_secs, policy)
}

fn build(timeout_secs: u64, policy: Policy) -> Result<Client> {
    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .redirect(policy)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PostsmithError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET `url` and return the body, treating any non-2xx status as an error.
pub async fn get_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PostsmithError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PostsmithError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| PostsmithError::Network(format!("{url}: body read failed: {e}")))
}
