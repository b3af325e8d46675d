//! Fetching and content extraction.
//!
//! This crate provides:
//! - [`extract`]: listing-mode and body-mode HTML extraction
//! - [`SourceCrawler`]: reads the oldest archive pages of the source blog
//! - [`CompetitorFetcher`]: concurrent competitor page fetching
//! - [`guard`]: refuses URLs that point at private networks

pub mod competitor;
pub mod extract;
pub mod guard;
pub mod http;
pub mod source;

pub use competitor::{CompetitorFetcher, CompetitorPage};
pub use extract::{BodyExtractor, ListingEntry, ListingExtractor, SelectorChain, truncate_chars};
pub use guard::is_ssrf_target;
pub use http::{BROWSER_USER_AGENT, build_client, build_guarded_client};
pub use source::{CrawlResult, CrawlStats, IngestOutcome, SourceCrawler};

#[cfg(test)]
mod tests {
    use super::*;
    use postsmith_shared::ListingSelectorsConfig;
    use url::Url;

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn listing_fixture_entries() {
        let extractor = ListingExtractor::new(&ListingSelectorsConfig::default()).unwrap();
        let page = Url::parse("https://beyondchats.com/blogs/page/15/").unwrap();
        let entries = extractor.extract(&load_fixture("blog_listing.html"), Some(&page));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Live Chat vs Chatbots: Which One Fits You?");
        assert_eq!(entries[0].date, "April 12, 2023");
        assert!(!entries[0].excerpt.is_empty());
        assert_eq!(entries[1].link, "https://beyondchats.com/blogs/chatbots-for-clinics/");
        assert_eq!(entries[1].date, "March 3, 2023");
    }

    #[test]
    fn body_fixture_skips_chrome() {
        let extractor = BodyExtractor::new(&["article", "main"], 10_000);
        let text = extractor.extract(&load_fixture("competitor_article.html"));

        assert!(text.chars().count() > 200);
        assert!(!text.contains("trackPageView"));
        assert!(!text.contains("Copyright 2024"));
        assert!(!text.contains("{"), "style content leaked: {text}");
    }

    #[test]
    fn body_mode_on_listing_takes_first_entry() {
        let extractor = BodyExtractor::new(&["article"], 10_000);
        let text = extractor.extract(&load_fixture("blog_listing.html"));
        assert!(text.starts_with("Live Chat vs Chatbots"));
    }
}
