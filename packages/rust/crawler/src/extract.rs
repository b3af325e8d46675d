//! Best-effort content extraction over parsed HTML.
//!
//! Two modes:
//! - **Listing** ([`ListingExtractor`]): one [`ListingEntry`] per repeated
//!   container, each field taken from the first selector alternative that
//!   yields non-empty text.
//! - **Body** ([`BodyExtractor`]): plain text of the first matching content
//!   container, falling back to `<body>`, truncated to a character budget.
//!
//! Neither mode fails on malformed HTML; the worst case is an empty result.

use std::sync::LazyLock;

use postsmith_shared::{ListingSelectorsConfig, PostsmithError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

/// Elements whose text never counts as content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Elements that start a new line in extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "aside", "li", "ul", "ol",
    "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "tr", "table", "br", "hr",
    "figure", "figcaption", "dd", "dt",
];

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));

// ---------------------------------------------------------------------------
// Selector chains
// ---------------------------------------------------------------------------

/// Ordered selector alternatives; the first one yielding non-empty text wins.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    selectors: Vec<Selector>,
}

impl SelectorChain {
    /// Compile selectors in order. Invalid selectors are logged and skipped.
    pub fn parse<S: AsRef<str>>(sources: &[S]) -> Self {
        let selectors = sources
            .iter()
            .filter_map(|src| match Selector::parse(src.as_ref()) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    warn!(selector = src.as_ref(), error = %e, "skipping invalid selector");
                    None
                }
            })
            .collect();
        Self { selectors }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// First element under `scope` with non-empty inline text, probing
    /// selectors in order.
    pub fn first_match<'a>(&self, scope: ElementRef<'a>) -> Option<(ElementRef<'a>, String)> {
        self.selectors.iter().find_map(|sel| {
            scope.select(sel).find_map(|el| {
                let text = inline_text(el);
                (!text.is_empty()).then_some((el, text))
            })
        })
    }

    /// Like [`Self::first_match`] but returns block-structured text.
    fn first_block_text(&self, doc: &Html) -> Option<String> {
        self.selectors.iter().find_map(|sel| {
            doc.select(sel).find_map(|el| {
                let text = block_text(el);
                (!text.is_empty()).then_some(text)
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Listing mode
// ---------------------------------------------------------------------------

/// Fields extracted from one article container on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    /// Absolute when a page URL was supplied, otherwise as found in `href`.
    pub link: String,
    /// Raw display date (may be empty).
    pub date: String,
    /// Raw excerpt (may be empty).
    pub excerpt: String,
}

/// Listing-mode extractor compiled from [`ListingSelectorsConfig`].
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    container: Selector,
    title_link: SelectorChain,
    date: SelectorChain,
    excerpt: SelectorChain,
}

impl ListingExtractor {
    pub fn new(config: &ListingSelectorsConfig) -> Result<Self> {
        let container = Selector::parse(&config.container).map_err(|e| {
            PostsmithError::parse(format!(
                "invalid container selector '{}': {e}",
                config.container
            ))
        })?;

        let title_link = SelectorChain::parse(&config.title_link);
        if title_link.is_empty() {
            return Err(PostsmithError::parse("no valid title/link selectors configured"));
        }

        Ok(Self {
            container,
            title_link,
            date: SelectorChain::parse(&config.date),
            excerpt: SelectorChain::parse(&config.excerpt),
        })
    }

    /// Extract entries in document order. Containers without a title or a
    /// link are dropped.
    pub fn extract(&self, html: &str, page_url: Option<&Url>) -> Vec<ListingEntry> {
        let doc = Html::parse_document(html);

        doc.select(&self.container)
            .filter_map(|container| self.extract_one(container, page_url))
            .collect()
    }

    fn extract_one(&self, container: ElementRef<'_>, page_url: Option<&Url>) -> Option<ListingEntry> {
        let (anchor, title) = self.title_link.first_match(container)?;

        let href = anchor.value().attr("href").map(str::trim).unwrap_or("");
        if href.is_empty() {
            return None;
        }
        let link = match page_url {
            Some(base) => base.join(href).ok()?.to_string(),
            None => href.to_string(),
        };

        let date = self
            .date
            .first_match(container)
            .map(|(_, text)| text)
            .unwrap_or_default();
        let excerpt = self
            .excerpt
            .first_match(container)
            .map(|(_, text)| text)
            .unwrap_or_default();

        Some(ListingEntry {
            title,
            link,
            date,
            excerpt,
        })
    }
}

// ---------------------------------------------------------------------------
// Body mode
// ---------------------------------------------------------------------------

/// Body-mode extractor: first matching content container, else `<body>`.
#[derive(Debug, Clone)]
pub struct BodyExtractor {
    containers: SelectorChain,
    max_chars: usize,
}

impl BodyExtractor {
    pub fn new<S: AsRef<str>>(container_selectors: &[S], max_chars: usize) -> Self {
        Self {
            containers: SelectorChain::parse(container_selectors),
            max_chars,
        }
    }

    /// Plain text of the page's main content, at most `max_chars` characters.
    /// Returns an empty string when nothing usable is found.
    pub fn extract(&self, html: &str) -> String {
        let doc = Html::parse_document(html);

        let text = self
            .containers
            .first_block_text(&doc)
            .or_else(|| doc.select(&BODY).next().map(block_text))
            .unwrap_or_default();

        truncate_chars(&text, self.max_chars)
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Text of an element on a single line with whitespace collapsed.
fn inline_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an element with block boundaries kept as line breaks, skipping
/// script/style content.
fn block_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();

    for node in el.descendants() {
        if let Some(element) = node.value().as_element() {
            if BLOCK_ELEMENTS.contains(&element.name()) {
                raw.push('\n');
            }
            continue;
        }

        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !skipped {
            raw.push_str(text);
        }
    }

    clean_text(&raw)
}

/// Collapse horizontal whitespace, trim lines, and drop blank lines.
fn clean_text(raw: &str) -> String {
    let collapsed = HORIZONTAL_WS.replace_all(raw, " ");
    let trimmed: String = collapsed
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_LINES.replace_all(&trimmed, "\n").trim().to_string()
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
