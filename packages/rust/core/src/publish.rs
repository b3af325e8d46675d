//! Stores a rewritten article as a new corpus record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use postsmith_shared::{Article, NewArticle, OPTIMIZED_SEGMENT, PostsmithError, Result};
use postsmith_storage::ArticleStore;

/// Title used when the rewrite has no usable first line.
pub const FALLBACK_TITLE: &str = "Optimized Article";

/// Derive a title from Markdown: the first heading line, else the first
/// non-blank line, with leading `#` marks stripped.
pub fn derive_title(markdown: &str) -> String {
    let line = markdown
        .lines()
        .find(|l| l.trim_start().starts_with('#'))
        .or_else(|| markdown.lines().find(|l| !l.trim().is_empty()));

    let title = line
        .map(|l| l.trim().trim_start_matches('#').trim())
        .unwrap_or_default();

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// Result of a publish call.
#[derive(Debug, Clone)]
pub struct Published {
    pub article: Article,
    /// `false` when an optimized copy for this original already existed.
    pub inserted: bool,
}

pub struct Publisher {
    store: Arc<dyn ArticleStore>,
    /// Scheme and host of the source site, without a trailing slash.
    origin: String,
}

impl Publisher {
    pub fn new(store: Arc<dyn ArticleStore>, origin: impl Into<String>) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        Self { store, origin }
    }

    /// Link of the optimized copy of `original_id`.
    pub fn optimized_link(&self, original_id: i64) -> String {
        format!("{}{OPTIMIZED_SEGMENT}{original_id}", self.origin)
    }

    /// Build the record for a rewrite without storing it.
    pub fn prepare(&self, markdown: &str, original_id: i64) -> NewArticle {
        NewArticle {
            title: derive_title(markdown),
            link: self.optimized_link(original_id),
            date: Utc::now().format("%Y-%m-%d").to_string(),
            excerpt: markdown.to_string(),
        }
    }

    /// Store the rewrite. Publishing the same original twice keeps the
    /// first record.
    #[instrument(skip_all, fields(original_id = original_id))]
    pub async fn publish(&self, markdown: &str, original_id: i64) -> Result<Published> {
        let record = self.prepare(markdown, original_id);
        let outcome = self.store.insert_if_absent(&record).await?;

        if outcome.inserted {
            info!(id = outcome.id, link = %record.link, "optimized article published");
        } else {
            info!(id = outcome.id, link = %record.link, "optimized article already exists");
        }

        let article = self.store.get_one(outcome.id).await?.ok_or_else(|| {
            PostsmithError::Storage(format!("article {} vanished after insert", outcome.id))
        })?;

        Ok(Published {
            article,
            inserted: outcome.inserted,
        })
    }
}
