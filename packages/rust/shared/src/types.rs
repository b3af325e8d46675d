//! Core domain types for the article corpus.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Path segment that marks a record produced by the rewrite pipeline.
pub const OPTIMIZED_SEGMENT: &str = "/optimized/";

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// A stored blog article.
///
/// This is also the JSON shape handed to any presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Surrogate key assigned by storage.
    pub id: i64,
    /// Non-empty display title.
    pub title: String,
    /// Globally unique link; the natural dedup key.
    pub link: String,
    /// Publication date as a display string (ISO `YYYY-MM-DD` when known).
    pub date: String,
    /// Original excerpt, or the full rewritten body for optimized records.
    pub excerpt: String,
    /// When the record was inserted.
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Whether this record was produced by the rewrite pipeline.
    pub fn is_optimized(&self) -> bool {
        self.link.contains(OPTIMIZED_SEGMENT)
    }
}

/// An article that has not been written to storage yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub date: String,
    pub excerpt: String,
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Display formats seen on blog listings, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];

/// Normalize a scraped display date to ISO `YYYY-MM-DD`.
///
/// Unparseable input is returned trimmed but otherwise verbatim.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(link: &str) -> Article {
        Article {
            id: 1,
            title: "Chatbots for Clinics".into(),
            link: link.into(),
            date: "2023-03-03".into(),
            excerpt: "Short excerpt".into(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn optimized_flag_follows_link() {
        assert!(sample("https://beyondchats.com/optimized/4").is_optimized());
        assert!(!sample("https://beyondchats.com/blogs/chatbots-for-clinics/").is_optimized());
    }

    #[test]
    fn article_json_shape() {
        let json = serde_json::to_value(sample("https://x/a")).unwrap();
        for key in ["id", "title", "link", "date", "excerpt", "scraped_at"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn normalize_long_month() {
        assert_eq!(normalize_date("  March 3, 2023 "), "2023-03-03");
        assert_eq!(normalize_date("December 15, 2022"), "2022-12-15");
    }

    #[test]
    fn normalize_short_month_and_iso() {
        assert_eq!(normalize_date("Jan 9, 2024"), "2024-01-09");
        assert_eq!(normalize_date("2024-01-09"), "2024-01-09");
        assert_eq!(normalize_date("2024-01-09T10:00:00+02:00"), "2024-01-09");
    }

    #[test]
    fn normalize_keeps_unknown_formats() {
        assert_eq!(normalize_date("last week"), "last week");
        assert_eq!(normalize_date("   "), "");
    }
}
