//! Shared types, error model, and configuration for Postsmith.
//!
//! This crate is the foundation depended on by all other Postsmith crates.
//! It provides:
//! - [`PostsmithError`] — the unified error type
//! - Domain types ([`Article`], [`NewArticle`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompetitorsConfig, CrawlConfig, FetchConfig, ListingSelectorsConfig,
    MOCK_SEARCH_ENV, ModelEntry, ProviderKind, RewriteConfig, SearchConfig, SelectionPolicy,
    SourceConfig, StorageConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{PostsmithError, Result};
pub use types::{Article, NewArticle, OPTIMIZED_SEGMENT, normalize_date};
