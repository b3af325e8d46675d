//! Application configuration for Postsmith.
//!
//! User config lives at `~/.postsmith/postsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PostsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "postsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".postsmith";

/// Env var holding a comma-separated list of competitor URLs that replaces
/// live search results.
pub const MOCK_SEARCH_ENV: &str = "MOCK_SEARCH_RESULTS";

// ---------------------------------------------------------------------------
// Config structs (matching postsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Source blog archive.
    #[serde(default)]
    pub source: SourceConfig,

    /// Competitor fetching.
    #[serde(default)]
    pub competitors: CompetitorsConfig,

    /// Web-search oracle.
    #[serde(default)]
    pub search: SearchConfig,

    /// Rewrite engine and model fallback list.
    #[serde(default)]
    pub rewrite: RewriteConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. A leading `~/` expands to the home dir.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Resolve `db_path`, expanding a leading `~/`.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match self.db_path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir().ok_or_else(|| {
                    PostsmithError::config("could not determine home directory")
                })?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.db_path)),
        }
    }
}

fn default_db_path() -> String {
    "~/.postsmith/articles.db".into()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Archive root; page N lives at `{base_url}page/{N}/`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// The last archive pages, where the oldest articles live.
    #[serde(default = "default_archive_pages")]
    pub archive_pages: Vec<u32>,

    /// How many of the oldest articles to ingest.
    #[serde(default = "default_oldest_count")]
    pub oldest_count: usize,

    /// Minimum ms between archive page requests.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Listing-mode selector alternatives.
    #[serde(default)]
    pub selectors: ListingSelectorsConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            archive_pages: default_archive_pages(),
            oldest_count: default_oldest_count(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_timeout_secs(),
            selectors: ListingSelectorsConfig::default(),
        }
    }
}

impl SourceConfig {
    fn parsed_base(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            PostsmithError::config(format!("invalid source.base_url '{}': {e}", self.base_url))
        })
    }

    /// Host of the source site; competitor results on this domain are discarded.
    pub fn domain(&self) -> Result<String> {
        let url = self.parsed_base()?;
        url.host_str()
            .map(|h| h.trim_start_matches("www.").to_string())
            .ok_or_else(|| PostsmithError::config(format!("source.base_url has no host: {url}")))
    }

    /// Scheme + host (+ port) of the source site, used to mint optimized links.
    pub fn origin(&self) -> Result<String> {
        let url = self.parsed_base()?;
        let host = url
            .host_str()
            .ok_or_else(|| PostsmithError::config(format!("source.base_url has no host: {url}")))?;
        match url.port() {
            Some(port) => Ok(format!("{}://{host}:{port}", url.scheme())),
            None => Ok(format!("{}://{host}", url.scheme())),
        }
    }
}

fn default_base_url() -> String {
    "https://beyondchats.com/blogs/".into()
}
fn default_archive_pages() -> Vec<u32> {
    vec![15, 14]
}
fn default_oldest_count() -> usize {
    5
}
fn default_rate_limit() -> u64 {
    200
}
fn default_timeout_secs() -> u64 {
    15
}

/// `[source.selectors]` section. Each list is probed in order; first non-empty match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectorsConfig {
    /// Repeated element wrapping one article on a listing page.
    #[serde(default = "default_container")]
    pub container: String,

    /// Anchor carrying both the title text and the link.
    #[serde(default = "default_title_link")]
    pub title_link: Vec<String>,

    #[serde(default = "default_date")]
    pub date: Vec<String>,

    #[serde(default = "default_excerpt")]
    pub excerpt: Vec<String>,
}

impl Default for ListingSelectorsConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            title_link: default_title_link(),
            date: default_date(),
            excerpt: default_excerpt(),
        }
    }
}

fn default_container() -> String {
    "article".into()
}
fn default_title_link() -> Vec<String> {
    vec![
        ".entry-title a".into(),
        ".ct-entry-title a".into(),
        "h2 a".into(),
    ]
}
fn default_date() -> Vec<String> {
    vec![
        ".ct-meta-element-date".into(),
        ".entry-date".into(),
        "time".into(),
    ]
}
fn default_excerpt() -> Vec<String> {
    vec![".entry-excerpt".into(), ".ct-entry-content".into()]
}

/// `[competitors]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorsConfig {
    /// Maximum competitor URLs kept from discovery.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Extracted text must be longer than this to be usable.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Extracted text is truncated to this many characters.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Per-URL timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Body-mode container selectors, probed in order before falling back to `<body>`.
    #[serde(default = "default_body_selectors")]
    pub body_selectors: Vec<String>,

    /// Operator-supplied URLs used instead of a live search when non-empty.
    #[serde(default)]
    pub fixed_urls: Vec<String>,
}

impl Default for CompetitorsConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            timeout_secs: default_timeout_secs(),
            body_selectors: default_body_selectors(),
            fixed_urls: Vec::new(),
        }
    }
}

impl CompetitorsConfig {
    /// Fixed URLs, with `MOCK_SEARCH_RESULTS` taking precedence over the file.
    pub fn effective_fixed_urls(&self) -> Vec<String> {
        match std::env::var(MOCK_SEARCH_ENV) {
            Ok(raw) if !raw.trim().is_empty() => split_url_list(&raw),
            _ => self.fixed_urls.clone(),
        }
    }
}

/// Split a comma-separated URL list, dropping blanks.
fn split_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn default_max_results() -> usize {
    2
}
fn default_min_chars() -> usize {
    200
}
fn default_max_chars() -> usize {
    10_000
}
fn default_body_selectors() -> Vec<String> {
    vec![
        "article".into(),
        "main".into(),
        ".post-content".into(),
        ".entry-content".into(),
        ".content".into(),
        ".entry".into(),
    ]
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the Serper API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Results requested per query (before domain filtering).
    #[serde(default = "default_num_results")]
    pub num_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            endpoint: default_search_endpoint(),
            num_results: default_num_results(),
        }
    }
}

impl SearchConfig {
    /// The Serper API key, if its env var is set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }
}

fn default_search_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_search_endpoint() -> String {
    "https://google.serper.dev/search".into()
}
fn default_num_results() -> u32 {
    10
}

/// Which text-generation backend serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenRouter,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::OpenRouter => f.write_str("openrouter"),
        }
    }
}

/// One `[[rewrite.models]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelEntry {
    fn gemini(model: &str) -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: model.into(),
        }
    }
}

/// How the pipeline picks the article to rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// The first record in storage's default ordering.
    #[default]
    First,
    /// The oldest source article that has no optimized copy yet.
    OldestUnoptimized,
}

/// `[rewrite]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Name of the env var holding the Gemini API key (never store the key itself).
    #[serde(default = "default_gemini_key_env")]
    pub gemini_api_key_env: String,

    /// Name of the env var holding the OpenRouter API key.
    #[serde(default = "default_openrouter_key_env")]
    pub openrouter_api_key_env: String,

    #[serde(default)]
    pub selection: SelectionPolicy,

    /// Ordered model preference list; the first model with non-empty output wins.
    #[serde(default = "default_models")]
    pub models: Vec<ModelEntry>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            gemini_api_key_env: default_gemini_key_env(),
            openrouter_api_key_env: default_openrouter_key_env(),
            selection: SelectionPolicy::default(),
            models: default_models(),
        }
    }
}

impl RewriteConfig {
    /// The API key for `provider`, if its env var is set and non-empty.
    pub fn api_key(&self, provider: ProviderKind) -> Option<String> {
        match provider {
            ProviderKind::Gemini => read_key(&self.gemini_api_key_env),
            ProviderKind::OpenRouter => read_key(&self.openrouter_api_key_env),
        }
    }

    /// Fail unless at least one configured model has a usable key.
    pub fn validate_keys(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(PostsmithError::config("rewrite.models is empty"));
        }
        if self.models.iter().any(|m| self.api_key(m.provider).is_some()) {
            return Ok(());
        }
        Err(PostsmithError::config(format!(
            "no API key found for any configured model. Set {} or {}.",
            self.gemini_api_key_env, self.openrouter_api_key_env
        )))
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_openrouter_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry::gemini("gemini-3-flash-preview"),
        ModelEntry::gemini("gemini-2.5-flash-preview-09-2025"),
        ModelEntry::gemini("gemini-2.0-flash"),
        ModelEntry::gemini("gemini-1.5-flash"),
    ]
}

fn read_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from AppConfig)
// ---------------------------------------------------------------------------

/// Runtime source-crawl configuration.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Archive root URL.
    pub base_url: String,
    /// Archive page numbers to read.
    pub pages: Vec<u32>,
    /// Maximum articles returned.
    pub limit: usize,
    /// Delay between page requests in ms.
    pub rate_limit_ms: u64,
    pub timeout_secs: u64,
    pub selectors: ListingSelectorsConfig,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.source.base_url.clone(),
            pages: config.source.archive_pages.clone(),
            limit: config.source.oldest_count,
            rate_limit_ms: config.source.rate_limit_ms,
            timeout_secs: config.source.timeout_secs,
            selectors: config.source.selectors.clone(),
        }
    }
}

/// Runtime competitor-fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Texts of this many characters or fewer are discarded.
    pub min_chars: usize,
    /// Texts are truncated to this many characters.
    pub max_chars: usize,
    pub body_selectors: Vec<String>,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.competitors.timeout_secs,
            min_chars: config.competitors.min_chars,
            max_chars: config.competitors.max_chars,
            body_selectors: config.competitors.body_selectors.clone(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.postsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PostsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.postsmith/postsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PostsmithError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PostsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PostsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PostsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PostsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
