//! The enrichment pipeline.
//!
//! One run processes one article:
//!
//! `FETCH_TARGET -> DISCOVER_COMPETITORS -> FETCH_COMPETITORS -> REWRITE -> PUBLISH -> DONE`
//!
//! An empty store stops before discovery. Zero usable competitors still
//! proceeds to rewrite. A failed rewrite stops before publishing and writes
//! nothing.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use postsmith_crawler::{CompetitorFetcher, CompetitorPage};
use postsmith_discovery::CompetitorDiscovery;
use postsmith_shared::{AppConfig, Article, FetchConfig, Result, SelectionPolicy};
use postsmith_storage::ArticleStore;

use crate::publish::Publisher;
use crate::rewrite::{RewriteEngine, RewriteRequest};

// ---------------------------------------------------------------------------
// Stages and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchTarget,
    DiscoverCompetitors,
    FetchCompetitors,
    Rewrite,
    Publish,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FetchTarget => "Selecting article",
            Self::DiscoverCompetitors => "Discovering competitors",
            Self::FetchCompetitors => "Fetching competitor pages",
            Self::Rewrite => "Rewriting",
            Self::Publish => "Publishing",
            Self::Done => "Done",
        };
        f.write_str(label)
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The store had nothing eligible to rewrite.
    NoArticles,
    /// Every model failed; nothing was written.
    NoRewrite { article_id: i64, title: String },
    /// The rewrite was stored (or an earlier copy already existed).
    Published {
        original_id: i64,
        article: Article,
        inserted: bool,
        model: String,
        competitor_urls: Vec<String>,
    },
}

/// Summary of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage.
    fn stage(&self, stage: Stage);
    /// Called after competitor fetching with discovered and usable counts.
    fn competitors(&self, discovered: usize, usable: usize);
    /// Called when the run completes.
    fn done(&self, report: &PipelineReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn competitors(&self, _discovered: usize, _usable: usize) {}
    fn done(&self, _report: &PipelineReport) {}
}

// ---------------------------------------------------------------------------
// Target selection
// ---------------------------------------------------------------------------

/// Pick the article to rewrite from `articles` (in storage order).
///
/// `optimized_link` maps an original id to the link its optimized copy
/// would have.
pub fn select_target<'a>(
    articles: &'a [Article],
    policy: SelectionPolicy,
    optimized_link: impl Fn(i64) -> String,
) -> Option<&'a Article> {
    match policy {
        SelectionPolicy::First => articles.first(),
        SelectionPolicy::OldestUnoptimized => {
            let links: HashSet<&str> = articles.iter().map(|a| a.link.as_str()).collect();
            articles
                .iter()
                .rev()
                .filter(|a| !a.is_optimized())
                .find(|a| !links.contains(optimized_link(a.id).as_str()))
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    store: Arc<dyn ArticleStore>,
    discovery: CompetitorDiscovery,
    fetcher: CompetitorFetcher,
    engine: RewriteEngine,
    publisher: Publisher,
    selection: SelectionPolicy,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        discovery: CompetitorDiscovery,
        fetcher: CompetitorFetcher,
        engine: RewriteEngine,
        publisher: Publisher,
        selection: SelectionPolicy,
    ) -> Self {
        Self {
            store,
            discovery,
            fetcher,
            engine,
            publisher,
            selection,
        }
    }

    /// Wire up every stage from configuration.
    pub fn from_config(config: &AppConfig, store: Arc<dyn ArticleStore>) -> Result<Self> {
        let engine = RewriteEngine::from_config(&config.rewrite)?;
        let discovery = CompetitorDiscovery::from_config(config)?;
        let fetcher = CompetitorFetcher::new(&FetchConfig::from(config))?;
        let publisher = Publisher::new(Arc::clone(&store), config.source.origin()?);

        Ok(Self::new(
            store,
            discovery,
            fetcher,
            engine,
            publisher,
            config.rewrite.selection,
        ))
    }

    /// Run the pipeline once.
    ///
    /// Storage failures are errors. Search, fetch, and generation failures
    /// are not: they shrink the competitor set or end in
    /// [`PipelineOutcome::NoRewrite`].
    #[instrument(skip_all, fields(selection = ?self.selection))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<PipelineReport> {
        let start = Instant::now();
        let outcome = self.run_stages(progress).await?;

        progress.stage(Stage::Done);
        let report = PipelineReport {
            outcome,
            elapsed: start.elapsed(),
        };
        progress.done(&report);
        Ok(report)
    }

    async fn run_stages(&self, progress: &dyn ProgressReporter) -> Result<PipelineOutcome> {
        // --- FETCH_TARGET ---
        progress.stage(Stage::FetchTarget);
        let articles = self.store.list_all().await?;
        let Some(target) = select_target(&articles, self.selection, |id| {
            self.publisher.optimized_link(id)
        }) else {
            info!(total = articles.len(), "no articles to optimize");
            return Ok(PipelineOutcome::NoArticles);
        };
        info!(id = target.id, title = %target.title, "processing article");

        // --- DISCOVER_COMPETITORS ---
        progress.stage(Stage::DiscoverCompetitors);
        let urls = self.discovery.discover(&target.title).await;

        // --- FETCH_COMPETITORS ---
        progress.stage(Stage::FetchCompetitors);
        let pages = self.fetcher.fetch_all(&urls).await;
        progress.competitors(urls.len(), pages.len());
        if pages.is_empty() {
            warn!(discovered = urls.len(), "no usable competitor texts, rewriting without them");
        }

        // --- REWRITE ---
        progress.stage(Stage::Rewrite);
        let (competitor_texts, competitor_urls): (Vec<String>, Vec<String>) = pages
            .into_iter()
            .map(|CompetitorPage { url, text }| (text, url))
            .unzip();
        let request = RewriteRequest {
            original_title: target.title.clone(),
            original_excerpt: target.excerpt.clone(),
            competitor_texts,
            competitor_urls,
        };

        let Some(rewritten) = self.engine.rewrite(&request).await else {
            warn!(id = target.id, "no model produced a rewrite, nothing published");
            return Ok(PipelineOutcome::NoRewrite {
                article_id: target.id,
                title: target.title.clone(),
            });
        };

        // --- PUBLISH ---
        progress.stage(Stage::Publish);
        let published = self.publisher.publish(&rewritten.markdown, target.id).await?;

        Ok(PipelineOutcome::Published {
            original_id: target.id,
            article: published.article,
            inserted: published.inserted,
            model: rewritten.model,
            competitor_urls: request.competitor_urls,
        })
    }
}
