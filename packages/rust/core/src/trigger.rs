//! Entry points for an outer transport layer.
//!
//! Both triggers report a success flag and a human-readable message and
//! never return an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use postsmith_crawler::SourceCrawler;
use postsmith_shared::{AppConfig, CrawlConfig, Result};
use postsmith_storage::{ArticleStore, Storage};

use crate::pipeline::{Pipeline, PipelineOutcome, ProgressReporter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerOutcome {
    pub success: bool,
    pub message: String,
}

impl TriggerOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Run the enrichment pipeline once.
///
/// Benign exits (empty store, no rewrite) count as success.
pub async fn run_pipeline_now(pipeline: &Pipeline, progress: &dyn ProgressReporter) -> TriggerOutcome {
    match pipeline.run(progress).await {
        Ok(report) => match report.outcome {
            PipelineOutcome::NoArticles => TriggerOutcome::ok("No articles found to optimize."),
            PipelineOutcome::NoRewrite { title, .. } => TriggerOutcome::ok(format!(
                "All models failed for \"{title}\"; nothing was published."
            )),
            PipelineOutcome::Published {
                article, inserted, ..
            } => {
                let verb = if inserted { "Published" } else { "Already published" };
                TriggerOutcome::ok(format!(
                    "{verb} optimized article #{}: {}",
                    article.id, article.title
                ))
            }
        },
        Err(e) => {
            error!(error = %e, "pipeline failed");
            TriggerOutcome::failed(e.to_string())
        }
    }
}

/// Crawl the source archive once and store new articles.
pub async fn run_crawl_now(crawler: &SourceCrawler, store: &dyn ArticleStore) -> TriggerOutcome {
    match crawler.ingest(store).await {
        Ok(result) => TriggerOutcome::ok(format!(
            "Crawled {} articles: {} new, {} already stored.",
            result.outcomes.len(),
            result.inserted_count(),
            result.existing_count()
        )),
        Err(e) => {
            error!(error = %e, "crawl failed");
            TriggerOutcome::failed(e.to_string())
        }
    }
}

async fn open_storage(config: &AppConfig) -> Result<Arc<Storage>> {
    let path = config.storage.resolved_path()?;
    info!(path = %path.display(), "opening article store");
    Ok(Arc::new(Storage::open(&path).await?))
}

/// Open the configured store, build the pipeline and run it once.
///
/// Setup failures are reported in the outcome like run failures.
pub async fn trigger_pipeline(
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> TriggerOutcome {
    let pipeline = match open_storage(config).await {
        Ok(store) => Pipeline::from_config(config, store),
        Err(e) => Err(e),
    };
    match pipeline {
        Ok(pipeline) => run_pipeline_now(&pipeline, progress).await,
        Err(e) => {
            error!(error = %e, "pipeline setup failed");
            TriggerOutcome::failed(e.to_string())
        }
    }
}

/// Build the crawler, open the configured store and crawl once.
pub async fn trigger_crawl(config: &AppConfig) -> TriggerOutcome {
    let setup = match SourceCrawler::new(CrawlConfig::from(config)) {
        Ok(crawler) => open_storage(config).await.map(|store| (crawler, store)),
        Err(e) => Err(e),
    };
    match setup {
        Ok((crawler, store)) => run_crawl_now(&crawler, store.as_ref()).await,
        Err(e) => {
            error!(error = %e, "crawl setup failed");
            TriggerOutcome::failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use postsmith_crawler::CompetitorFetcher;
    use postsmith_discovery::{CompetitorDiscovery, FixedOracle};
    use postsmith_shared::{Article, FetchConfig, NewArticle, PostsmithError, SelectionPolicy};
    use postsmith_storage::{InsertOutcome, MemoryStore};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::pipeline::SilentProgress;
    use crate::publish::Publisher;
    use crate::rewrite::tests::{ScriptedGenerator, engine_with};

    /// A store whose reads always fail.
    struct BrokenStore;

    #[async_trait]
    impl ArticleStore for BrokenStore {
        async fn insert_if_absent(&self, _article: &NewArticle) -> Result<InsertOutcome> {
            Err(PostsmithError::Storage("disk full".into()))
        }
        async fn list_all(&self) -> Result<Vec<Article>> {
            Err(PostsmithError::Storage("database is locked".into()))
        }
        async fn get_one(&self, _id: i64) -> Result<Option<Article>> {
            Err(PostsmithError::Storage("database is locked".into()))
        }
    }

    fn pipeline_over(store: Arc<dyn ArticleStore>, generator: &Arc<ScriptedGenerator>) -> Pipeline {
        Pipeline::new(
            Arc::clone(&store),
            CompetitorDiscovery::new(Box::new(FixedOracle::new(vec![])), "beyondchats.com", 2),
            CompetitorFetcher::new(&FetchConfig::default()).unwrap(),
            engine_with(generator, &["m1"]),
            Publisher::new(store, "https://beyondchats.com"),
            SelectionPolicy::First,
        )
    }

    #[tokio::test]
    async fn pipeline_trigger_reports_publish() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_if_absent(&NewArticle {
                title: "Original".into(),
                link: "https://beyondchats.com/blogs/original/".into(),
                date: "2023-01-01".into(),
                excerpt: "Text".into(),
            })
            .await
            .unwrap();
        let generator = ScriptedGenerator::new(vec![Ok("# Improved".into())]);

        let outcome = run_pipeline_now(&pipeline_over(store, &generator), &SilentProgress).await;
        assert!(outcome.success);
        assert!(outcome.message.contains("Improved"), "{}", outcome.message);
    }

    #[tokio::test]
    async fn pipeline_trigger_empty_store_is_success() {
        let generator = ScriptedGenerator::new(vec![]);
        let store = Arc::new(MemoryStore::new());
        let outcome = run_pipeline_now(&pipeline_over(store, &generator), &SilentProgress).await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn pipeline_trigger_storage_error_is_failure() {
        let generator = ScriptedGenerator::new(vec![]);
        let outcome =
            run_pipeline_now(&pipeline_over(Arc::new(BrokenStore), &generator), &SilentProgress)
                .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("database is locked"));
    }

    #[tokio::test]
    async fn crawl_trigger_reports_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs/page/15/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<article><h2><a href="/blogs/a/">A</a></h2></article>"#,
            ))
            .mount(&server)
            .await;

        let crawler = SourceCrawler::new(CrawlConfig {
            base_url: format!("{}/blogs/", server.uri()),
            pages: vec![15],
            limit: 5,
            rate_limit_ms: 0,
            timeout_secs: 5,
            selectors: Default::default(),
        })
        .unwrap();
        let store = MemoryStore::new();

        let first = run_crawl_now(&crawler, &store).await;
        assert!(first.success);
        assert_eq!(first.message, "Crawled 1 articles: 1 new, 0 already stored.");

        let second = run_crawl_now(&crawler, &store).await;
        assert_eq!(second.message, "Crawled 1 articles: 0 new, 1 already stored.");
    }

    #[tokio::test]
    async fn crawl_trigger_storage_error_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<article><h2><a href="/blogs/a/">A</a></h2></article>"#,
            ))
            .mount(&server)
            .await;

        let crawler = SourceCrawler::new(CrawlConfig {
            base_url: server.uri(),
            pages: vec![1],
            limit: 5,
            rate_limit_ms: 0,
            timeout_secs: 5,
            selectors: Default::default(),
        })
        .unwrap();

        let outcome = run_crawl_now(&crawler, &BrokenStore).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("disk full"));
    }

    /// A db path whose parent is a regular file, so the store cannot open.
    fn unopenable_db_path(tag: &str) -> PathBuf {
        let blocker = std::env::temp_dir().join(format!(
            "postsmith-trigger-{tag}-{}",
            std::process::id()
        ));
        std::fs::write(&blocker, b"not a directory").unwrap();
        blocker.join("nested").join("articles.db")
    }

    #[tokio::test]
    async fn pipeline_trigger_unopenable_store_is_failure() {
        let mut config = AppConfig::default();
        config.storage.db_path = unopenable_db_path("pipeline").to_string_lossy().into_owned();

        let outcome = trigger_pipeline(&config, &SilentProgress).await;
        assert!(!outcome.success);
        assert!(!outcome.message.is_empty());
    }

    #[tokio::test]
    async fn crawl_trigger_unopenable_store_is_failure() {
        let mut config = AppConfig::default();
        config.storage.db_path = unopenable_db_path("crawl").to_string_lossy().into_owned();

        let outcome = trigger_crawl(&config).await;
        assert!(!outcome.success);
        assert!(!outcome.message.is_empty());
    }

    #[tokio::test]
    async fn crawl_trigger_invalid_base_url_is_failure() {
        let mut config = AppConfig::default();
        config.source.base_url = "not a url".into();

        let outcome = trigger_crawl(&config).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("base_url"), "{}", outcome.message);
    }
}
