//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use postsmith_core::{
    GeminiGenerator, Pipeline, PipelineOutcome, PipelineReport, ProgressReporter, SilentProgress,
    Stage, trigger_crawl, trigger_pipeline,
};
use postsmith_crawler::SourceCrawler;
use postsmith_shared::{
    AppConfig, Article, CrawlConfig, ProviderKind, init_config, load_config, load_config_from,
};
use postsmith_storage::{ArticleStore, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Postsmith: enrich a blog corpus with competitor-informed rewrites.
#[derive(Parser)]
#[command(
    name = "postsmith",
    version,
    about = "Crawl a blog archive and publish AI-rewritten versions of its articles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.postsmith/postsmith.toml.
    #[arg(long, global = true, env = "POSTSMITH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl the oldest articles from the source archive into storage.
    Crawl,

    /// Rewrite one article using competitor pages and publish the result.
    Optimize,

    /// List stored articles, newest first.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one stored article.
    Show {
        /// Article id.
        id: i64,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// List Gemini models that support text generation.
    Models,

    /// Run a trigger and print its outcome as JSON.
    Trigger {
        #[command(subcommand)]
        action: TriggerAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Trigger subcommands.
#[derive(Subcommand)]
pub(crate) enum TriggerAction {
    /// Run the enrichment pipeline once.
    Pipeline,
    /// Run the source crawl once.
    Crawl,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

const CRATE_TARGETS: &[&str] = &[
    "postsmith",
    "postsmith_core",
    "postsmith_crawler",
    "postsmith_discovery",
    "postsmith_shared",
    "postsmith_storage",
];

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = CRATE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config {
        action: ConfigAction::Init,
    } = cli.command
    {
        return cmd_config_init();
    }

    let config = resolve_config(cli.config.as_ref())?;
    match cli.command {
        Command::Crawl => cmd_crawl(&config).await,
        Command::Optimize => cmd_optimize(&config).await,
        Command::List { json } => cmd_list(&config, json).await,
        Command::Show { id, json } => cmd_show(&config, id, json).await,
        Command::Models => cmd_models(&config).await,
        Command::Trigger { action } => cmd_trigger(&config, action).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

async fn open_store(config: &AppConfig) -> Result<Arc<Storage>> {
    let path = config.storage.resolved_path()?;
    info!(path = %path.display(), "opening article store");
    Ok(Arc::new(Storage::open(&path).await?))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_crawl(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let crawler = SourceCrawler::new(CrawlConfig::from(config))?;

    let result = crawler.ingest(store.as_ref()).await?;

    println!();
    for outcome in &result.outcomes {
        let status = if outcome.inserted { "new" } else { "exists" };
        println!("  [{status:>6}] #{:<4} {}", outcome.id, outcome.title);
    }
    println!();
    println!("  Inserted:     {}", result.inserted_count());
    println!("  Existing:     {}", result.existing_count());
    println!(
        "  Pages:        {} fetched, {} failed",
        result.pages_fetched, result.pages_failed
    );
    println!("  Time:         {:.1}s", result.duration.as_secs_f64());
    for (what, err) in &result.errors {
        println!("  Error:        {what}: {err}");
    }
    println!();

    Ok(())
}

async fn cmd_optimize(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let pipeline = Pipeline::from_config(config, store)?;

    let reporter = CliProgress::new();
    let report = pipeline.run(&reporter).await?;

    println!();
    match &report.outcome {
        PipelineOutcome::NoArticles => {
            println!("  No articles found to optimize. Run `postsmith crawl` first.");
        }
        PipelineOutcome::NoRewrite { article_id, title } => {
            println!("  All models failed for #{article_id} \"{title}\". Nothing was published.");
        }
        PipelineOutcome::Published {
            original_id,
            article,
            inserted,
            model,
            competitor_urls,
        } => {
            if *inserted {
                println!("  Optimized article published!");
            } else {
                println!("  An optimized copy already existed; kept the original copy.");
            }
            println!("  Original:     #{original_id}");
            println!("  Article:      #{} {}", article.id, article.title);
            println!("  Link:         {}", article.link);
            println!("  Model:        {model}");
            if competitor_urls.is_empty() {
                println!("  Competitors:  none");
            }
            for url in competitor_urls {
                println!("  Competitor:   {url}");
            }
        }
    }
    println!("  Time:         {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_list(config: &AppConfig, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let articles = store.list_all().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&articles)?);
        return Ok(());
    }

    if articles.is_empty() {
        println!("No articles stored.");
        return Ok(());
    }

    for article in &articles {
        let tag = if article.is_optimized() { " [optimized]" } else { "" };
        println!(
            "#{:<4} {:<10} {}{tag}",
            article.id, article.date, article.title
        );
    }
    Ok(())
}

async fn cmd_show(config: &AppConfig, id: i64, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let article: Article = store
        .get_one(id)
        .await?
        .ok_or_else(|| eyre!("no article with id {id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&article)?);
        return Ok(());
    }

    println!("Title:      {}", article.title);
    println!("Link:       {}", article.link);
    println!("Date:       {}", article.date);
    println!("Scraped:    {}", article.scraped_at.to_rfc3339());
    println!("Optimized:  {}", if article.is_optimized() { "yes" } else { "no" });
    println!();
    println!("{}", article.excerpt);
    Ok(())
}

async fn cmd_models(config: &AppConfig) -> Result<()> {
    let key = config.rewrite.api_key(ProviderKind::Gemini).ok_or_else(|| {
        eyre!(
            "no Gemini API key found. Set {}.",
            config.rewrite.gemini_api_key_env
        )
    })?;

    let models = GeminiGenerator::new(key)?.list_models().await?;
    println!("Available models:");
    for model in &models {
        println!(
            "- {} ({})",
            model.id(),
            model.supported_generation_methods.join(", ")
        );
    }
    Ok(())
}

async fn cmd_trigger(config: &AppConfig, action: TriggerAction) -> Result<()> {
    let outcome = match action {
        TriggerAction::Pipeline => trigger_pipeline(config, &SilentProgress).await,
        TriggerAction::Crawl => trigger_crawl(config).await,
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if outcome.success {
        Ok(())
    } else {
        Err(eyre!("trigger failed: {}", outcome.message))
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        self.spinner.set_message(stage.to_string());
    }

    fn competitors(&self, discovered: usize, usable: usize) {
        self.spinner
            .println(format!("  Competitors: {usable} usable of {discovered} found"));
    }

    fn done(&self, _report: &PipelineReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["postsmith", "list", "--json", "-vv", "--config", "/tmp/p.toml"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(cli.command, Command::List { json: true }));
    }

    #[test]
    fn parses_show_and_trigger() {
        let cli = Cli::try_parse_from(["postsmith", "show", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Show { id: 7, json: false }));

        let cli = Cli::try_parse_from(["postsmith", "trigger", "crawl"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Trigger {
                action: TriggerAction::Crawl
            }
        ));
    }
}
