//! Enrichment pipeline for the Postsmith article corpus.
//!
//! This crate ties together the source crawler, competitor discovery and
//! fetching, model-fallback rewriting, and publication into a single run
//! ([`Pipeline::run`]), plus the trigger entry points in [`trigger`].

pub mod pipeline;
pub mod providers;
pub mod publish;
pub mod rewrite;
pub mod trigger;

pub use pipeline::{
    Pipeline, PipelineOutcome, PipelineReport, ProgressReporter, SilentProgress, Stage,
    select_target,
};
pub use providers::{GeminiGenerator, GeminiModel, OpenRouterGenerator, TextGenerator};
pub use publish::{FALLBACK_TITLE, Published, Publisher, derive_title};
pub use rewrite::{NOT_AVAILABLE, RewriteEngine, RewriteRequest, Rewritten, build_prompt};
pub use trigger::{
    TriggerOutcome, run_crawl_now, run_pipeline_now, trigger_crawl, trigger_pipeline,
};
