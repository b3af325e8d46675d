//! Text-generation backends.
//!
//! Every backend implements [`TextGenerator`]: given a model identifier and
//! a prompt, return the generated text. Backends do not retry; model
//! fallback is the job of [`crate::rewrite::RewriteEngine`].

mod gemini;
mod openrouter;

use async_trait::async_trait;

use postsmith_shared::Result;

pub use gemini::{GeminiGenerator, GeminiModel};
pub use openrouter::OpenRouterGenerator;

/// A generative-text service addressed by model identifier.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;

    /// Backend name for logs.
    fn provider(&self) -> &'static str;
}
