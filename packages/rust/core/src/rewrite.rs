//! Prompt construction and model fallback.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use postsmith_shared::{PostsmithError, ProviderKind, Result, RewriteConfig};

use crate::providers::{GeminiGenerator, OpenRouterGenerator, TextGenerator};

/// Stands in for a missing competitor text or URL.
pub const NOT_AVAILABLE: &str = "N/A";

/// Everything the prompt is built from.
#[derive(Debug, Clone, Default)]
pub struct RewriteRequest {
    pub original_title: String,
    pub original_excerpt: String,
    /// Up to two competitor texts, in discovery order.
    pub competitor_texts: Vec<String>,
    /// URLs matching `competitor_texts`, cited as references.
    pub competitor_urls: Vec<String>,
}

/// A successful rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub markdown: String,
    /// Model that produced the text.
    pub model: String,
}

fn slot(items: &[String], index: usize) -> &str {
    items
        .get(index)
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(NOT_AVAILABLE)
}

/// Build the rewrite prompt. Missing competitors are rendered as
/// [`NOT_AVAILABLE`] so 0, 1, and 2 competitors share one template.
pub fn build_prompt(request: &RewriteRequest) -> String {
    let texts = &request.competitor_texts;
    let urls = &request.competitor_urls;

    format!(
        "I have an original blog article and two top-ranking competitor articles on the same topic.\n\
         \n\
         Original Article Title: {title}\n\
         Original Article Content: {excerpt}\n\
         \n\
         Competitor Article 1 Content: {c1}\n\
         Competitor Article 2 Content: {c2}\n\
         \n\
         Task:\n\
         1. Rewrite the original article to be more comprehensive, well-formatted, and similar in quality to the top-ranking articles.\n\
         2. Keep the core message but improve flow, structure (use headers), and depth.\n\
         3. At the end of the article, add a \"References\" section citing the following sources:\n   \
            - {u1}\n   \
            - {u2}\n\
         \n\
         Response Format:\n\
         Return ONLY the finalized article content (including title and references) in Markdown format.\n",
        title = request.original_title,
        excerpt = request.original_excerpt,
        c1 = slot(texts, 0),
        c2 = slot(texts, 1),
        u1 = slot(urls, 0),
        u2 = slot(urls, 1),
    )
}

// ---------------------------------------------------------------------------
// RewriteEngine
// ---------------------------------------------------------------------------

/// Tries each (generator, model) pair in order; the first non-empty output wins.
pub struct RewriteEngine {
    chain: Vec<(Arc<dyn TextGenerator>, String)>,
}

impl RewriteEngine {
    pub fn new(chain: Vec<(Arc<dyn TextGenerator>, String)>) -> Self {
        Self { chain }
    }

    /// Build the fallback chain from config. Models whose provider has no
    /// API key are left out.
    pub fn from_config(config: &RewriteConfig) -> Result<Self> {
        config.validate_keys()?;

        let mut gemini: Option<Arc<dyn TextGenerator>> = None;
        let mut openrouter: Option<Arc<dyn TextGenerator>> = None;
        let mut chain = Vec::with_capacity(config.models.len());

        for entry in &config.models {
            let Some(key) = config.api_key(entry.provider) else {
                warn!(model = %entry.model, provider = %entry.provider, "no API key, skipping model");
                continue;
            };

            let generator = match entry.provider {
                ProviderKind::Gemini => match &gemini {
                    Some(g) => Arc::clone(g),
                    None => {
                        let g: Arc<dyn TextGenerator> = Arc::new(GeminiGenerator::new(key)?);
                        gemini = Some(Arc::clone(&g));
                        g
                    }
                },
                ProviderKind::OpenRouter => match &openrouter {
                    Some(g) => Arc::clone(g),
                    None => {
                        let g: Arc<dyn TextGenerator> = Arc::new(OpenRouterGenerator::new(key)?);
                        openrouter = Some(Arc::clone(&g));
                        g
                    }
                },
            };
            chain.push((generator, entry.model.clone()));
        }

        if chain.is_empty() {
            return Err(PostsmithError::config("no usable rewrite models"));
        }
        Ok(Self { chain })
    }

    /// Model identifiers in preference order.
    pub fn models(&self) -> Vec<&str> {
        self.chain.iter().map(|(_, m)| m.as_str()).collect()
    }

    /// Generate a rewrite. Returns `None` when every model fails or
    /// returns blank output.
    #[instrument(skip_all, fields(title = %request.original_title, competitors = request.competitor_texts.len()))]
    pub async fn rewrite(&self, request: &RewriteRequest) -> Option<Rewritten> {
        let prompt = build_prompt(request);

        for (generator, model) in &self.chain {
            info!(model, provider = generator.provider(), "attempting generation");
            match generator.generate(model, &prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(model, chars = text.len(), "generation succeeded");
                    return Some(Rewritten {
                        markdown: text,
                        model: model.clone(),
                    });
                }
                Ok(_) => warn!(model, "empty output, trying next model"),
                Err(e) => warn!(model, error = %e, "generation failed, trying next model"),
            }
        }

        warn!(tried = self.chain.len(), "all models failed");
        None
    }
}
