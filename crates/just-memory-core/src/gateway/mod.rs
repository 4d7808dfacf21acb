//! Model access behind typed, timed-out calls.
//!
//! The embedder is pre-warmed once at startup; NLI and summarization models
//! are loaded lazily on first use, each behind its own `OnceLock`. Every call
//! is wrapped in `tokio::time::timeout` against a configurable budget so a
//! slow or absent model degrades a caller to `NotAvailable`/`Timeout` instead
//! of blocking it.

mod embedder;
mod nli;
mod summarizer;

pub use embedder::{cosine_similarity, EMBEDDING_PREFIX_QUERY};
pub use nli::{Nli, NliLabel};
pub use summarizer::Summarizer;

use std::time::Duration;

use crate::config::{Config, EmbeddingSize};

/// Outcome of a gated model call. Distinct from [`crate::error::Result`]:
/// a model being absent or slow is routine, not an error condition, so
/// callers pattern-match on this instead of propagating with `?`.
#[derive(Debug, Clone)]
pub enum GatewayResult<T> {
    Ready(T),
    NotAvailable,
    Timeout,
}

impl<T> GatewayResult<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            GatewayResult::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, GatewayResult::Ready(_))
    }
}

pub const EMBEDDER_BUDGET: Duration = Duration::from_secs(15);
pub const NLI_BUDGET: Duration = Duration::from_secs(10);
pub const SUMMARIZER_BUDGET: Duration = Duration::from_secs(30);

/// Single entry point for every model-backed capability. Holds no state of
/// its own beyond the per-kind lazy singletons in the `embedder`/`nli`/
/// `summarizer` submodules — cloning a `ModelGateway` is cheap.
#[derive(Debug, Clone, Default)]
pub struct ModelGateway {
    claude_desktop_mode: bool,
    embedding_size: EmbeddingSize,
}

impl ModelGateway {
    pub fn new(config: &Config) -> Self {
        Self { claude_desktop_mode: config.claude_desktop_mode, embedding_size: config.embedding_size }
    }

    fn budget(&self, default: Duration) -> Duration {
        if self.claude_desktop_mode {
            default.min(Duration::from_secs(5))
        } else {
            default
        }
    }

    /// Warm the embedder at process startup so the first `embed()` call from
    /// a user request doesn't pay model-load latency.
    pub async fn warm_embedder(&self) {
        let budget = self.budget(EMBEDDER_BUDGET);
        let _ = run_gated(budget, embedder::embed_one(" ".to_string(), self.embedding_size)).await;
    }

    pub async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>> {
        run_gated(self.budget(EMBEDDER_BUDGET), embedder::embed_one(text.to_string(), self.embedding_size)).await
    }

    pub async fn embed_query(&self, text: &str) -> GatewayResult<Vec<f32>> {
        self.embed(&format!("{EMBEDDING_PREFIX_QUERY}{text}")).await
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> GatewayResult<Vec<Vec<f32>>> {
        run_gated(self.budget(EMBEDDER_BUDGET), embedder::embed_many(texts, self.embedding_size)).await
    }

    pub async fn embedding_dimensions(&self) -> usize {
        embedder::dimensions(self.embedding_size)
    }

    pub async fn nli_check(&self, premise: &str, hypothesis: &str) -> GatewayResult<(NliLabel, f32)> {
        run_gated(
            self.budget(NLI_BUDGET),
            nli::classify(premise.to_string(), hypothesis.to_string(), self.embedding_size),
        )
        .await
    }

    pub async fn summarize(&self, text: &str, max_sentences: usize) -> GatewayResult<String> {
        run_gated(self.budget(SUMMARIZER_BUDGET), summarizer::summarize(text.to_string(), max_sentences)).await
    }
}

async fn run_gated<T, F>(budget: Duration, fut: F) -> GatewayResult<T>
where
    F: std::future::Future<Output = Option<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(Some(v)) => GatewayResult::Ready(v),
        Ok(None) => GatewayResult::NotAvailable,
        Err(_) => GatewayResult::Timeout,
    }
}
