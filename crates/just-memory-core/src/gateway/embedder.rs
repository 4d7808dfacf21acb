//! Local embedding generation via fastembed, feature-gated behind `embeddings`.
//!
//! Mirrors the lazy `OnceLock<Result<Mutex<TextEmbedding>, String>>` pattern:
//! model init happens once, on first real use, and a failed init is cached
//! so subsequent calls don't retry a download that already failed.

/// Prefix prepended to query text before embedding — nomic-embed-text-v1.5
/// was trained with asymmetric "query: "/"passage: " instructions.
pub const EMBEDDING_PREFIX_QUERY: &str = "query: ";

#[cfg(feature = "embeddings")]
mod backend {
    use crate::config::EmbeddingSize;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Mutex, OnceLock};

    const MAX_TEXT_LENGTH: usize = 8192;
    const BATCH_SIZE: usize = 32;

    // Keyed by the single `EmbeddingSize` the process was configured with —
    // `Config::embedding_size` is fixed for the process lifetime (the
    // dimension is stamped into the database at first open), so one model
    // is ever loaded.
    static MODEL: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

    fn fastembed_model(size: EmbeddingSize) -> EmbeddingModel {
        match size {
            EmbeddingSize::Small => EmbeddingModel::BGESmallENV15,
            EmbeddingSize::Large => EmbeddingModel::BGELargeENV15,
        }
    }

    fn cache_dir() -> std::path::PathBuf {
        if let Ok(path) = std::env::var("JUST_MEMORY_FASTEMBED_CACHE_PATH") {
            return std::path::PathBuf::from(path);
        }
        if let Some(dirs) = directories::ProjectDirs::from("dev", "just-memory", "core") {
            return dirs.cache_dir().join("fastembed");
        }
        std::path::PathBuf::from(".fastembed_cache")
    }

    fn model(size: EmbeddingSize) -> Result<std::sync::MutexGuard<'static, TextEmbedding>, String> {
        let result = MODEL.get_or_init(|| {
            let dir = cache_dir();
            if let Err(e) = std::fs::create_dir_all(&dir) {
                tracing::warn!("failed to create fastembed cache dir {dir:?}: {e}");
            }
            let options = InitOptions::new(fastembed_model(size)).with_cache_dir(dir);
            TextEmbedding::try_new(options).map(Mutex::new).map_err(|e| e.to_string())
        });
        match result {
            Ok(m) => m.lock().map_err(|e| format!("embedder lock poisoned: {e}")),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn dimensions(size: EmbeddingSize) -> usize {
        size.dimensions()
    }

    pub async fn embed_one(text: String, size: EmbeddingSize) -> Option<Vec<f32>> {
        tokio::task::spawn_blocking(move || {
            let truncated: String = text.chars().take(MAX_TEXT_LENGTH).collect();
            let mut model = model(size).map_err(|e| tracing::warn!("embedder unavailable: {e}")).ok()?;
            let mut out = model.embed(vec![truncated], None).ok()?;
            out.pop()
        })
        .await
        .ok()
        .flatten()
    }

    pub async fn embed_many(texts: Vec<String>, size: EmbeddingSize) -> Option<Vec<Vec<f32>>> {
        tokio::task::spawn_blocking(move || {
            let mut model = model(size).map_err(|e| tracing::warn!("embedder unavailable: {e}")).ok()?;
            let mut out = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(BATCH_SIZE) {
                let truncated: Vec<String> = chunk.iter().map(|t| t.chars().take(MAX_TEXT_LENGTH).collect()).collect();
                let embedded = model.embed(truncated, None).ok()?;
                out.extend(embedded);
            }
            Some(out)
        })
        .await
        .ok()
        .flatten()
    }
}

#[cfg(not(feature = "embeddings"))]
mod backend {
    use crate::config::EmbeddingSize;

    pub fn dimensions(size: EmbeddingSize) -> usize {
        size.dimensions()
    }

    pub async fn embed_one(_text: String, _size: EmbeddingSize) -> Option<Vec<f32>> {
        None
    }

    pub async fn embed_many(_texts: Vec<String>, _size: EmbeddingSize) -> Option<Vec<Vec<f32>>> {
        None
    }
}

pub use backend::{dimensions, embed_many, embed_one};

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}
