//! Typed environment configuration.
//!
//! Parsed once at startup. There is no bespoke config-file format — every
//! knob is an environment variable, resolved against a `--data-dir`-style
//! default.

use std::path::PathBuf;

/// Embedding model size selector. The chosen dimension is stamped into the
/// database at first open and cannot change without a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingSize {
    #[default]
    Small,
    Large,
}

impl EmbeddingSize {
    pub fn dimensions(self) -> usize {
        match self {
            EmbeddingSize::Small => 384,
            EmbeddingSize::Large => 1024,
        }
    }

    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "large" => EmbeddingSize::Large,
            _ => EmbeddingSize::Small,
        }
    }
}

/// Vector backend selector: canonical exact scan, or an optional HNSW
/// side index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Exact,
    Hnsw,
}

impl VectorBackend {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "hnsw" => VectorBackend::Hnsw,
            _ => VectorBackend::Exact,
        }
    }
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding_size: EmbeddingSize,
    pub vector_backend: VectorBackend,
    /// Maximum concurrent writers against the store. Exactly one in
    /// practice; this is the configurable knob in front of the writer
    /// mutex, default 1.
    pub writer_concurrency: usize,
    /// Caps per-call model-gateway time budgets to ~5s for latency-sensitive
    /// desktop integrations.
    pub claude_desktop_mode: bool,
    /// Override for the data directory; `None` uses the platform default.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Config {
    /// Read configuration from environment variables, applying defaults for
    /// anything unset. Never fails — an unparsable value falls back silently
    /// to its default, since bad env config should not crash a long-running
    /// agent process before the storage layer even opens.
    pub fn from_env() -> Self {
        let embedding_size = std::env::var("JUST_MEMORY_EMBEDDING_SIZE")
            .map(|s| EmbeddingSize::parse(&s))
            .unwrap_or(EmbeddingSize::Small);

        let vector_backend = std::env::var("JUST_MEMORY_VECTOR_BACKEND")
            .map(|s| VectorBackend::parse(&s))
            .unwrap_or(VectorBackend::Exact);

        let writer_concurrency = std::env::var("JUST_MEMORY_WRITER_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);

        let claude_desktop_mode = std::env::var("JUST_MEMORY_CLAUDE_DESKTOP_MODE")
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let data_dir = std::env::var("JUST_MEMORY_DATA_DIR").ok().map(PathBuf::from);

        Self {
            embedding_size,
            vector_backend,
            writer_concurrency,
            claude_desktop_mode,
            data_dir,
        }
    }

    /// Per-call time budget for model gateway calls, shortened under
    /// Claude-Desktop mode.
    pub fn call_budget(&self, default: std::time::Duration) -> std::time::Duration {
        if self.claude_desktop_mode {
            default.min(std::time::Duration::from_secs(5))
        } else {
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = Config {
            embedding_size: EmbeddingSize::Small,
            vector_backend: VectorBackend::Exact,
            writer_concurrency: 1,
            claude_desktop_mode: false,
            data_dir: None,
        };
        assert_eq!(cfg.embedding_size.dimensions(), 384);
    }

    #[test]
    fn claude_desktop_mode_caps_budget() {
        let cfg = Config {
            embedding_size: EmbeddingSize::Large,
            vector_backend: VectorBackend::Exact,
            writer_concurrency: 1,
            claude_desktop_mode: true,
            data_dir: None,
        };
        let budget = cfg.call_budget(std::time::Duration::from_secs(15));
        assert_eq!(budget, std::time::Duration::from_secs(5));
    }
}
