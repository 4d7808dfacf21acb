//! Vector Store (C3).
//!
//! Persists `(memory_id -> embedding)` and answers nearest-neighbor
//! queries. The canonical path stores vectors in `memory_embeddings`
//! (blob-encoded `f32`, colocated with the memory row by foreign key) and
//! always computes cosine distance by exact scan. When the `vector-search`
//! feature is enabled and the optional HNSW side index reports `ready()`,
//! `knn` is served from it instead — transparently, so callers never
//! observe two backends (the component picks one per call).

mod hnsw;

use rusqlite::{params, OptionalExtension};

use crate::config::EmbeddingSize;
use crate::error::{CoreError, Result};
use crate::gateway::cosine_similarity;
use crate::storage::Storage;

pub use hnsw::HnswIndex;

/// A stored embedding with the metadata needed to detect a dimension
/// mismatch on reopen.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub memory_id: String,
    pub embedding: Vec<f32>,
    pub dimensions: usize,
    pub model: String,
}

fn encode(vec: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.iter().map(|x| x / norm).collect()
    } else {
        vec.to_vec()
    }
}

const DEFAULT_MODEL: &str = "nomic-ai/nomic-embed-text-v1.5";

impl Storage {
    /// Record the embedding dimension chosen at startup (`Config::embedding_size`)
    /// into `gateway_meta`. A mismatch on reopen is a fatal `SchemaError` —
    /// Cannot change without a rebuild once memories are embedded.
    pub fn stamp_embedding_dimension(&self, size: EmbeddingSize) -> Result<()> {
        let dims = size.dimensions().to_string();
        let existing: Option<String> = self.with_read(|conn| {
            conn.query_row(
                "SELECT value FROM gateway_meta WHERE key = 'embedding_dimensions'",
                [],
                |r| r.get(0),
            )
            .optional()
            .map_err(CoreError::from)
        })?;
        match existing {
            Some(v) if v != dims => Err(CoreError::Schema(format!(
                "stored embedding dimension {v} does not match configured {dims}; rebuild required"
            ))),
            Some(_) => Ok(()),
            None => self.with_write(|conn| {
                conn.execute(
                    "INSERT INTO gateway_meta (key, value) VALUES ('embedding_dimensions', ?1)",
                    params![dims],
                )?;
                Ok(())
            }),
        }
    }

    /// Insert or replace a memory's embedding. The vector is normalized to
    /// unit length before storage, matching the Model Gateway's contract.
    pub fn embedding_upsert(&self, memory_id: &str, embedding: &[f32]) -> Result<()> {
        let unit = normalize(embedding);
        let bytes = encode(&unit);
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO memory_embeddings (memory_id, embedding, dimensions, model)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(memory_id) DO UPDATE SET embedding = excluded.embedding, dimensions = excluded.dimensions, model = excluded.model",
                params![memory_id, bytes, unit.len() as i64, DEFAULT_MODEL],
            )?;
            Ok(())
        })
    }

    pub fn embedding_upsert_batch(&self, items: &[(String, Vec<f32>)]) -> Result<()> {
        for (id, vec) in items {
            self.embedding_upsert(id, vec)?;
        }
        Ok(())
    }

    pub fn embedding_delete(&self, memory_id: &str) -> Result<()> {
        self.with_write(|conn| {
            conn.execute("DELETE FROM memory_embeddings WHERE memory_id = ?1", params![memory_id])?;
            Ok(())
        })
    }

    pub fn embedding_get(&self, memory_id: &str) -> Result<Option<Vec<f32>>> {
        self.with_read(|conn| {
            conn.query_row(
                "SELECT embedding FROM memory_embeddings WHERE memory_id = ?1",
                params![memory_id],
                |r| r.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map(|o| o.map(|b| decode(&b)))
            .map_err(CoreError::from)
        })
    }

    pub fn embedding_count(&self) -> Result<usize> {
        self.with_read(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM memory_embeddings", [], |r| r.get(0))?;
            Ok(count as usize)
        })
    }

    /// Exact cosine-distance nearest-neighbor scan over every stored
    /// embedding within `project_id` (joined through `memories` so deleted
    /// rows and other projects are excluded). `distance = 1 - cosine_sim`.
    pub fn knn_exact(&self, project_id: &str, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        let query = normalize(query);
        let rows: Vec<(String, Vec<u8>)> = self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.memory_id, e.embedding FROM memory_embeddings e
                 JOIN memories m ON m.id = e.memory_id
                 WHERE m.project_id = ?1 AND m.deleted_at IS NULL",
            )?;
            let rows = stmt
                .query_map(params![project_id], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut scored: Vec<(String, f32)> = rows
            .into_iter()
            .map(|(id, blob)| {
                let vec = decode(&blob);
                let sim = cosine_similarity(&query, &vec);
                (id, 1.0 - sim)
            })
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// k-NN, preferring the HNSW side index when present and ready, falling
    /// back to [`Storage::knn_exact`] otherwise. Callers never see which
    /// path served the query.
    pub fn knn(&self, project_id: &str, query: &[f32], k: usize, index: Option<&HnswIndex>) -> Result<Vec<(String, f32)>> {
        if let Some(idx) = index {
            if idx.ready() {
                if let Some(hits) = idx.search(query, k) {
                    return Ok(hits);
                }
            }
        }
        self.knn_exact(project_id, query, k)
    }
}
