//! Search & Activation (C7).
//!
//! Three retrieval modes — keyword, semantic, hybrid — plus spreading
//! activation for graph-aware "contextual" retrieval. Keyword search is a
//! synchronous `Storage` method (no model call involved); semantic and
//! hybrid search need the Model Gateway to embed the query, so they're free
//! async functions taking `&Storage` and `&ModelGateway` rather than
//! `Storage` methods.

mod activation;
mod keyword;

pub use activation::{spreading_activation, ActivationResult, SpreadingActivationConfig};
pub use keyword::sanitize_fts5_query;

use serde::Serialize;

use crate::error::Result;
use crate::gateway::ModelGateway;
use crate::memory::Memory;
use crate::storage::Storage;

/// Reciprocal-rank-fusion constant.
pub const RRF_K: f64 = 60.0;
/// Default over-fetch factor for the semantic leg of hybrid search:
/// `k = limit * K_FACTOR`.
pub const K_FACTOR: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchModeSelector {
    Keyword,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Keyword,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub memory: Memory,
    pub score: f64,
    pub match_type: MatchType,
}

/// `1 - cosine_distance` semantic search: embed the query, k-NN against the
/// Vector Store, drop rows with no embedding (the k-NN scan already only
/// iterates rows that have one), scope by project.
pub async fn search_semantic(
    storage: &Storage,
    gateway: &ModelGateway,
    project_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let Some(query_vec) = gateway.embed_query(query).await.ready() else {
        return Ok(Vec::new());
    };
    let now = chrono::Utc::now();
    let hits = storage.knn_exact(project_id, &query_vec, limit)?;
    let mut out = Vec::with_capacity(hits.len());
    for (memory_id, distance) in hits {
        if let Some(memory) = storage.get_memory_row(&memory_id)? {
            if memory.is_deleted() {
                continue;
            }
            let _ = now;
            out.push(SearchHit { memory, score: (1.0 - distance as f64).clamp(0.0, 1.0), match_type: MatchType::Semantic });
        }
    }
    Ok(out)
}

fn rrf_fuse(keyword: &[SearchHit], semantic: &[SearchHit], weight_k: f64, weight_v: f64) -> Vec<(String, f64)> {
    use std::collections::HashMap;
    let mut scores: HashMap<String, f64> = HashMap::new();
    for (rank, hit) in keyword.iter().enumerate() {
        *scores.entry(hit.memory.id.clone()).or_insert(0.0) += weight_k / (RRF_K + rank as f64 + 1.0);
    }
    for (rank, hit) in semantic.iter().enumerate() {
        *scores.entry(hit.memory.id.clone()).or_insert(0.0) += weight_v / (RRF_K + rank as f64 + 1.0);
    }
    let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// Run keyword and semantic search in parallel (conceptually; sequentially
/// here since the storage layer is synchronous) and fuse with Reciprocal
/// Rank Fusion, `K=60`, default weights 0.5/0.5.
pub async fn search_hybrid(
    storage: &Storage,
    gateway: &ModelGateway,
    project_id: &str,
    query: &str,
    limit: usize,
    weight_keyword: f64,
    weight_semantic: f64,
) -> Result<Vec<SearchHit>> {
    let over_fetch = limit * K_FACTOR;
    let keyword_hits = storage.search_keyword(project_id, query, over_fetch, None)?;
    let semantic_hits = search_semantic(storage, gateway, project_id, query, over_fetch).await?;

    let fused = rrf_fuse(&keyword_hits, &semantic_hits, weight_keyword, weight_semantic);
    let by_id: std::collections::HashMap<&str, &Memory> = keyword_hits
        .iter()
        .map(|h| (h.memory.id.as_str(), &h.memory))
        .chain(semantic_hits.iter().map(|h| (h.memory.id.as_str(), &h.memory)))
        .collect();

    let mut out = Vec::with_capacity(limit);
    for (id, score) in fused.into_iter().take(limit) {
        if let Some(memory) = by_id.get(id.as_str()) {
            out.push(SearchHit { memory: (*memory).clone(), score, match_type: MatchType::Hybrid });
        }
    }
    Ok(out)
}

/// "Contextual" search: seed spreading activation from keyword hits, boost
/// seed memories' activation ×1.5 (clamped at 1) before returning.
pub async fn search_contextual(
    storage: &Storage,
    project_id: &str,
    query: &str,
    config: SpreadingActivationConfig,
) -> Result<ActivationResult> {
    let keyword_hits = storage.search_keyword(project_id, query, 10, None)?;
    let seeds: Vec<String> = keyword_hits.iter().map(|h| h.memory.id.clone()).collect();
    let mut result = spreading_activation(storage, project_id, &seeds, config)?;
    for seed in &seeds {
        if let Some(v) = result.activations.get_mut(seed) {
            *v = (*v * 1.5).min(1.0);
        }
    }
    result.activations.retain(|_, v| *v > 0.0);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_favors_items_ranked_high_in_both_lists() {
        use crate::memory::{MemoryType, StoreInput};
        let storage = Storage::open_in_memory().unwrap();
        let m = |c: &str| {
            storage
                .store(StoreInput { content: c.into(), memory_type: MemoryType::Fact, tags: vec![], importance: 0.5, confidence: 0.5, project_id: "p1".into() })
                .unwrap()
        };
        let a = m("a");
        let b = m("b");
        let hit = |mem: &Memory| SearchHit { memory: mem.clone(), score: 1.0, match_type: MatchType::Keyword };
        let keyword = vec![hit(&a), hit(&b)];
        let semantic = vec![hit(&a)];
        let fused = rrf_fuse(&keyword, &semantic, 0.5, 0.5);
        assert_eq!(fused[0].0, a.id);
    }
}
