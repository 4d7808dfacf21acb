//! Consolidator (C9).
//!
//! A cooperative timer fires at a fixed interval while the process has been
//! idle, running six maintenance phases against a single project. Nothing
//! here runs on the hot ingestion path — it is meant to be driven by a
//! background tick in the host process.

use chrono::{Duration, Utc};
use rusqlite::params;

use crate::error::Result;
use crate::gateway::cosine_similarity;
use crate::storage::Storage;

/// How often the timer should fire.
pub const CONSOLIDATION_INTERVAL: Duration = Duration::minutes(10);
/// Minimum idle time before a tick is allowed to run.
pub const IDLE_THRESHOLD: Duration = Duration::minutes(5);

const DECAY_FACTOR: f64 = 0.97;
const DECAY_FLOOR: f64 = 0.05;
const DECAY_IMPORTANCE_CEILING: f64 = 0.8;
const DECAY_STALE_AFTER: Duration = Duration::days(7);

const STRENGTHEN_ACCESS_COUNT_THRESHOLD: i64 = 5;
const STRENGTHEN_CONFIDENCE_CEILING: f64 = 0.95;
const STRENGTHEN_BOOST: f64 = 0.02;

const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;
const DEFAULT_TOOL_LOG_RETENTION_DAYS: i64 = 30;

/// A pair of memories flagged as near-duplicates by the similarity scan.
/// The Consolidator only reports these — merging requires an explicit
/// contradiction/resolution record.
#[derive(Debug, Clone)]
pub struct SimilarPair {
    pub memory_id_1: String,
    pub memory_id_2: String,
    pub similarity: f32,
}

/// Summary of a single consolidation tick, returned so the caller (and its
/// logs) can see what happened without re-querying each phase.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    pub decayed: usize,
    pub strengthened: usize,
    pub scratchpad_rows_cleaned: usize,
    pub tool_log_rows_pruned: usize,
    pub similar_pairs: Vec<SimilarPair>,
    pub contradictions_auto_resolved: usize,
}

/// Should the timer run a tick right now? `last_activity` is the last time
/// any write happened; `last_run` is the last time consolidation itself ran.
pub fn should_run(last_run: Option<chrono::DateTime<Utc>>, last_activity: chrono::DateTime<Utc>, now: chrono::DateTime<Utc>) -> bool {
    if now - last_activity < IDLE_THRESHOLD {
        return false;
    }
    match last_run {
        Some(t) => now - t >= CONSOLIDATION_INTERVAL,
        None => true,
    }
}

impl Storage {
    /// Phase 1: shrink `strength` for memories that are unimportant and
    /// haven't been touched recently.
    pub fn apply_memory_decay(&self, project_id: &str) -> Result<usize> {
        let cutoff = Utc::now() - DECAY_STALE_AFTER;
        self.with_write(|conn| {
            let n = conn.execute(
                "UPDATE memories
                 SET strength = strength * ?1, updated_at = ?2
                 WHERE project_id = ?3 AND deleted_at IS NULL
                   AND importance < ?4 AND last_accessed < ?5 AND strength > ?6",
                params![DECAY_FACTOR, Utc::now().to_rfc3339(), project_id, DECAY_IMPORTANCE_CEILING, cutoff.to_rfc3339(), DECAY_FLOOR],
            )?;
            Ok(n)
        })
    }

    /// Phase 2: nudge confidence up for frequently-accessed memories that
    /// haven't already saturated.
    pub fn strengthen_active_memories(&self, project_id: &str) -> Result<usize> {
        self.with_write(|conn| {
            let n = conn.execute(
                "UPDATE memories
                 SET confidence = MIN(1.0, confidence + ?1), updated_at = ?2
                 WHERE project_id = ?3 AND deleted_at IS NULL
                   AND access_count >= ?4 AND confidence < ?5",
                params![STRENGTHEN_BOOST, Utc::now().to_rfc3339(), project_id, STRENGTHEN_ACCESS_COUNT_THRESHOLD, STRENGTHEN_CONFIDENCE_CEILING],
            )?;
            Ok(n)
        })
    }

    /// Phase 4: drop tool-call-log rows older than `retain_days`.
    pub fn prune_tool_logs(&self, retain_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(retain_days);
        self.with_write(|conn| {
            let n = conn.execute(
                "DELETE FROM tool_call_log WHERE timestamp < ?1",
                params![cutoff.to_rfc3339()],
            )?;
            Ok(n)
        })
    }

    /// Phase 5: pairwise cosine-similarity scan over a project's embeddings,
    /// reporting (not merging) pairs at or above `threshold`.
    pub fn find_similar_memories(&self, project_id: &str, threshold: f32) -> Result<Vec<SimilarPair>> {
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

        let decoded: Vec<(String, Vec<f32>)> = rows
            .into_iter()
            .map(|(id, blob)| {
                let vec = blob
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                (id, vec)
            })
            .collect();

        let mut pairs = Vec::new();
        for i in 0..decoded.len() {
            for j in (i + 1)..decoded.len() {
                let sim = cosine_similarity(&decoded[i].1, &decoded[j].1);
                if sim >= threshold {
                    pairs.push(SimilarPair {
                        memory_id_1: decoded[i].0.clone(),
                        memory_id_2: decoded[j].0.clone(),
                        similarity: sim,
                    });
                }
            }
        }
        Ok(pairs)
    }

    /// Run all six consolidation phases for a single project.
    pub fn run_consolidation(&self, project_id: &str) -> Result<ConsolidationReport> {
        let decayed = self.apply_memory_decay(project_id)?;
        let strengthened = self.strengthen_active_memories(project_id)?;
        let scratchpad_rows_cleaned = self.clean_expired_scratchpad(project_id)?;
        let tool_log_rows_pruned = self.prune_tool_logs(DEFAULT_TOOL_LOG_RETENTION_DAYS)?;
        let similar_pairs = self.find_similar_memories(project_id, DEFAULT_SIMILARITY_THRESHOLD)?;
        let contradictions_auto_resolved = self.contradiction_auto_resolve(project_id)?.len();

        Ok(ConsolidationReport {
            decayed,
            strengthened,
            scratchpad_rows_cleaned,
            tool_log_rows_pruned,
            similar_pairs,
            contradictions_auto_resolved,
        })
    }
}
