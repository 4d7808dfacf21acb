//! Keyword search: BM25-ranked FTS5 when available, LIKE fallback otherwise.

use rusqlite::params;

use crate::error::Result;
use crate::memory::{Memory, GLOBAL_PROJECT};
use crate::storage::Storage;

use super::SearchHit;

/// Escape `%`, `_`, and `\` for a `LIKE ... ESCAPE '\'` predicate.
fn sanitize_like(query: &str) -> String {
    query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// FTS5 query strings treat most punctuation as syntax. Sanitizing here
/// means: strip FTS5 operator characters and wrap each remaining token in
/// double quotes, ORed together, so arbitrary user text can never be
/// interpreted as FTS5 query syntax.
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| {
            let cleaned: String = tok.chars().filter(|c| c.is_alphanumeric()).collect();
            cleaned
        })
        .filter(|tok| !tok.is_empty())
        .map(|tok| format!("\"{tok}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn fts5_available(conn: &rusqlite::Connection) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name='memories_fts'",
        [],
        |_| Ok(()),
    )
    .is_ok()
}

const SELECT_COLUMNS: &str = "id, project_id, content, memory_type, tags, importance, confidence, strength,
     access_count, source_count, contradiction_count, last_accessed, created_at, updated_at, deleted_at";

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get("tags")?;
    let memory_type_str: String = row.get("memory_type")?;
    Ok(Memory {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        content: row.get("content")?,
        memory_type: crate::memory::MemoryType::parse(&memory_type_str).unwrap_or(crate::memory::MemoryType::Note),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        importance: row.get("importance")?,
        confidence: row.get("confidence")?,
        strength: row.get("strength")?,
        access_count: row.get("access_count")?,
        source_count: row.get("source_count")?,
        contradiction_count: row.get("contradiction_count")?,
        last_accessed: row.get("last_accessed")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

impl Storage {
    /// Keyword search restricted to `project_id` or `"global"`, ranked by
    /// an interpretable score in `[0,1]`. Optionally filters by minimum
    /// `effective_confidence`.
    pub fn search_keyword(
        &self,
        project_id: &str,
        query: &str,
        limit: usize,
        min_effective_confidence: Option<f64>,
    ) -> Result<Vec<SearchHit>> {
        let now = chrono::Utc::now();
        let rows = self.with_read(|conn| {
            if fts5_available(conn) {
                let fts_query = sanitize_fts5_query(query);
                if fts_query.is_empty() {
                    return Ok(Vec::new());
                }
                let sql = format!(
                    "SELECT {SELECT_COLUMNS}, bm25(memories_fts) AS rank
                     FROM memories
                     JOIN memories_fts ON memories_fts.rowid = memories.rowid
                     WHERE memories_fts MATCH ?1
                       AND (memories.project_id = ?2 OR memories.project_id = '{GLOBAL_PROJECT}')
                       AND memories.deleted_at IS NULL
                     ORDER BY rank LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![fts_query, project_id, limit as i64], |r| {
                        let memory = row_to_memory(r)?;
                        let rank: f64 = r.get("rank")?;
                        Ok((memory, rank))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            } else {
                let needle = format!("%{}%", sanitize_like(query));
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM memories
                     WHERE content LIKE ?1 ESCAPE '\\'
                       AND (project_id = ?2 OR project_id = '{GLOBAL_PROJECT}')
                       AND deleted_at IS NULL
                     ORDER BY updated_at DESC LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![needle, project_id, limit as i64], |r| {
                        let memory = row_to_memory(r)?;
                        Ok((memory, 0.0))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
        })?;

        // bm25() returns more-negative-is-better; normalize to [0,1] with
        // the best-ranked hit at 1.0. LIKE fallback has no real rank, so
        // every hit scores 1.0 (distinguished only by recency ordering).
        let worst = rows.iter().map(|(_, r)| *r).fold(0.0_f64, f64::min);
        let best = rows.iter().map(|(_, r)| *r).fold(0.0_f64, f64::max);
        let span = (best - worst).abs().max(1e-9);

        let hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|(memory, rank)| {
                let score = if span > 1e-9 { (best - rank) / span } else { 1.0 };
                SearchHit { memory, score: score.clamp(0.0, 1.0), match_type: super::MatchType::Keyword }
            })
            .filter(|hit| {
                min_effective_confidence
                    .map(|min| hit.memory.effective_confidence(now) >= min)
                    .unwrap_or(true)
            })
            .collect();
        Ok(hits)
    }
}
