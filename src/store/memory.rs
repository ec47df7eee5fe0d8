//! Memory and memory-link persistence.
//!
//! Memories soft-expire: rows with a past `expires_at` stay in the table but
//! are excluded from search unless explicitly requested.

use rusqlite::params;
use rusqlite::OptionalExtension;

use crate::error::EngineError;
use crate::error::Result;
use crate::types::MemoryKind;
use crate::types::MemoryRecord;
use crate::types::MemoryScope;

use super::Store;

/// Filter for memory search.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub scope: Option<MemoryScope>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub kind: Option<MemoryKind>,
    /// Include soft-expired rows.
    pub include_expired: bool,
}

/// A directed link between two memories.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLink {
    pub src: String,
    pub dst: String,
    pub kind: String,
    pub score: f64,
}

impl Store {
    /// Insert or replace a memory.
    pub async fn put_memory(&self, memory: MemoryRecord) -> Result<()> {
        self.with_conn(move |conn| {
            let source_json = serde_json::to_string(&memory.source_json)
                .map_err(|e| EngineError::store_io("serialize memory source", e))?;
            conn.execute(
                "INSERT OR REPLACE INTO memory
                 (id, scope, repo, branch, kind, key, value, weight, created_at, expires_at, source_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    memory.id,
                    memory.scope.label(),
                    memory.repo,
                    memory.branch,
                    memory.kind.label(),
                    memory.key,
                    memory.value,
                    memory.weight,
                    memory.created_at,
                    memory.expires_at,
                    source_json,
                ],
            )
            .map_err(|e| EngineError::store_io("put_memory", e))?;
            Ok(())
        })
        .await
    }

    /// Fetch one memory by id.
    pub async fn memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, scope, repo, branch, kind, key, value, weight, created_at, expires_at, source_json
                 FROM memory WHERE id = ?1",
                params![id],
                map_memory_row,
            )
            .optional()
            .map_err(|e| EngineError::store_io("read memory", e))
        })
        .await
    }

    /// Delete a memory (links cascade).
    pub async fn delete_memory(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM memory WHERE id = ?1", params![id])
                .map_err(|e| EngineError::store_io("delete_memory", e))?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Search memories by query terms.
    ///
    /// Scoring: per-term occurrence count across value and key, multiplied by
    /// the row weight. Ordering: score descending, then weight, then
    /// recency, then id — fully deterministic. Expired rows are excluded
    /// unless the filter requests them.
    pub async fn search_memories(
        &self,
        terms: Vec<String>,
        filter: MemoryFilter,
        now: i64,
        limit: usize,
    ) -> Result<Vec<(MemoryRecord, f64)>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, scope, repo, branch, kind, key, value, weight, created_at, expires_at, source_json
                     FROM memory
                     WHERE (?1 IS NULL OR scope = ?1)
                       AND (?2 IS NULL OR repo = ?2 OR scope = 'global')
                       AND (?3 IS NULL OR branch IS NULL OR branch = ?3)
                       AND (?4 IS NULL OR kind = ?4)",
                )
                .map_err(|e| EngineError::store_io("prepare search_memories", e))?;

            let rows = stmt
                .query_map(
                    params![
                        filter.scope.map(|s| s.label()),
                        filter.repo,
                        filter.branch,
                        filter.kind.map(|k| k.label()),
                    ],
                    map_memory_row,
                )
                .map_err(|e| EngineError::store_io("search_memories", e))?;

            let lowered: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
            let mut scored: Vec<(MemoryRecord, f64)> = Vec::new();
            for row in rows {
                let memory = row.map_err(|e| EngineError::store_io("read memory", e))?;
                if !filter.include_expired && memory.is_expired(now) {
                    continue;
                }
                let score = score_memory(&memory, &lowered);
                if score > 0.0 || lowered.is_empty() {
                    scored.push((memory, score));
                }
            }

            scored.sort_by(|(a, sa), (b, sb)| {
                sb.partial_cmp(sa)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        b.weight
                            .partial_cmp(&a.weight)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            });
            scored.truncate(limit);
            Ok(scored)
        })
        .await
    }

    /// Create or update a directed link between two memories.
    pub async fn link_memories(&self, link: MemoryLink) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO memory_link (src, dst, kind, score)
                 VALUES (?1, ?2, ?3, ?4)",
                params![link.src, link.dst, link.kind, link.score],
            )
            .map_err(|e| EngineError::store_io("link_memories", e))?;
            Ok(())
        })
        .await
    }

    /// Outgoing links of a memory, strongest first.
    pub async fn links_from(&self, src: &str) -> Result<Vec<MemoryLink>> {
        let src = src.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT src, dst, kind, score FROM memory_link
                     WHERE src = ?1 ORDER BY score DESC, dst ASC",
                )
                .map_err(|e| EngineError::store_io("prepare links_from", e))?;
            let rows = stmt
                .query_map(params![src], |row| {
                    Ok(MemoryLink {
                        src: row.get(0)?,
                        dst: row.get(1)?,
                        kind: row.get(2)?,
                        score: row.get(3)?,
                    })
                })
                .map_err(|e| EngineError::store_io("links_from", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| EngineError::store_io("read link", e))?);
            }
            Ok(out)
        })
        .await
    }
}

fn map_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let scope: String = row.get(1)?;
    let kind: String = row.get(4)?;
    let source_json: String = row.get(10)?;
    Ok(MemoryRecord {
        id: row.get(0)?,
        scope: MemoryScope::parse(&scope).unwrap_or(MemoryScope::Global),
        repo: row.get(2)?,
        branch: row.get(3)?,
        kind: MemoryKind::parse(&kind).unwrap_or(MemoryKind::Fact),
        key: row.get(5)?,
        value: row.get(6)?,
        weight: row.get(7)?,
        created_at: row.get(8)?,
        expires_at: row.get(9)?,
        source_json: serde_json::from_str(&source_json).unwrap_or(serde_json::Value::Null),
    })
}

/// Term-occurrence score weighted by the memory's weight.
fn score_memory(memory: &MemoryRecord, lowered_terms: &[String]) -> f64 {
    if lowered_terms.is_empty() {
        return memory.weight;
    }
    let value = memory.value.to_lowercase();
    let key = memory.key.as_deref().unwrap_or("").to_lowercase();
    let mut matches = 0usize;
    for term in lowered_terms {
        matches += value.matches(term.as_str()).count();
        if key.contains(term.as_str()) {
            matches += 2; // key hits are stronger signals than body hits
        }
    }
    matches as f64 * memory.weight
}

#[cfg(test)]
#[path = "memory.test.rs"]
mod tests;
