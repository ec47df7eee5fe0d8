//! Store-level retrieval lanes: lexical (FTS5), vector, and symbol.
//!
//! All three return stable orderings: score ordering first, `chunk_id`
//! lexicographic on ties, so repeated queries over identical data produce
//! identical result lists regardless of row insertion order.

use rusqlite::params;

use crate::error::EngineError;
use crate::error::Result;

use super::Store;

/// One lexical-lane hit. Lower `rank` is more relevant (bm25).
#[derive(Debug, Clone, PartialEq)]
pub struct FtsHit {
    pub chunk_id: String,
    pub rank: f64,
    pub path: String,
}

/// One vector-lane hit. Higher `similarity` is more relevant (cosine).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub similarity: f32,
    pub path: String,
}

/// One symbol-lane hit: a named span, with its first chunk when present.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolHit {
    pub span_id: String,
    pub chunk_id: Option<String>,
    pub name: String,
    pub path: String,
    /// Exact name match (vs prefix match).
    pub exact: bool,
}

impl Store {
    /// Full-text search over the chunk projection.
    ///
    /// Ordering: ascending bm25 rank, ties broken by `chunk_id`.
    pub async fn fts_search(
        &self,
        query: &str,
        repo: Option<&str>,
        limit: usize,
    ) -> Result<Vec<FtsHit>> {
        let Some(match_expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let repo = repo.map(str::to_string);
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT chunk_id, bm25(chunk_fts) AS rank, path
                     FROM chunk_fts
                     WHERE chunk_fts MATCH ?1 AND (?2 IS NULL OR repo = ?2)
                     ORDER BY rank ASC, chunk_id ASC
                     LIMIT ?3",
                )
                .map_err(|e| EngineError::store_io("prepare fts_search", e))?;
            let rows = stmt
                .query_map(params![match_expr, repo, limit as i64], |row| {
                    Ok(FtsHit {
                        chunk_id: row.get(0)?,
                        rank: row.get(1)?,
                        path: row.get(2)?,
                    })
                })
                .map_err(|e| EngineError::store_io("fts_search", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| EngineError::store_io("read fts hit", e))?);
            }
            Ok(out)
        })
        .await
    }

    /// Rebuild the FTS projection from chunk rows.
    ///
    /// The rebuilt index must behave identically to the trigger-maintained
    /// one; this exists for recovery after manual surgery on the database.
    pub async fn rebuild_fts(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "BEGIN;
                 DELETE FROM chunk_fts;
                 INSERT INTO chunk_fts(content, chunk_id, repo, path)
                     SELECT content, id, repo, path FROM chunk;
                 COMMIT;",
            )
            .map_err(|e| EngineError::store_io("rebuild_fts", e))
        })
        .await
    }

    /// Vector search: cosine similarity against stored embeddings for one
    /// model. Ordering: similarity descending, ties broken by `chunk_id`.
    pub async fn vector_search(
        &self,
        query_vector: &[f32],
        model: &str,
        repo: Option<&str>,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        if query_vector.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = query_vector.to_vec();
        let model = model.to_string();
        let repo = repo.map(str::to_string);
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT e.chunk_id, e.dim, e.vector, c.path
                     FROM embedding e JOIN chunk c ON c.id = e.chunk_id
                     WHERE e.model = ?1 AND (?2 IS NULL OR c.repo = ?2)",
                )
                .map_err(|e| EngineError::store_io("prepare vector_search", e))?;
            let rows = stmt
                .query_map(params![model, repo], |row| {
                    let chunk_id: String = row.get(0)?;
                    let dim: i64 = row.get(1)?;
                    let bytes: Vec<u8> = row.get(2)?;
                    let path: String = row.get(3)?;
                    Ok((chunk_id, dim as usize, bytes, path))
                })
                .map_err(|e| EngineError::store_io("vector_search", e))?;

            let mut hits = Vec::new();
            for row in rows {
                let (chunk_id, dim, bytes, path) =
                    row.map_err(|e| EngineError::store_io("read embedding", e))?;
                let vector = bytes_to_f32_vec(&bytes);
                if vector.len() != dim || dim != query_vector.len() {
                    // Dimension drift (model change mid-index): skip the row
                    // rather than poison the whole search.
                    tracing::warn!(chunk_id = %chunk_id, "Embedding dimension mismatch, skipping");
                    continue;
                }
                let similarity = cosine_similarity(&query_vector, &vector);
                hits.push(VectorHit {
                    chunk_id,
                    similarity,
                    path,
                });
            }

            hits.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.chunk_id.cmp(&b.chunk_id))
            });
            hits.truncate(limit);
            Ok(hits)
        })
        .await
    }

    /// Symbol search over span names: exact matches first, then prefix
    /// matches, each group ordered by name then span id.
    pub async fn symbol_search(
        &self,
        name: &str,
        repo: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SymbolHit>> {
        if name.trim().is_empty() {
            return Ok(Vec::new());
        }
        let name = name.trim().to_string();
        let prefix = format!("{}%", escape_like(&name));
        let repo = repo.map(str::to_string);
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT s.id, s.name, s.path,
                            (SELECT id FROM chunk WHERE span_id = s.id ORDER BY id LIMIT 1),
                            (s.name = ?1) AS exact
                     FROM span s
                     WHERE s.name IS NOT NULL
                       AND s.name LIKE ?2 ESCAPE '\\'
                       AND (?3 IS NULL OR s.repo = ?3)
                     ORDER BY exact DESC, s.name ASC, s.id ASC
                     LIMIT ?4",
                )
                .map_err(|e| EngineError::store_io("prepare symbol_search", e))?;
            let rows = stmt
                .query_map(params![name, prefix, repo, limit as i64], |row| {
                    let exact: i64 = row.get(4)?;
                    Ok(SymbolHit {
                        span_id: row.get(0)?,
                        name: row.get(1)?,
                        path: row.get(2)?,
                        chunk_id: row.get(3)?,
                        exact: exact != 0,
                    })
                })
                .map_err(|e| EngineError::store_io("symbol_search", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| EngineError::store_io("read symbol hit", e))?);
            }
            Ok(out)
        })
        .await
    }
}

/// Build a safe FTS5 MATCH expression from free text.
///
/// Tokens are quoted and OR-joined so user input can never inject FTS
/// operators. Returns `None` when the query has no searchable tokens.
pub(crate) fn fts_match_expr(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

/// Escape `%`, `_` and `\` for a LIKE pattern.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Decode a little-endian f32 BLOB.
pub(crate) fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity; 0.0 for zero-magnitude or mismatched vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
#[path = "search.test.rs"]
mod tests;
