//! File, span, chunk, embedding and reference persistence.
//!
//! The core write is `upsert_file`: when a file's content hash changes, all
//! of its spans and their dependents are replaced atomically inside one
//! transaction. Foreign-key cascades and the FTS triggers do the dependent
//! cleanup, so a rollback leaves the previous generation fully intact.

use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use zerocopy::AsBytes;

use crate::error::EngineError;
use crate::error::Result;
use crate::types::ChunkRecord;
use crate::types::EmbeddingRecord;
use crate::types::FileRecord;
use crate::types::RefKind;
use crate::types::RefOrigin;
use crate::types::ReferenceRecord;
use crate::types::SpanKind;
use crate::types::SpanRecord;

use super::Store;

impl Store {
    /// Insert or replace a file and its spans, chunks and references.
    ///
    /// No-op (returns `false`) when the stored content hash already matches.
    /// Otherwise the file's previous spans and all dependents are removed and
    /// the new generation is written, all in one transaction.
    pub async fn upsert_file(
        &self,
        file: FileRecord,
        spans: Vec<SpanRecord>,
        chunks: Vec<ChunkRecord>,
        references: Vec<ReferenceRecord>,
    ) -> Result<bool> {
        validate_spans(&file, &spans)?;
        validate_chunks(&spans, &chunks)?;

        self.with_conn(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT content_hash FROM file WHERE repo = ?1 AND path = ?2",
                    params![file.repo, file.path],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| EngineError::store_io("read file hash", e))?;

            if existing.as_deref() == Some(file.content_hash.as_str()) {
                return Ok(false);
            }

            let tx = conn
                .unchecked_transaction()
                .map_err(|e| EngineError::store_io("begin upsert_file", e))?;

            // Replace generation: dropping the spans cascades chunks,
            // embeddings, references; the FTS triggers clean the projection.
            tx.execute(
                "DELETE FROM span WHERE repo = ?1 AND path = ?2",
                params![file.repo, file.path],
            )
            .map_err(|e| EngineError::store_io("delete old spans", e))?;

            tx.execute(
                "INSERT INTO file (repo, path, content_hash, lang)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(repo, path) DO UPDATE SET
                     content_hash = excluded.content_hash,
                     lang = excluded.lang",
                params![file.repo, file.path, file.content_hash, file.language],
            )
            .map_err(|e| EngineError::store_io("upsert file", e))?;

            insert_spans(&tx, &spans)?;
            insert_chunks(&tx, &chunks)?;
            insert_references(&tx, &references)?;

            tx.commit()
                .map_err(|e| EngineError::store_io("commit upsert_file", e))?;
            Ok(true)
        })
        .await
    }

    /// Remove a file; cascades delete spans, chunks, embeddings, references.
    ///
    /// Returns `false` when the file was not indexed.
    pub async fn remove_file(&self, repo: &str, path: &str) -> Result<bool> {
        let repo = repo.to_string();
        let path = path.to_string();
        self.with_conn(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM file WHERE repo = ?1 AND path = ?2",
                    params![repo, path],
                )
                .map_err(|e| EngineError::store_io("delete file", e))?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Fetch one file record.
    pub async fn file(&self, repo: &str, path: &str) -> Result<Option<FileRecord>> {
        let repo = repo.to_string();
        let path = path.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT repo, path, content_hash, lang FROM file WHERE repo = ?1 AND path = ?2",
                params![repo, path],
                |row| {
                    Ok(FileRecord {
                        repo: row.get(0)?,
                        path: row.get(1)?,
                        content_hash: row.get(2)?,
                        language: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| EngineError::store_io("read file", e))
        })
        .await
    }

    /// Store embeddings for existing chunks, one transaction.
    ///
    /// Vectors are stored as little-endian `f32` BLOBs. Inserting an
    /// embedding for a missing chunk is a constraint violation.
    pub async fn insert_embeddings(&self, embeddings: Vec<EmbeddingRecord>) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| EngineError::store_io("begin insert_embeddings", e))?;
            {
                let mut stmt = tx
                    .prepare_cached(
                        "INSERT OR REPLACE INTO embedding
                         (chunk_id, model, dim, vector, created_at)
                         VALUES (?1, ?2, ?3, ?4, strftime('%s','now'))",
                    )
                    .map_err(|e| EngineError::store_io("prepare insert embedding", e))?;
                for emb in &embeddings {
                    if emb.vector.len() != emb.dimension {
                        return Err(EngineError::store_constraint(
                            "insert embedding",
                            format!(
                                "dimension mismatch: declared {}, got {}",
                                emb.dimension,
                                emb.vector.len()
                            ),
                        ));
                    }
                    stmt.execute(params![
                        emb.chunk_id,
                        emb.model,
                        emb.dimension as i64,
                        emb.vector.as_bytes(),
                    ])?;
                }
            }
            tx.commit()
                .map_err(|e| EngineError::store_io("commit insert_embeddings", e))?;
            Ok(())
        })
        .await
    }

    /// Fetch one chunk by id.
    pub async fn chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>> {
        let chunk_id = chunk_id.to_string();
        self.with_conn(move |conn| read_chunk(conn, &chunk_id)).await
    }

    /// Fetch chunks by id, preserving the requested order. Missing ids are
    /// skipped.
    pub async fn chunks_by_ids(&self, ids: Vec<String>) -> Result<Vec<ChunkRecord>> {
        self.with_conn(move |conn| {
            let mut out = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(chunk) = read_chunk(conn, id)? {
                    out.push(chunk);
                }
            }
            Ok(out)
        })
        .await
    }

    /// Fetch one span by id.
    pub async fn span(&self, span_id: &str) -> Result<Option<SpanRecord>> {
        let span_id = span_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, repo, path, byte_start, byte_end, kind, name, signature, doc, parents_json
                 FROM span WHERE id = ?1",
                params![span_id],
                map_span_row,
            )
            .optional()
            .map_err(|e| EngineError::store_io("read span", e))
        })
        .await
    }

    /// Fetch spans by id, preserving the requested order. Missing ids are
    /// skipped.
    pub async fn spans_by_ids(&self, ids: Vec<String>) -> Result<Vec<SpanRecord>> {
        self.with_conn(move |conn| {
            let mut out = Vec::with_capacity(ids.len());
            for id in &ids {
                let span = conn
                    .query_row(
                        "SELECT id, repo, path, byte_start, byte_end, kind, name, signature, doc, parents_json
                         FROM span WHERE id = ?1",
                        params![id],
                        map_span_row,
                    )
                    .optional()
                    .map_err(|e| EngineError::store_io("read span", e))?;
                if let Some(span) = span {
                    out.push(span);
                }
            }
            Ok(out)
        })
        .await
    }

    /// All spans of one file, ordered by byte_start.
    pub async fn spans_for_file(&self, repo: &str, path: &str) -> Result<Vec<SpanRecord>> {
        let repo = repo.to_string();
        let path = path.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, repo, path, byte_start, byte_end, kind, name, signature, doc, parents_json
                     FROM span WHERE repo = ?1 AND path = ?2 ORDER BY byte_start",
                )
                .map_err(|e| EngineError::store_io("prepare spans_for_file", e))?;
            let rows = stmt
                .query_map(params![repo, path], map_span_row)
                .map_err(|e| EngineError::store_io("spans_for_file", e))?;
            collect_rows(rows, "spans_for_file")
        })
        .await
    }

    /// All spans in a repository. Feeds graph construction.
    pub async fn spans_for_repo(&self, repo: &str) -> Result<Vec<SpanRecord>> {
        let repo = repo.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, repo, path, byte_start, byte_end, kind, name, signature, doc, parents_json
                     FROM span WHERE repo = ?1 ORDER BY path, byte_start",
                )
                .map_err(|e| EngineError::store_io("prepare spans_for_repo", e))?;
            let rows = stmt
                .query_map(params![repo], map_span_row)
                .map_err(|e| EngineError::store_io("spans_for_repo", e))?;
            collect_rows(rows, "spans_for_repo")
        })
        .await
    }

    /// All reference edges originating in a repository's spans.
    pub async fn references_for_repo(&self, repo: &str) -> Result<Vec<ReferenceRecord>> {
        let repo = repo.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT r.src_span_id, r.dst_path, r.byte_start, r.byte_end, r.kind, r.origin
                     FROM span_ref r JOIN span s ON s.id = r.src_span_id
                     WHERE s.repo = ?1
                     ORDER BY r.src_span_id, r.dst_path, r.byte_start",
                )
                .map_err(|e| EngineError::store_io("prepare references_for_repo", e))?;
            let rows = stmt
                .query_map(params![repo], |row| {
                    let kind: String = row.get(4)?;
                    let origin: String = row.get(5)?;
                    Ok(ReferenceRecord {
                        src_span_id: row.get(0)?,
                        dst_path: row.get(1)?,
                        byte_start: row.get::<_, i64>(2)? as u64,
                        byte_end: row.get::<_, i64>(3)? as u64,
                        kind: RefKind::parse(&kind).unwrap_or(RefKind::Call),
                        origin: RefOrigin::parse(&origin).unwrap_or(RefOrigin::Heuristic),
                    })
                })
                .map_err(|e| EngineError::store_io("references_for_repo", e))?;
            collect_rows(rows, "references_for_repo")
        })
        .await
    }

    /// First chunk of every span in a repository: `(span_id, chunk)`.
    ///
    /// Bulk variant used when sizing graph traversal.
    pub async fn first_chunks_for_repo(&self, repo: &str) -> Result<Vec<(String, ChunkRecord)>> {
        let repo = repo.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT c.id, c.span_id, c.repo, c.path, c.content, c.created_at
                     FROM chunk c
                     WHERE c.repo = ?1
                       AND c.id = (SELECT id FROM chunk WHERE span_id = c.span_id
                                   ORDER BY id LIMIT 1)
                     ORDER BY c.span_id",
                )
                .map_err(|e| EngineError::store_io("prepare first_chunks_for_repo", e))?;
            let rows = stmt
                .query_map(params![repo], |row| {
                    let chunk = map_chunk_row(row)?;
                    Ok((chunk.span_id.clone(), chunk))
                })
                .map_err(|e| EngineError::store_io("first_chunks_for_repo", e))?;
            collect_rows(rows, "first_chunks_for_repo")
        })
        .await
    }

    /// First chunk of a span, if any.
    pub async fn first_chunk_of_span(&self, span_id: &str) -> Result<Option<ChunkRecord>> {
        let span_id = span_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, span_id, repo, path, content, created_at
                 FROM chunk WHERE span_id = ?1 ORDER BY id LIMIT 1",
                params![span_id],
                map_chunk_row,
            )
            .optional()
            .map_err(|e| EngineError::store_io("first_chunk_of_span", e))
        })
        .await
    }

    /// Row counts for (file, span, chunk, embedding, span_ref).
    ///
    /// Test and diagnostics helper for the cascade invariant.
    pub async fn entity_counts(&self) -> Result<(i64, i64, i64, i64, i64)> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<i64> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .map_err(|e| EngineError::store_io(format!("count {table}"), e))
            };
            Ok((
                count("file")?,
                count("span")?,
                count("chunk")?,
                count("embedding")?,
                count("span_ref")?,
            ))
        })
        .await
    }
}

// ========== Row mapping ==========

fn map_span_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SpanRecord> {
    let kind: String = row.get(5)?;
    let parents_json: String = row.get(9)?;
    Ok(SpanRecord {
        id: row.get(0)?,
        repo: row.get(1)?,
        path: row.get(2)?,
        byte_start: row.get::<_, i64>(3)? as u64,
        byte_end: row.get::<_, i64>(4)? as u64,
        kind: SpanKind::parse(&kind).unwrap_or(SpanKind::Other),
        name: row.get(6)?,
        signature: row.get(7)?,
        doc: row.get(8)?,
        parents: serde_json::from_str(&parents_json).unwrap_or_default(),
    })
}

fn map_chunk_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    Ok(ChunkRecord {
        id: row.get(0)?,
        span_id: row.get(1)?,
        repo: row.get(2)?,
        path: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn read_chunk(conn: &Connection, chunk_id: &str) -> Result<Option<ChunkRecord>> {
    conn.query_row(
        "SELECT id, span_id, repo, path, content, created_at FROM chunk WHERE id = ?1",
        params![chunk_id],
        map_chunk_row,
    )
    .optional()
    .map_err(|e| EngineError::store_io("read chunk", e))
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    operation: &str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| EngineError::store_io(operation, e))?);
    }
    Ok(out)
}

// ========== Bulk inserts (inside an open transaction) ==========

fn insert_spans(tx: &rusqlite::Transaction<'_>, spans: &[SpanRecord]) -> Result<()> {
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO span
             (id, repo, path, byte_start, byte_end, kind, name, signature, doc, parents_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .map_err(|e| EngineError::store_io("prepare insert span", e))?;
    for span in spans {
        let parents_json = serde_json::to_string(&span.parents)
            .map_err(|e| EngineError::store_io("serialize parents", e))?;
        stmt.execute(params![
            span.id,
            span.repo,
            span.path,
            span.byte_start as i64,
            span.byte_end as i64,
            span.kind.label(),
            span.name,
            span.signature,
            span.doc,
            parents_json,
        ])?;
    }
    Ok(())
}

fn insert_chunks(tx: &rusqlite::Transaction<'_>, chunks: &[ChunkRecord]) -> Result<()> {
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO chunk (id, span_id, repo, path, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| EngineError::store_io("prepare insert chunk", e))?;
    for chunk in chunks {
        stmt.execute(params![
            chunk.id,
            chunk.span_id,
            chunk.repo,
            chunk.path,
            chunk.content,
            chunk.created_at,
        ])?;
    }
    Ok(())
}

fn insert_references(tx: &rusqlite::Transaction<'_>, references: &[ReferenceRecord]) -> Result<()> {
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO span_ref (src_span_id, dst_path, byte_start, byte_end, kind, origin)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| EngineError::store_io("prepare insert reference", e))?;
    for r in references {
        stmt.execute(params![
            r.src_span_id,
            r.dst_path,
            r.byte_start as i64,
            r.byte_end as i64,
            r.kind.label(),
            r.origin.label(),
        ])?;
    }
    Ok(())
}

// ========== Write-time validation ==========

/// Reject spans that violate the structural invariants before any write.
fn validate_spans(file: &FileRecord, spans: &[SpanRecord]) -> Result<()> {
    for span in spans {
        if span.repo != file.repo || span.path != file.path {
            return Err(EngineError::store_constraint(
                "upsert_file",
                format!("span {} does not belong to {}:{}", span.id, file.repo, file.path),
            ));
        }
        if span.byte_start >= span.byte_end {
            return Err(EngineError::store_constraint(
                "upsert_file",
                format!(
                    "span {} has empty range {}..{}",
                    span.id, span.byte_start, span.byte_end
                ),
            ));
        }
    }

    // Spans of the same name+kind must not partially overlap: nesting and
    // disjoint ranges are fine, straddling is not.
    let mut grouped: std::collections::HashMap<(&str, SpanKind), Vec<&SpanRecord>> =
        std::collections::HashMap::new();
    for span in spans {
        if let Some(name) = span.name.as_deref() {
            grouped.entry((name, span.kind)).or_default().push(span);
        }
    }
    for ((name, kind), mut group) in grouped {
        group.sort_by_key(|s| (s.byte_start, s.byte_end));
        for pair in group.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let partial = b.byte_start < a.byte_end && b.byte_end > a.byte_end;
            if partial {
                return Err(EngineError::store_constraint(
                    "upsert_file",
                    format!(
                        "spans named `{name}` ({kind}) partially overlap: {}..{} vs {}..{}",
                        a.byte_start, a.byte_end, b.byte_start, b.byte_end
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Every chunk must belong to one of the spans written alongside it.
fn validate_chunks(spans: &[SpanRecord], chunks: &[ChunkRecord]) -> Result<()> {
    let span_ids: std::collections::HashSet<&str> =
        spans.iter().map(|s| s.id.as_str()).collect();
    for chunk in chunks {
        if !span_ids.contains(chunk.span_id.as_str()) {
            return Err(EngineError::store_constraint(
                "upsert_file",
                format!("chunk {} references unknown span {}", chunk.id, chunk.span_id),
            ));
        }
    }
    Ok(())
}
