//! Session, interaction and operational-table persistence.

use rusqlite::params;
use rusqlite::OptionalExtension;

use crate::error::EngineError;
use crate::error::Result;
use crate::types::InteractionRecord;
use crate::types::SessionRecord;

use super::Store;

/// Terminal status of a background job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

/// A persisted rerank result, keyed by the deterministic cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankCacheRow {
    pub id: String,
    pub provider: String,
    pub model: String,
    pub query: String,
    pub created_at: i64,
    pub result_json: String,
}

impl Store {
    // ========== Sessions & interactions ==========

    /// Create a session row.
    pub async fn start_session(&self, session: SessionRecord) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO session (id, tool, user, repo, branch, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.id,
                    session.tool,
                    session.user,
                    session.repo,
                    session.branch,
                    session.started_at,
                    session.finished_at,
                ],
            )
            .map_err(EngineError::from)?;
            Ok(())
        })
        .await
    }

    /// Mark a session finished.
    pub async fn finish_session(&self, session_id: &str, finished_at: i64) -> Result<()> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE session SET finished_at = ?2 WHERE id = ?1",
                params![session_id, finished_at],
            )
            .map_err(|e| EngineError::store_io("finish_session", e))?;
            Ok(())
        })
        .await
    }

    /// Append an interaction to a session. Returns the row id.
    pub async fn record_interaction(
        &self,
        session_id: &str,
        ts: i64,
        query: &str,
        bundle_id: Option<&str>,
    ) -> Result<i64> {
        let session_id = session_id.to_string();
        let query = query.to_string();
        let bundle_id = bundle_id.map(str::to_string);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO interaction (session_id, ts, query, bundle_id, satisfied, notes)
                 VALUES (?1, ?2, ?3, ?4, NULL, NULL)",
                params![session_id, ts, query, bundle_id],
            )
            .map_err(EngineError::from)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Record the outcome of an interaction.
    pub async fn mark_satisfied(
        &self,
        interaction_id: i64,
        satisfied: bool,
        notes: Option<&str>,
    ) -> Result<()> {
        let notes = notes.map(str::to_string);
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE interaction SET satisfied = ?2, notes = ?3 WHERE id = ?1",
                params![interaction_id, satisfied as i64, notes],
            )
            .map_err(|e| EngineError::store_io("mark_satisfied", e))?;
            Ok(())
        })
        .await
    }

    /// All interactions with a recorded outcome, oldest first. Consumed by
    /// the learning loop.
    pub async fn judged_interactions(&self) -> Result<Vec<InteractionRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, session_id, ts, query, bundle_id, satisfied, notes
                     FROM interaction WHERE satisfied IS NOT NULL ORDER BY ts ASC, id ASC",
                )
                .map_err(|e| EngineError::store_io("prepare judged_interactions", e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(InteractionRecord {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        ts: row.get(2)?,
                        query: row.get(3)?,
                        bundle_id: row.get(4)?,
                        satisfied: row.get(5)?,
                        notes: row.get(6)?,
                    })
                })
                .map_err(|e| EngineError::store_io("judged_interactions", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| EngineError::store_io("read interaction", e))?);
            }
            Ok(out)
        })
        .await
    }

    // ========== Job runs & search log ==========

    /// Record the start of a background job. Returns the job id.
    pub async fn job_started(&self, kind: &str, started_at: i64) -> Result<i64> {
        let kind = kind.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO job_run (kind, started_at, status) VALUES (?1, ?2, 'running')",
                params![kind, started_at],
            )
            .map_err(|e| EngineError::store_io("job_started", e))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Record the end of a background job.
    pub async fn job_finished(
        &self,
        job_id: i64,
        status: JobStatus,
        finished_at: i64,
        error_text: Option<&str>,
    ) -> Result<()> {
        let error_text = error_text.map(str::to_string);
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE job_run SET status = ?2, finished_at = ?3, error_text = ?4 WHERE id = ?1",
                params![job_id, status.label(), finished_at, error_text],
            )
            .map_err(|e| EngineError::store_io("job_finished", e))?;
            Ok(())
        })
        .await
    }

    /// Append to the search log.
    pub async fn log_search(&self, query: &str, ts: i64, k: usize) -> Result<()> {
        let query = query.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO search_log (query, ts, k) VALUES (?1, ?2, ?3)",
                params![query, ts, k as i64],
            )
            .map_err(|e| EngineError::store_io("log_search", e))?;
            Ok(())
        })
        .await
    }

    // ========== Rerank cache ==========

    /// Look up a cached rerank result by its deterministic key.
    pub async fn rerank_cache_get(&self, key: &str) -> Result<Option<RerankCacheRow>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, provider, model, query, created_at, result_json
                 FROM rerank_cache WHERE id = ?1",
                params![key],
                |row| {
                    Ok(RerankCacheRow {
                        id: row.get(0)?,
                        provider: row.get(1)?,
                        model: row.get(2)?,
                        query: row.get(3)?,
                        created_at: row.get(4)?,
                        result_json: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(|e| EngineError::store_io("rerank_cache_get", e))
        })
        .await
    }

    /// Store a rerank result. Last write wins on key collision.
    pub async fn rerank_cache_put(&self, row: RerankCacheRow) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO rerank_cache
                 (id, provider, model, query, created_at, result_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.id,
                    row.provider,
                    row.model,
                    row.query,
                    row.created_at,
                    row.result_json,
                ],
            )
            .map_err(|e| EngineError::store_io("rerank_cache_put", e))?;
            Ok(())
        })
        .await
    }

    /// Drop rerank-cache rows older than `cutoff` (Unix seconds).
    pub async fn rerank_cache_evict_before(&self, cutoff: i64) -> Result<usize> {
        self.with_conn(move |conn| {
            let n = conn
                .execute(
                    "DELETE FROM rerank_cache WHERE created_at < ?1",
                    params![cutoff],
                )
                .map_err(|e| EngineError::store_io("rerank_cache_evict", e))?;
            Ok(n)
        })
        .await
    }

    // ========== Packing profiles ==========

    /// Load the packing profile JSON for `(repo, model)`.
    pub async fn packing_profile(&self, repo: &str, model: &str) -> Result<Option<String>> {
        let repo = repo.to_string();
        let model = model.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT profile_json FROM packing_profile WHERE repo = ?1 AND model = ?2",
                params![repo, model],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| EngineError::store_io("packing_profile", e))
        })
        .await
    }

    /// Persist a packing profile for `(repo, model)`.
    pub async fn save_packing_profile(
        &self,
        repo: &str,
        model: &str,
        profile_json: &str,
        updated_at: i64,
    ) -> Result<()> {
        let repo = repo.to_string();
        let model = model.to_string();
        let profile_json = profile_json.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO packing_profile (repo, model, profile_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![repo, model, profile_json, updated_at],
            )
            .map_err(|e| EngineError::store_io("save_packing_profile", e))?;
            Ok(())
        })
        .await
    }

    // ========== Policy versions ==========

    /// Persist a new policy version pointing at its predecessor. Returns the
    /// new version id.
    pub async fn push_policy_version(
        &self,
        params_json: &str,
        parent_id: Option<i64>,
        created_at: i64,
    ) -> Result<i64> {
        let params_json = params_json.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO policy_version (created_at, params_json, parent_id)
                 VALUES (?1, ?2, ?3)",
                params![created_at, params_json, parent_id],
            )
            .map_err(EngineError::from)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// The latest policy version, if any: `(id, params_json, parent_id)`.
    pub async fn latest_policy_version(&self) -> Result<Option<(i64, String, Option<i64>)>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, params_json, parent_id FROM policy_version
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| EngineError::store_io("latest_policy_version", e))
        })
        .await
    }

    /// Fetch one policy version by id: `(id, params_json, parent_id)`.
    pub async fn policy_version_by_id(
        &self,
        id: i64,
    ) -> Result<Option<(i64, String, Option<i64>)>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, params_json, parent_id FROM policy_version WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| EngineError::store_io("policy_version_by_id", e))
        })
        .await
    }
}

#[cfg(test)]
#[path = "sessions.test.rs"]
mod tests;
