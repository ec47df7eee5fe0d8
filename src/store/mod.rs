//! Embedded single-writer store.
//!
//! One SQLite file holds every persisted entity: files, spans, chunks,
//! embeddings, the FTS projection, reference edges, memories, sessions and
//! the operational tables. All writes are serialized through one connection
//! guarded by a mutex; reads go through the same connection via short
//! critical sections executed on the blocking pool.
//!
//! Referential integrity is enforced with `ON DELETE CASCADE` foreign keys
//! (file ⇢ span ⇢ chunk ⇢ embedding, span ⇢ reference) and FTS triggers, so
//! removing a file leaves no orphans.

mod files;
mod memory;
mod schema;
mod search;
mod sessions;

pub use memory::MemoryFilter;
pub use memory::MemoryLink;
pub use search::FtsHit;
pub use search::SymbolHit;
pub use search::VectorHit;
pub use sessions::JobStatus;
pub use sessions::RerankCacheRow;

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use tokio::task::spawn_blocking;

use crate::error::EngineError;
use crate::error::Result;

/// Handle to the embedded store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Store {
    /// Open or create the store at `data_dir/ctxpack.db` and run migrations.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("ctxpack.db");
        let conn = Connection::open(&db_path)?;
        Self::init(conn, db_path)
    }

    /// Open an in-memory store. Used by tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        // recursive_triggers makes foreign-key cascade deletes fire the FTS
        // maintenance triggers, which the no-orphans invariant depends on.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA recursive_triggers = ON;",
        )
        .map_err(|e| EngineError::store_io("pragma init", e))?;

        schema::apply_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Database file path (`:memory:` for ephemeral stores).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure against the connection on the blocking pool.
    ///
    /// Writes and reads share one connection, which serializes writes per the
    /// single-writer model; the mutex critical section is the length of the
    /// closure.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| EngineError::StoreCorruption {
                detail: "store mutex poisoned".to_string(),
            })?;
            f(&guard)
        })
        .await
        .map_err(|e| EngineError::store_io("spawn_blocking", e))?
    }

    /// Health probe: full integrity and foreign-key check.
    ///
    /// A failing check is fatal to the process; the caller is expected to
    /// abort rather than continue on a corrupt store.
    pub async fn integrity_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            let verdict: String = conn
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))
                .map_err(|e| EngineError::store_io("integrity_check", e))?;
            if verdict != "ok" {
                return Err(EngineError::StoreCorruption { detail: verdict });
            }
            let mut stmt = conn
                .prepare("PRAGMA foreign_key_check")
                .map_err(|e| EngineError::store_io("foreign_key_check", e))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| EngineError::store_io("foreign_key_check", e))?;
            if let Some(row) = rows.next().map_err(|e| EngineError::store_io("foreign_key_check", e))? {
                let table: String = row.get(0).unwrap_or_default();
                return Err(EngineError::StoreCorruption {
                    detail: format!("dangling foreign key in `{table}`"),
                });
            }
            Ok(())
        })
        .await
    }

    /// Current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .map_err(|e| EngineError::store_io("schema_version", e))
        })
        .await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
