//! Schema migrations.
//!
//! One ordered migration sequence. Applied versions are recorded in
//! `schema_version`; each pending migration runs inside its own transaction.

use rusqlite::Connection;

use crate::error::EngineError;
use crate::error::Result;

/// Ordered migrations. Never reorder or edit an entry once shipped — append.
const MIGRATIONS: &[&str] = &[
    // v1: core entities and operational tables
    "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY,
        applied_at INTEGER NOT NULL
    );

    CREATE TABLE file (
        repo TEXT NOT NULL,
        path TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        lang TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (repo, path)
    );

    CREATE TABLE span (
        id TEXT PRIMARY KEY,
        repo TEXT NOT NULL,
        path TEXT NOT NULL,
        byte_start INTEGER NOT NULL,
        byte_end INTEGER NOT NULL,
        kind TEXT NOT NULL,
        name TEXT,
        signature TEXT,
        doc TEXT,
        parents_json TEXT NOT NULL DEFAULT '[]',
        FOREIGN KEY (repo, path) REFERENCES file(repo, path) ON DELETE CASCADE
    );
    CREATE INDEX idx_span_file ON span(repo, path);
    CREATE INDEX idx_span_name ON span(name) WHERE name IS NOT NULL;

    CREATE TABLE chunk (
        id TEXT PRIMARY KEY,
        span_id TEXT NOT NULL REFERENCES span(id) ON DELETE CASCADE,
        repo TEXT NOT NULL,
        path TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX idx_chunk_span ON chunk(span_id);
    CREATE INDEX idx_chunk_repo ON chunk(repo);

    CREATE TABLE embedding (
        chunk_id TEXT NOT NULL REFERENCES chunk(id) ON DELETE CASCADE,
        model TEXT NOT NULL,
        dim INTEGER NOT NULL,
        vector BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (chunk_id, model)
    );
    CREATE INDEX idx_embedding_model ON embedding(model);

    CREATE VIRTUAL TABLE chunk_fts USING fts5(
        content,
        chunk_id UNINDEXED,
        repo UNINDEXED,
        path UNINDEXED,
        tokenize = 'porter unicode61'
    );

    CREATE TRIGGER chunk_fts_ai AFTER INSERT ON chunk BEGIN
        INSERT INTO chunk_fts(content, chunk_id, repo, path)
        VALUES (new.content, new.id, new.repo, new.path);
    END;
    CREATE TRIGGER chunk_fts_ad AFTER DELETE ON chunk BEGIN
        DELETE FROM chunk_fts WHERE chunk_id = old.id;
    END;
    CREATE TRIGGER chunk_fts_au AFTER UPDATE ON chunk BEGIN
        DELETE FROM chunk_fts WHERE chunk_id = old.id;
        INSERT INTO chunk_fts(content, chunk_id, repo, path)
        VALUES (new.content, new.id, new.repo, new.path);
    END;

    CREATE TABLE span_ref (
        src_span_id TEXT NOT NULL REFERENCES span(id) ON DELETE CASCADE,
        dst_path TEXT NOT NULL,
        byte_start INTEGER NOT NULL,
        byte_end INTEGER NOT NULL,
        kind TEXT NOT NULL,
        origin TEXT NOT NULL DEFAULT 'heuristic'
    );
    CREATE INDEX idx_span_ref_src ON span_ref(src_span_id);
    CREATE INDEX idx_span_ref_dst ON span_ref(dst_path);

    CREATE TABLE memory (
        id TEXT PRIMARY KEY,
        scope TEXT NOT NULL,
        repo TEXT,
        branch TEXT,
        kind TEXT NOT NULL,
        key TEXT,
        value TEXT NOT NULL,
        weight REAL NOT NULL DEFAULT 1.0,
        created_at INTEGER NOT NULL,
        expires_at INTEGER,
        source_json TEXT NOT NULL DEFAULT 'null'
    );
    CREATE INDEX idx_memory_scope ON memory(scope, repo);

    CREATE TABLE memory_link (
        src TEXT NOT NULL REFERENCES memory(id) ON DELETE CASCADE,
        dst TEXT NOT NULL REFERENCES memory(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        score REAL NOT NULL DEFAULT 0.0,
        PRIMARY KEY (src, dst, kind)
    );

    CREATE TABLE session (
        id TEXT PRIMARY KEY,
        tool TEXT NOT NULL,
        user TEXT NOT NULL,
        repo TEXT,
        branch TEXT,
        started_at INTEGER NOT NULL,
        finished_at INTEGER
    );

    CREATE TABLE interaction (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES session(id) ON DELETE CASCADE,
        ts INTEGER NOT NULL,
        query TEXT NOT NULL,
        bundle_id TEXT,
        satisfied INTEGER,
        notes TEXT
    );
    CREATE INDEX idx_interaction_session ON interaction(session_id);

    CREATE TABLE job_run (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        started_at INTEGER NOT NULL,
        finished_at INTEGER,
        status TEXT NOT NULL,
        error_text TEXT
    );

    CREATE TABLE rerank_cache (
        id TEXT PRIMARY KEY,
        provider TEXT NOT NULL,
        model TEXT NOT NULL,
        query TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        result_json TEXT NOT NULL
    );

    CREATE TABLE search_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        query TEXT NOT NULL,
        ts INTEGER NOT NULL,
        k INTEGER NOT NULL
    );

    CREATE TABLE packing_profile (
        repo TEXT NOT NULL,
        model TEXT NOT NULL,
        profile_json TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (repo, model)
    );

    CREATE TABLE policy_version (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at INTEGER NOT NULL,
        params_json TEXT NOT NULL,
        parent_id INTEGER REFERENCES policy_version(id)
    );
    ",
];

/// Apply all pending migrations.
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| EngineError::store_io("create schema_version", e))?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| EngineError::store_io("read schema_version", e))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = idx as i64 + 1;
        if version <= current {
            continue;
        }
        tracing::info!(version, "Applying store migration");
        conn.execute_batch("BEGIN")
            .map_err(|e| EngineError::store_io("begin migration", e))?;
        let applied = conn.execute_batch(sql).and_then(|()| {
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, strftime('%s','now'))",
                [version],
            )
            .map(|_| ())
        });
        match applied {
            Ok(()) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| EngineError::store_io("commit migration", e))?;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(EngineError::store_io(
                    format!("migration v{version}"),
                    e,
                ));
            }
        }
    }
    Ok(())
}
