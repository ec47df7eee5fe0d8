//! Error types for the context-assembly engine.
//!
//! The taxonomy is deliberately small: configuration problems are fatal at
//! startup, store constraint/corruption failures are fatal to the operation,
//! provider failures distinguish transient (retryable) from permanent, and
//! cache failures are always recoverable by falling through to the origin.
//!
//! Budget exhaustion is NOT an error — see `tokenizer::budget::BudgetExceeded`.

use std::path::PathBuf;

use thiserror::Error;

/// Engine-wide error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration value. Fatal at startup.
    #[error("invalid config `{field}`: {cause}")]
    Config { field: String, cause: String },

    /// Configuration file could not be parsed.
    #[error("failed to parse config {path:?}: {cause}")]
    ConfigParse { path: PathBuf, cause: String },

    /// Store I/O failure (disk, locking). Surfaces as transient.
    #[error("store i/o during {operation}: {cause}")]
    StoreIo { operation: String, cause: String },

    /// Store constraint violation (unique key, foreign key, check).
    #[error("store constraint during {operation}: {cause}")]
    StoreConstraint { operation: String, cause: String },

    /// Store corruption detected. Fatal to the process.
    #[error("store corruption: {detail}")]
    StoreCorruption { detail: String },

    /// Transient provider failure (reranker, embedding). Retryable.
    #[error("provider `{provider}` transient failure: {cause}")]
    ProviderTransient { provider: String, cause: String },

    /// Permanent provider failure. Must be surfaced to the caller.
    #[error("provider `{provider}` permanent failure: {cause}")]
    ProviderPermanent { provider: String, cause: String },

    /// A lane or the overall assembly exceeded its deadline.
    #[error("timeout in {stage} after {elapsed_ms}ms")]
    Timeout { stage: String, elapsed_ms: u64 },

    /// Cache-layer failure. Callers fall through to the origin.
    #[error("cache `{namespace}` failure: {cause}")]
    Cache { namespace: String, cause: String },
}

/// Coarse error kind, used for logging and exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    Constraint,
    Corruption,
    Transient,
    Permanent,
    Timeout,
    Cache,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Constraint => "constraint",
            ErrorKind::Corruption => "corruption",
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cache => "cache",
        }
    }
}

impl EngineError {
    /// Convenience constructor for store I/O errors.
    pub fn store_io(operation: impl Into<String>, cause: impl ToString) -> Self {
        EngineError::StoreIo {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Convenience constructor for constraint violations.
    pub fn store_constraint(operation: impl Into<String>, cause: impl ToString) -> Self {
        EngineError::StoreConstraint {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Config { .. } | EngineError::ConfigParse { .. } => ErrorKind::Config,
            EngineError::StoreIo { .. } => ErrorKind::Io,
            EngineError::StoreConstraint { .. } => ErrorKind::Constraint,
            EngineError::StoreCorruption { .. } => ErrorKind::Corruption,
            EngineError::ProviderTransient { .. } => ErrorKind::Transient,
            EngineError::ProviderPermanent { .. } => ErrorKind::Permanent,
            EngineError::Timeout { .. } => ErrorKind::Timeout,
            EngineError::Cache { .. } => ErrorKind::Cache,
        }
    }

    /// Whether a single retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Io | ErrorKind::Transient | ErrorKind::Timeout
        )
    }

    /// Process exit code for commands driving the core.
    ///
    /// 0 SUCCESS, 2 CONFIG, 3 IO, 4 NETWORK, 5 TIMEOUT, 6 INTERNAL.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => 2,
            ErrorKind::Io | ErrorKind::Constraint => 3,
            ErrorKind::Transient | ErrorKind::Permanent => 4,
            ErrorKind::Timeout => 5,
            ErrorKind::Corruption | ErrorKind::Cache => 6,
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _) => match code.code {
                rusqlite::ErrorCode::ConstraintViolation => {
                    EngineError::store_constraint("sqlite", err)
                }
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    EngineError::StoreCorruption {
                        detail: err.to_string(),
                    }
                }
                _ => EngineError::store_io("sqlite", err),
            },
            _ => EngineError::store_io("sqlite", err),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::store_io("fs", err)
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
#[path = "error.test.rs"]
mod tests;
