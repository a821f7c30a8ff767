//! Error types for store bootstrap, migration, and data access.
//!
//! Provides a unified error type covering path resolution, initialization,
//! migration, and per-statement read/write failures.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur while initializing or accessing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The application directory or store file path could not be resolved.
    #[error("cannot resolve store path: {0}")]
    PathResolution(#[from] stowage_config::ConfigError),

    /// Initialization failed; wraps the migration or table-creation failure.
    #[error("database initialization failed: {0}")]
    Initialization(#[source] Box<StoreError>),

    /// Two registered migrations share a number.
    #[error("duplicate migration number: {0}")]
    DuplicateMigrationNumber(u32),

    /// The ledger already records this migration number.
    #[error("migration {0} has already been applied")]
    MigrationAlreadyApplied(u32),

    /// A migration's own schema change failed and was rolled back.
    #[error("migration {number} ({description}) failed: {source}")]
    MigrationFailed {
        number: u32,
        description: String,
        #[source]
        source: rusqlite::Error,
    },

    /// An insert, update, or delete statement failed.
    #[error("write to {entity} failed: {source}")]
    Write {
        entity: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A select statement failed.
    #[error("read from {entity} failed: {source}")]
    Read {
        entity: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A caller-supplied argument was rejected before touching the store.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was cancelled; any open transaction was rolled back.
    #[error("operation cancelled")]
    Cancelled,

    /// Entity metadata or row decoding failure.
    #[error("entity error: {0}")]
    Entity(#[from] stowage_core::CoreError),

    /// SQLite failure outside a specific read or write.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking worker panicked or was aborted.
    #[error("background task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// The SQLite error underneath this error, if any.
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            StoreError::MigrationFailed { source, .. }
            | StoreError::Write { source, .. }
            | StoreError::Read { source, .. }
            | StoreError::Database(source) => Some(source),
            StoreError::Initialization(inner) => inner.sqlite_error(),
            _ => None,
        }
    }

    /// Returns `true` if a SQLite interrupt caused this error.
    pub fn is_interrupted(&self) -> bool {
        self.sqlite_error()
            .and_then(rusqlite::Error::sqlite_error_code)
            .is_some_and(|code| code == ErrorCode::OperationInterrupted)
    }

    /// Strips any [`Initialization`](Self::Initialization) wrappers.
    pub fn root(&self) -> &StoreError {
        match self {
            StoreError::Initialization(inner) => inner.root(),
            other => other,
        }
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
