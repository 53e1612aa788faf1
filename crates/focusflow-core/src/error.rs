//! Core error types for focusflow-core.
//!
//! Timer-internal conditions (`NoTaskSelected`, `SessionTooShort`,
//! `InvalidPhaseTransition`) are recoverable by the caller. Only
//! persistence failures represent a durability risk and are surfaced to
//! the user-visible layer.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::Phase;

/// Core error type for focusflow-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A timer was started with no project selected.
    #[error("No task selected: pick a project before starting a timer")]
    NoTaskSelected,

    /// A finished interval was below the minimum session length.
    #[error("Session too short: {duration_ms}ms (minimum {min_ms}ms)")]
    SessionTooShort { duration_ms: u64, min_ms: u64 },

    /// An operation the focus cycle forbids in its current phase.
    #[error("Cannot {action} during the {phase} phase")]
    InvalidPhaseTransition { phase: Phase, action: &'static str },

    /// The backing store rejected a write. In-memory state is kept.
    #[error("Failed to persist state: {0}")]
    PersistenceWriteFailure(#[source] DatabaseError),

    /// The task owning the tracker has exited.
    #[error("Tracker task has stopped")]
    TrackerStopped,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded
    #[error("Corrupt value under key '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// The store refused the write
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// The platform data directory could not be created
    #[error("Cannot prepare data directory {path}: {message}")]
    DataDir { path: PathBuf, message: String },
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// A node id that does not exist where it was expected
    #[error("Unknown {level} '{id}'")]
    UnknownNode { level: &'static str, id: String },

    /// The same id appears twice in the hierarchy
    #[error("Duplicate node id '{0}' in hierarchy")]
    DuplicateId(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
