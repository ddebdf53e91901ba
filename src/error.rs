//! Error types shared by the engine.
//!
//! Expected failures (bad input, unknown ids, a full store) are values, never panics.
//! Every operation validates completely before it mutates, so an `Err` always means
//! the aggregate is unchanged.

use thiserror::Error;

/// Failures reading or writing the key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("the stored snapshot could not be read at startup; changes are kept in memory only")]
    SnapshotUnreadable,
}

/// Failures returned by task store operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub fn validation(reason: impl Into<String>) -> Self {
        EngineError::Validation(reason.into())
    }

    pub fn task_not_found(id: &str) -> Self {
        EngineError::NotFound { kind: "task", id: id.to_string() }
    }

    pub fn project_not_found(id: &str) -> Self {
        EngineError::NotFound { kind: "project", id: id.to_string() }
    }

    pub fn status_not_found(id: &str) -> Self {
        EngineError::NotFound { kind: "status", id: id.to_string() }
    }

    pub fn owner_not_found(name: &str) -> Self {
        EngineError::NotFound { kind: "owner", id: name.to_string() }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
