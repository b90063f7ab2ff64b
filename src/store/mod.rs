//! Persistent storage
//!
//! Two actors own the SQLite connection: one for planning sessions (with
//! compare-and-swap versioning) and one for weekly target rows. Callers
//! talk to them through channel-backed handles, so all database access is
//! serialized without locks.

mod sessions;
mod targets;

pub use sessions::{Expected, MemorySessionStore, SessionManager, SessionStore};
pub use targets::TargetManager;

use thiserror::Error;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Version conflict: {0}")]
    VersionConflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Response from storage operations
pub type StoreResponse<T> = Result<T, StoreError>;
