//! Error types for wrapitup
//!
//! Two families per the persistence contract:
//! - Recoverable errors (validation, lookup, config) — the caller surfaces
//!   a message and the collection is left unmodified.
//! - Persistence errors — asynchronous with respect to the in-memory
//!   model; the optimistic mutation already happened and is never rolled
//!   back, the caller decides whether to retry or notify.

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskId;

/// Main error type for wrapitup operations
#[derive(Error, Debug)]
pub enum Error {
    // Recoverable (validation / lookup / config)
    #[error("Task text cannot be empty")]
    EmptyText,

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Persistence failures
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Remote store rejected the write: {0}")]
    RemoteRejected(String),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Whether this error came from the persistence layer.
    ///
    /// Persistence failures never invalidate the in-memory collection;
    /// they only mean the last snapshot may not be durable yet.
    pub fn is_persistence(&self) -> bool {
        match self {
            Error::EmptyText
            | Error::TaskNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => false,

            Error::StorageUnavailable(_)
            | Error::RemoteRejected(_)
            | Error::LockFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => true,
        }
    }
}

/// Result type alias for wrapitup operations
pub type Result<T> = std::result::Result<T, Error>;
