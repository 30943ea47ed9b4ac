//! Core error type
//!
//! "Not found" on update / delete is deliberately absent from most return
//! paths: the repository reports it as `None` or a no-op. `NotFound` exists
//! for front ends that turn a missing id into user feedback.

use thiserror::Error;

use crate::store::StorageError;

/// Errors returned by the link repository and shortcut configuration store
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied data failed validation (malformed URL, empty key, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No entity with the given id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Import payload is not a JSON array of links
    #[error("Invalid import format: {0}")]
    ImportFormat(String),

    /// Underlying store failed
    #[error(transparent)]
    Store(#[from] StorageError),

    /// Stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
