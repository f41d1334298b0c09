//! Error types for baton-state

use thiserror::Error;

/// Errors raised by a [`StateStore`](crate::StateStore) implementation.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A backing document does not exist yet
    #[error("coordination state not initialized: {document} missing")]
    NotInitialized { document: String },

    /// Role name outside the closed role set
    #[error("unknown role: {name}")]
    UnknownRole { name: String },

    /// Filesystem failure while reading or writing a document
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document exists but cannot be decoded
    #[error("malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// True when the error means "run initialization first".
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, StorageError::NotInitialized { .. })
    }
}
