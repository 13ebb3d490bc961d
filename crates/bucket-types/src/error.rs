//! Shared error types for the Bucket system.

use thiserror::Error;

/// Top-level error type for the Bucket system.
#[derive(Error, Debug)]
pub enum BucketError {
    /// The storage backend failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A commit lost a race against another writer of the same key.
    #[error("Commit conflict on key '{key}' (expected revision {expected}, found {actual})")]
    Conflict {
        /// The key being committed.
        key: String,
        /// The revision the writer read.
        expected: u64,
        /// The revision found at commit time.
        actual: u64,
    },

    /// No bucket is registered under this name.
    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BucketError {
    /// Whether retrying the whole read-modify-commit cycle may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, BucketError::Conflict { .. })
    }
}

/// Alias for Result with BucketError.
pub type BucketResult<T> = Result<T, BucketError>;
