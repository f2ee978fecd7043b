//! Error taxonomy shared by the writer, the query builder and the runners.
//!
//! Row-level ([`StorageError::Deserialization`]) and runner-level
//! ([`StorageError::BackendConnection`]) failures are recovered where they
//! happen; every other variant is fatal to the operation that raised it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Bad or missing partition descriptor, unsupported mode.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single stored row could not be turned back into a variant.
    #[error("failed to deserialize row: {0}")]
    Deserialization(String),

    /// A backend failed while a runner was talking to it.
    #[error("backend '{backend}' failed: {reason}")]
    BackendConnection { backend: String, reason: String },

    /// Stored metadata does not describe columns the query layer needs.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The writer could not create a directory or flush a file.
    #[error("failed to write {path}: {reason}")]
    PartialWrite { path: PathBuf, reason: String },

    /// The caller's filter could not be compiled.
    #[error("invalid query: {0}")]
    Query(String),
}

impl StorageError {
    pub fn backend<B, R>(
        backend: B,
        reason: R,
    ) -> Self
    where
        B: Into<String>,
        R: ToString, {
        StorageError::BackendConnection {
            backend: backend.into(),
            reason:  reason.to_string(),
        }
    }

    pub fn partial_write<R: ToString>(
        path: impl Into<PathBuf>,
        reason: R,
    ) -> Self {
        StorageError::PartialWrite {
            path:   path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error only invalidates one row and the scan may go on.
    pub fn is_row_level(&self) -> bool {
        matches!(self, StorageError::Deserialization(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Deserialization(value.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(value: bincode::Error) -> Self {
        StorageError::Deserialization(value.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
