//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur with audit logging.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Storage error (lock poisoned, sink closed, etc.).
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O error writing or reading an audit file.
    #[error("audit file {path}: {source}")]
    Io {
        /// The audit file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
