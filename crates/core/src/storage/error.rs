use thiserror::Error;

/// Errors reported by a [`StorageClient`](super::StorageClient).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Throttled: {0}")]
    Throttled(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unknown index: {0}")]
    UnknownIndex(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying the same request may succeed.
    ///
    /// Only throttling and transient backend failures qualify; everything else
    /// indicates a caller or policy problem.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Throttled(_) | StorageError::Unavailable(_))
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
