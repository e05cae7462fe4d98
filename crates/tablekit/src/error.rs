use thiserror::Error;

use tablekit_core::keys::KeyError;
use tablekit_core::storage::{Operation, StorageError};
use tablekit_core::tenant::TenantError;

/// A partition read that failed after exhausting its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    pub partition_key: String,
    pub attempts: u32,
    pub error: StorageError,
}

/// Errors surfaced by the tablekit shell.
///
/// Storage variants carry the operation, partition key and attempt count so
/// callers can decide on their own retries or alerts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("Cross-tenant access denied: tenant '{caller}' attempted {operation} on tenant '{requested}'")]
    CrossTenantAccessDenied {
        operation: Operation,
        caller: String,
        requested: String,
    },

    #[error(
        "Partial fan-out failure during {operation}: {} of {} partitions failed, {} aborted",
        failed.len(),
        succeeded.len() + failed.len() + aborted.len(),
        aborted.len()
    )]
    PartialFanoutFailure {
        operation: Operation,
        succeeded: Vec<String>,
        failed: Vec<PartitionFailure>,
        /// Partitions still in flight when the fan-out gave up.
        aborted: Vec<String>,
    },

    #[error("Storage unavailable during {operation} on '{partition_key}' after {attempts} attempts: {source}")]
    StorageUnavailable {
        operation: Operation,
        partition_key: String,
        attempts: u32,
        source: StorageError,
    },

    #[error("Storage error during {operation} on '{partition_key}': {source}")]
    Storage {
        operation: Operation,
        partition_key: String,
        attempts: u32,
        source: StorageError,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Wraps a storage error, classifying exhausted transient failures as
    /// `StorageUnavailable`.
    pub fn storage(
        operation: Operation,
        partition_key: impl Into<String>,
        attempts: u32,
        source: StorageError,
    ) -> Self {
        let partition_key = partition_key.into();
        if source.is_transient() {
            Error::StorageUnavailable {
                operation,
                partition_key,
                attempts,
                source,
            }
        } else {
            Error::Storage {
                operation,
                partition_key,
                attempts,
                source,
            }
        }
    }

    /// Whether the caller may retry the whole request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable { .. } | Error::PartialFanoutFailure { .. }
        )
    }
}

impl From<TenantError> for Error {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::CrossTenantAccessDenied {
                operation,
                caller,
                requested,
            } => Error::CrossTenantAccessDenied {
                operation,
                caller,
                requested,
            },
        }
    }
}

/// Result type for tablekit operations.
pub type Result<T> = std::result::Result<T, Error>;
