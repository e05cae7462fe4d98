use thiserror::Error;

/// Errors that can occur when encoding or decoding keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid {component} '{value}': {reason}")]
    InvalidIdentifier {
        component: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("Malformed key '{key}': {reason}")]
    MalformedKey { key: String, reason: &'static str },
    #[error("Invalid shard count {0}: must be at least 1")]
    InvalidShardCount(u32),
}

impl KeyError {
    pub(crate) fn invalid(component: &'static str, value: &str, reason: &'static str) -> Self {
        KeyError::InvalidIdentifier {
            component,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn malformed(key: &str, reason: &'static str) -> Self {
        KeyError::MalformedKey {
            key: key.to_string(),
            reason,
        }
    }
}

/// Result type for key operations.
pub type Result<T> = std::result::Result<T, KeyError>;
