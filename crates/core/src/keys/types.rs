use std::fmt;

use serde::{Deserialize, Serialize};

/// A partition key and sort key pair.
///
/// Ordering compares the partition key first, then the sort key, both
/// lexicographically by bytes, which is how the store orders them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl CompositeKey {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.partition_key, self.sort_key)
    }
}

/// Semantic components of a root entity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyParts {
    pub tenant: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
}

/// Semantic components of a child item key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildKeyParts {
    pub tenant: Option<String>,
    pub parent_type: String,
    pub parent_id: String,
    pub child_type: String,
    pub timestamp: String,
    pub child_id: String,
}

/// Semantic components of a secondary index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKeyParts {
    pub tenant: Option<String>,
    pub attribute_name: String,
    pub attribute_value: String,
    pub timestamp: String,
    pub entity_id: String,
}
