use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keys::CompositeKey;

/// Attribute holding the entity type of an item in the single table.
pub const TYPE_ATTRIBUTE: &str = "type";

/// Non-key attributes of an item.
pub type Attributes = BTreeMap<String, Value>;

/// A stored record: its primary key plus attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: CompositeKey,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Item {
    pub fn new(key: CompositeKey) -> Self {
        Self {
            key,
            attributes: Attributes::new(),
        }
    }

    /// Sets an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the `type` attribute.
    pub fn with_type(self, entity_type: &str) -> Self {
        self.with_attribute(TYPE_ATTRIBUTE, entity_type)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns an attribute if it is a string.
    pub fn string_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.string_attribute(TYPE_ATTRIBUTE)
    }
}

/// Sort order of a range read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn is_ascending(self) -> bool {
        self == Direction::Ascending
    }

    /// Orients an ascending comparison to this direction.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// Sort key condition of a range read. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKeyRange {
    #[default]
    All,
    Exact(String),
    BeginsWith(String),
    Between {
        start: String,
        end: String,
    },
    AtLeast(String),
    AtMost(String),
}

impl SortKeyRange {
    /// Whether `sort_key` satisfies the condition.
    pub fn contains(&self, sort_key: &str) -> bool {
        match self {
            SortKeyRange::All => true,
            SortKeyRange::Exact(value) => sort_key == value,
            SortKeyRange::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            SortKeyRange::Between { start, end } => {
                sort_key >= start.as_str() && sort_key <= end.as_str()
            }
            SortKeyRange::AtLeast(start) => sort_key >= start.as_str(),
            SortKeyRange::AtMost(end) => sort_key <= end.as_str(),
        }
    }
}

/// A single-partition range read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// Secondary index to read; `None` reads the base table.
    pub index: Option<String>,
    pub partition_key: String,
    pub range: SortKeyRange,
    pub direction: Direction,
    /// Maximum number of items returned.
    pub limit: Option<usize>,
}

impl RangeQuery {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            index: None,
            partition_key: partition_key.into(),
            range: SortKeyRange::All,
            direction: Direction::Ascending,
            limit: None,
        }
    }

    pub fn on_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_range(mut self, range: SortKeyRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// The kind of operation a request performs, carried in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    EncodeKey,
    Put,
    Get,
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::EncodeKey => "encode key",
            Operation::Put => "put",
            Operation::Get => "get",
            Operation::Query => "query",
        };
        f.write_str(name)
    }
}
