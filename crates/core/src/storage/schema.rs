//! Table schema (pure data).

use serde::{Deserialize, Serialize};

use super::Item;

/// Whether an index partitions by tenant or spans all tenants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexScope {
    #[default]
    Tenant,
    Global,
}

/// A secondary index projected from one item attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name as known to the store, e.g. `GSI1`.
    pub name: String,
    /// Item attribute holding the index partition key, e.g. `GSI1PK`.
    pub partition_attribute: String,
    /// Item attribute holding the index sort key, e.g. `GSI1SK`.
    pub sort_attribute: String,
    /// Attribute the projection is derived from, e.g. `status`.
    pub source_attribute: String,
    /// Token written before the attribute value, e.g. `STATUS`.
    pub key_token: String,
    /// Attribute supplying the sort timestamp for root items.
    pub timestamp_attribute: Option<String>,
    pub scope: IndexScope,
}

impl IndexDefinition {
    /// Tenant-scoped index named `name` over `source_attribute`.
    ///
    /// Key attributes default to `<name>PK` / `<name>SK` and the key token to
    /// the upper-cased attribute name.
    pub fn new(name: impl Into<String>, source_attribute: impl Into<String>) -> Self {
        let name = name.into();
        let source_attribute = source_attribute.into();
        Self {
            partition_attribute: format!("{name}PK"),
            sort_attribute: format!("{name}SK"),
            key_token: source_attribute.to_uppercase(),
            timestamp_attribute: None,
            scope: IndexScope::Tenant,
            name,
            source_attribute,
        }
    }

    pub fn global(mut self) -> Self {
        self.scope = IndexScope::Global;
        self
    }

    pub fn with_key_attributes(
        mut self,
        partition_attribute: impl Into<String>,
        sort_attribute: impl Into<String>,
    ) -> Self {
        self.partition_attribute = partition_attribute.into();
        self.sort_attribute = sort_attribute.into();
        self
    }

    pub fn with_key_token(mut self, key_token: impl Into<String>) -> Self {
        self.key_token = key_token.into();
        self
    }

    pub fn with_timestamp_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.timestamp_attribute = Some(attribute.into());
        self
    }
}

/// Key attribute names of the table and its indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub partition_attribute: String,
    pub sort_attribute: String,
    pub indexes: Vec<IndexDefinition>,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            partition_attribute: "PK".to_string(),
            sort_attribute: "SK".to_string(),
            indexes: Vec::new(),
        }
    }
}

impl TableSchema {
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Returns the key an item is ordered by when read through `index`
    /// (or the base table when `None`).
    pub fn sort_key_of<'a>(&self, index: Option<&str>, item: &'a Item) -> Option<&'a str> {
        match index {
            None => Some(item.key.sort_key.as_str()),
            Some(name) => {
                let index = self.index(name)?;
                item.string_attribute(&index.sort_attribute)
            }
        }
    }

    /// Returns the partition key an item belongs to within `index`.
    pub fn partition_key_of<'a>(&self, index: Option<&str>, item: &'a Item) -> Option<&'a str> {
        match index {
            None => Some(item.key.partition_key.as_str()),
            Some(name) => {
                let index = self.index(name)?;
                item.string_attribute(&index.partition_attribute)
            }
        }
    }
}
