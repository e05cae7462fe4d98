//! In-memory storage implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tablekit_core::keys::CompositeKey;
use tablekit_core::storage::{Item, RangeQuery, Result, StorageClient, StorageError, TableSchema};

/// In-memory storage backend.
///
/// Cloning shares the underlying data. Data is lost when the last clone is
/// dropped.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    items: Arc<RwLock<BTreeMap<CompositeKey, Item>>>,
    schema: Arc<TableSchema>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(TableSchema::default())
    }
}

impl InMemoryStorage {
    /// Creates an empty store whose index reads follow `schema`.
    pub fn new(schema: TableSchema) -> Self {
        Self {
            items: Arc::new(RwLock::new(BTreeMap::new())),
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    async fn query_table(&self, query: &RangeQuery) -> Vec<Item> {
        let items = self.items.read().await;
        let start = CompositeKey::new(query.partition_key.as_str(), "");
        items
            .range(start..)
            .take_while(|(key, _)| key.partition_key == query.partition_key)
            .filter(|(key, _)| query.range.contains(&key.sort_key))
            .map(|(_, item)| item.clone())
            .collect()
    }

    async fn query_index(&self, index_name: &str, query: &RangeQuery) -> Result<Vec<Item>> {
        let index = self
            .schema
            .index(index_name)
            .ok_or_else(|| StorageError::UnknownIndex(index_name.to_string()))?;

        let items = self.items.read().await;
        let mut matched: Vec<(&str, &Item)> = items
            .values()
            .filter(|item| {
                item.string_attribute(&index.partition_attribute)
                    == Some(query.partition_key.as_str())
            })
            .filter_map(|item| {
                let sort_key = item.string_attribute(&index.sort_attribute)?;
                query.range.contains(sort_key).then_some((sort_key, item))
            })
            .collect();
        // Stable sort keeps base-table key order among equal index keys.
        matched.sort_by(|(a, _), (b, _)| a.cmp(b));

        Ok(matched.into_iter().map(|(_, item)| item.clone()).collect())
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn put_item(&self, item: &Item) -> Result<()> {
        let mut items = self.items.write().await;
        items.insert(item.key.clone(), item.clone());
        Ok(())
    }

    async fn get_item(&self, key: &CompositeKey) -> Result<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.get(key).cloned())
    }

    async fn range_query(&self, query: &RangeQuery) -> Result<Vec<Item>> {
        let mut items = match &query.index {
            None => self.query_table(query).await,
            Some(index) => self.query_index(index, query).await?,
        };
        if !query.direction.is_ascending() {
            items.reverse();
        }
        if let Some(limit) = query.limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}
