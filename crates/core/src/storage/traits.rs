use async_trait::async_trait;

use crate::keys::CompositeKey;

use super::{Item, RangeQuery, Result};

/// The storage capability the library is built on.
///
/// Implementations must return range query results ordered by the queried
/// sort key in the requested direction.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Writes an item, replacing any item with the same key.
    async fn put_item(&self, item: &Item) -> Result<()>;

    /// Gets an item by its primary key.
    async fn get_item(&self, key: &CompositeKey) -> Result<Option<Item>>;

    /// Reads one partition of the table or of a secondary index.
    async fn range_query(&self, query: &RangeQuery) -> Result<Vec<Item>>;
}
