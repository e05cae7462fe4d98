//! Tenant-checked access to keys, items and queries.
//!
//! [`TenantBoundaryGuard`] holds the caller's authenticated tenant and refuses
//! any request that names another tenant or carries a key outside the
//! caller's `TENANT#<id>#` prefix. Rejections happen before any storage call.
//!
//! This is a local check. The store is still expected to enforce tenant
//! isolation on its own (e.g. an access policy on the partition key prefix).

use std::sync::Arc;

use tablekit_core::keys::{apply_projections, CompositeKey, KeyCodec, KeyError};
use tablekit_core::shard::{ShardPolicy, ShardRouter};
use tablekit_core::storage::{
    Direction, IndexScope, Item, Operation, SortKeyRange, StorageClient, StorageError,
};
use tablekit_core::tenant::TenantContext;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fanout::{FanoutQueryExecutor, FanoutRequest, QueryResult};
use crate::retry::{with_retry, RetryConfig, RetryError};

/// Reported as the requested tenant when a read would span every tenant.
pub const ALL_TENANTS: &str = "*";

/// Ordering and limits of a guarded read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub direction: Direction,
    /// Ceiling on items read from each partition.
    pub per_partition_limit: Option<usize>,
    /// Ceiling on merged items returned.
    pub limit: Option<usize>,
}

impl ReadOptions {
    pub fn descending() -> Self {
        Self {
            direction: Direction::Descending,
            ..Self::default()
        }
    }

    pub fn with_per_partition_limit(mut self, limit: usize) -> Self {
        self.per_partition_limit = Some(limit);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Fan-out request over `partitions` with these options.
    pub fn request(&self, partitions: Vec<String>, range: SortKeyRange) -> FanoutRequest {
        FanoutRequest::new(partitions)
            .with_range(range)
            .with_direction(self.direction)
            .with_per_partition_limit(self.per_partition_limit)
            .with_limit(self.limit)
    }
}

/// Tenant-scoped facade over the key codec, shard router, fan-out executor
/// and storage.
pub struct TenantBoundaryGuard<S> {
    context: TenantContext,
    codec: KeyCodec,
    router: ShardRouter,
    shards: ShardPolicy,
    retry: RetryConfig,
    storage: Arc<S>,
    executor: FanoutQueryExecutor<S>,
}

impl<S: StorageClient + 'static> TenantBoundaryGuard<S> {
    pub fn new(context: TenantContext, storage: Arc<S>, config: &Config) -> Self {
        let codec = KeyCodec::multi_tenant();
        Self {
            context,
            codec,
            router: ShardRouter::new(codec),
            shards: config.shard_policy.clone(),
            retry: config.retry.clone(),
            executor: FanoutQueryExecutor::from_config(Arc::clone(&storage), config),
            storage,
        }
    }

    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    pub fn executor(&self) -> &FanoutQueryExecutor<S> {
        &self.executor
    }

    // ========================================================================
    // Key construction
    // ========================================================================

    pub fn primary_key(
        &self,
        tenant: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<CompositeKey> {
        self.authorize(Operation::EncodeKey, tenant)?;
        Ok(self
            .codec
            .encode_primary_key(Some(tenant), entity_type, entity_id)?)
    }

    /// Key of a child item in its parent's logical partition.
    ///
    /// Write it with [`put`](Self::put), or with
    /// [`put_sharded`](Self::put_sharded) when the parent is sharded.
    pub fn child_key(
        &self,
        tenant: &str,
        parent_type: &str,
        parent_id: &str,
        child_type: &str,
        child_id: &str,
        timestamp: &str,
    ) -> Result<CompositeKey> {
        self.authorize(Operation::EncodeKey, tenant)?;
        Ok(self.codec.encode_child_key(
            Some(tenant),
            parent_type,
            parent_id,
            child_type,
            child_id,
            timestamp,
        )?)
    }

    /// Key of an entry in a tenant-scoped secondary index.
    pub fn index_key(
        &self,
        tenant: &str,
        attribute_name: &str,
        attribute_value: &str,
        timestamp: &str,
        entity_id: &str,
    ) -> Result<CompositeKey> {
        self.authorize(Operation::EncodeKey, tenant)?;
        Ok(self.codec.encode_index_key(
            Some(tenant),
            attribute_name,
            attribute_value,
            timestamp,
            entity_id,
        )?)
    }

    /// Physical partition keys of an entity: every shard when its type is
    /// sharded, otherwise the single logical partition.
    pub fn partition_keys(
        &self,
        tenant: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<String>> {
        self.authorize(Operation::EncodeKey, tenant)?;
        self.partitions_of(tenant, entity_type, entity_id)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Writes `item`, recomputing its index projections first.
    ///
    /// Returns the item as stored.
    pub async fn put(&self, tenant: &str, mut item: Item) -> Result<Item> {
        self.authorize(Operation::Put, tenant)?;
        self.authorize_key(Operation::Put, &item.key.partition_key)?;
        apply_projections(&self.codec, self.executor.schema(), &mut item)?;

        let partition_key = item.key.partition_key.clone();
        with_retry(&self.retry, "put_item", &partition_key, || {
            self.storage.put_item(&item)
        })
        .await
        .map_err(|RetryError { attempts, error }| {
            Error::storage(Operation::Put, partition_key.as_str(), attempts, error)
        })?;

        tracing::debug!(
            tenant = %self.context,
            partition_key = %item.key.partition_key,
            sort_key = %item.key.sort_key,
            "item written",
        );
        Ok(item)
    }

    /// Writes a child item keyed by its logical child key (see
    /// [`child_key`](Self::child_key)) to the shard its child id routes to.
    pub async fn put_sharded(&self, tenant: &str, mut item: Item) -> Result<Item> {
        self.authorize(Operation::Put, tenant)?;
        self.authorize_key(Operation::Put, &item.key.partition_key)?;

        let child = self.codec.decode_child_key(&item.key)?;
        let shard_count = self.shard_count(&child.parent_type)?;
        let assignment = self.router.route_write(
            Some(tenant),
            &child.parent_type,
            &child.parent_id,
            &child.child_id,
            shard_count,
        )?;
        tracing::trace!(
            logical_partition = %assignment.logical_partition,
            shard = assignment.shard_index,
            "routed sharded write",
        );
        item.key.partition_key = assignment.partition_key;

        self.put(tenant, item).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get(&self, tenant: &str, key: &CompositeKey) -> Result<Option<Item>> {
        self.authorize(Operation::Get, tenant)?;
        self.authorize_key(Operation::Get, &key.partition_key)?;

        with_retry(&self.retry, "get_item", &key.partition_key, || {
            self.storage.get_item(key)
        })
        .await
        .map_err(|RetryError { attempts, error }| {
            Error::storage(Operation::Get, key.partition_key.as_str(), attempts, error)
        })
    }

    /// Reads one logical partition (profile and children).
    pub async fn query_partition(
        &self,
        tenant: &str,
        entity_type: &str,
        entity_id: &str,
        range: SortKeyRange,
        options: ReadOptions,
    ) -> Result<QueryResult> {
        self.authorize(Operation::Query, tenant)?;
        let partition_key = self.codec.partition_key(Some(tenant), entity_type, entity_id)?;
        self.executor
            .query(&options.request(vec![partition_key], range))
            .await
    }

    /// Reads the children of one type, optionally between two timestamp
    /// tokens (inclusive).
    pub async fn query_children(
        &self,
        tenant: &str,
        parent_type: &str,
        parent_id: &str,
        child_type: &str,
        between: Option<(&str, &str)>,
        options: ReadOptions,
    ) -> Result<QueryResult> {
        self.authorize(Operation::Query, tenant)?;
        let range = match between {
            Some((from, to)) => self.codec.children_between(child_type, from, to)?,
            None => self.codec.children_of(child_type)?,
        };
        let partition_key = self.codec.partition_key(Some(tenant), parent_type, parent_id)?;
        self.executor
            .query(&options.request(vec![partition_key], range))
            .await
    }

    /// Reads every shard of an entity and merges the results.
    pub async fn query_sharded(
        &self,
        tenant: &str,
        entity_type: &str,
        entity_id: &str,
        range: SortKeyRange,
        options: ReadOptions,
    ) -> Result<QueryResult> {
        self.authorize(Operation::Query, tenant)?;
        let partitions = self.partitions_of(tenant, entity_type, entity_id)?;
        self.executor
            .query(&options.request(partitions, range))
            .await
    }

    /// Reads caller-supplied partition keys, each of which must carry the
    /// caller's tenant prefix.
    pub async fn query_partitions(
        &self,
        tenant: &str,
        partitions: Vec<String>,
        range: SortKeyRange,
        options: ReadOptions,
    ) -> Result<QueryResult> {
        self.authorize(Operation::Query, tenant)?;
        for partition_key in &partitions {
            self.authorize_key(Operation::Query, partition_key)?;
        }
        self.executor
            .query(&options.request(partitions, range))
            .await
    }

    /// Reads a tenant-scoped secondary index for one attribute value,
    /// optionally between two timestamp tokens (inclusive).
    ///
    /// Indexes spanning every tenant are refused.
    pub async fn query_index(
        &self,
        tenant: &str,
        index_name: &str,
        attribute_value: &str,
        between: Option<(&str, &str)>,
        options: ReadOptions,
    ) -> Result<QueryResult> {
        self.authorize(Operation::Query, tenant)?;
        let index = self
            .executor
            .schema()
            .index(index_name)
            .ok_or_else(|| Error::Storage {
                operation: Operation::Query,
                partition_key: String::new(),
                attempts: 0,
                source: StorageError::UnknownIndex(index_name.to_string()),
            })?;
        if index.scope == IndexScope::Global {
            return Err(self.reject(Operation::Query, ALL_TENANTS));
        }

        let partition_key =
            self.codec
                .index_partition_key(Some(tenant), &index.key_token, attribute_value)?;
        let range = match between {
            Some((from, to)) => self.codec.index_between(from, to)?,
            None => SortKeyRange::All,
        };
        let request = options
            .request(vec![partition_key], range)
            .on_index(index_name);
        self.executor.query(&request).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn authorize(&self, operation: Operation, tenant: &str) -> Result<()> {
        self.context
            .authorize(operation, tenant)
            .map_err(|_| self.reject(operation, tenant))
    }

    fn authorize_key(&self, operation: Operation, partition_key: &str) -> Result<()> {
        self.context
            .authorize_key(operation, partition_key)
            .map_err(|err| {
                tracing::warn!(
                    tenant = %self.context,
                    operation = %operation,
                    partition_key,
                    "rejected key outside the caller's tenant",
                );
                err.into()
            })
    }

    fn reject(&self, operation: Operation, requested: &str) -> Error {
        tracing::warn!(
            tenant = %self.context,
            operation = %operation,
            requested,
            "rejected cross-tenant request",
        );
        self.context.deny(operation, requested).into()
    }

    fn shard_count(&self, entity_type: &str) -> Result<u32> {
        self.shards.shard_count(entity_type).ok_or_else(|| {
            KeyError::InvalidIdentifier {
                component: "entity type",
                value: entity_type.to_string(),
                reason: "no shard count configured",
            }
            .into()
        })
    }

    fn partitions_of(
        &self,
        tenant: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<String>> {
        match self.shards.shard_count(entity_type) {
            Some(count) => Ok(self.router.enumerate_shard_keys(
                Some(tenant),
                entity_type,
                entity_id,
                count,
            )?),
            None => Ok(vec![self
                .codec
                .partition_key(Some(tenant), entity_type, entity_id)?]),
        }
    }
}
