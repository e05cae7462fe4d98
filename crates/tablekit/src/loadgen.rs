//! Synthetic write load against a sharded partition.
//!
//! Events land on a uniformly random shard. Production writes go through
//! [`ShardRouter`](tablekit_core::shard::ShardRouter) instead, whose placement
//! is a pure function of the item id.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use rand::Rng;

use tablekit_core::keys::{sequence_token, CompositeKey, KeyCodec, KeyError};
use tablekit_core::shard::shard_partition_key;
use tablekit_core::storage::{Item, Operation, StorageClient};

use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryConfig, RetryError};

/// Shape of a synthetic event load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLoad {
    pub tenant: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
    pub child_type: String,
    pub shard_count: u32,
    pub events: u64,
}

impl EventLoad {
    /// `events` children of type `EVENT` under `entity_type`/`entity_id`.
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        shard_count: u32,
        events: u64,
    ) -> Self {
        Self {
            tenant: None,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            child_type: "EVENT".to_string(),
            shard_count,
            events,
        }
    }

    pub fn for_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_child_type(mut self, child_type: impl Into<String>) -> Self {
        self.child_type = child_type.into();
        self
    }
}

/// Builds the events of `load`, each on a random shard.
///
/// Sort keys are `<child_type>#<seq:010>#<n:06>`, so shards merge back into
/// sequence order.
pub fn synthetic_events<R: Rng + ?Sized>(
    codec: &KeyCodec,
    load: &EventLoad,
    rng: &mut R,
) -> std::result::Result<Vec<Item>, KeyError> {
    if load.shard_count == 0 {
        return Err(KeyError::InvalidShardCount(0));
    }
    let tenant = load.tenant.as_deref();

    (0..load.events)
        .map(|n| {
            let logical = codec.encode_child_key(
                tenant,
                &load.entity_type,
                &load.entity_id,
                &load.child_type,
                &format!("{n:06}"),
                &sequence_token(n),
            )?;
            let shard = rng.random_range(0..load.shard_count);
            let key = CompositeKey::new(
                shard_partition_key(&logical.partition_key, shard),
                logical.sort_key,
            );
            Ok(Item::new(key)
                .with_type(&load.child_type)
                .with_attribute("seq", n))
        })
        .collect()
}

/// Writes `items` with at most `concurrency` puts in flight.
///
/// Returns the number of items written. Stops at the first write that fails
/// after retries.
pub async fn write_all<S>(
    storage: &S,
    items: Vec<Item>,
    concurrency: usize,
    retry: &RetryConfig,
) -> Result<usize>
where
    S: StorageClient + ?Sized,
{
    let written = stream::iter(items)
        .map(|item| async move {
            with_retry(retry, "put_item", &item.key.partition_key, || {
                storage.put_item(&item)
            })
            .await
            .map_err(|RetryError { attempts, error }| {
                Error::storage(
                    Operation::Put,
                    item.key.partition_key.as_str(),
                    attempts,
                    error,
                )
            })
        })
        .buffer_unordered(concurrency.max(1))
        .try_fold(0usize, |written, ()| async move { Ok(written + 1) })
        .await?;

    tracing::info!(written, "synthetic load written");
    Ok(written)
}
