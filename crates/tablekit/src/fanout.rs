//! Concurrent multi-partition range reads.
//!
//! A fan-out issues one range read per partition key (shards of one logical
//! partition, or partitions of different entities), bounded by a semaphore,
//! and merges the per-partition results with a k-way merge. The merged order
//! depends only on the sort keys and the order of the requested partitions,
//! never on which read finished first.
//!
//! Dropping the query future aborts every read still in flight.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use tablekit_core::merge::merge_sorted;
use tablekit_core::storage::{
    Direction, Item, Operation, RangeQuery, SortKeyRange, StorageClient, StorageError, TableSchema,
};

use crate::config::Config;
use crate::error::{Error, PartitionFailure, Result};
use crate::retry::{with_retry, RetryConfig, RetryError};

/// What a fan-out does when some partitions fail after retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartialFailurePolicy {
    /// Fail the whole call with [`Error::PartialFanoutFailure`].
    #[default]
    FailFast,
    /// Return the merged items of the partitions that succeeded, plus the
    /// failed partitions.
    ReturnPartial,
}

impl fmt::Display for PartialFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialFailurePolicy::FailFast => f.write_str("fail-fast"),
            PartialFailurePolicy::ReturnPartial => f.write_str("return-partial"),
        }
    }
}

impl FromStr for PartialFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "fail-fast" => Ok(PartialFailurePolicy::FailFast),
            "return-partial" => Ok(PartialFailurePolicy::ReturnPartial),
            other => Err(format!(
                "unknown partial failure policy '{other}', expected fail-fast or return-partial"
            )),
        }
    }
}

/// A range read over several partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutRequest {
    /// Secondary index to read; `None` reads the base table.
    pub index: Option<String>,
    /// Partition keys in merge priority order.
    pub partitions: Vec<String>,
    pub range: SortKeyRange,
    pub direction: Direction,
    /// Ceiling on items read from each partition.
    pub per_partition_limit: Option<usize>,
    /// Ceiling on merged items returned.
    pub limit: Option<usize>,
}

impl FanoutRequest {
    pub fn new(partitions: Vec<String>) -> Self {
        Self {
            partitions,
            ..Self::default()
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

    pub fn with_per_partition_limit(mut self, limit: Option<usize>) -> Self {
        self.per_partition_limit = limit;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn partition_query(&self, partition_key: &str) -> RangeQuery {
        RangeQuery {
            index: self.index.clone(),
            partition_key: partition_key.to_string(),
            range: self.range.clone(),
            direction: self.direction,
            limit: self.per_partition_limit,
        }
    }
}

/// Merged items plus the partitions that could not be read.
///
/// `failed_partitions` is only ever non-empty under
/// [`PartialFailurePolicy::ReturnPartial`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub items: Vec<Item>,
    pub failed_partitions: Vec<PartitionFailure>,
}

impl QueryResult {
    /// Whether every requested partition was read.
    pub fn is_complete(&self) -> bool {
        self.failed_partitions.is_empty()
    }

    pub fn failed_partition_keys(&self) -> Vec<&str> {
        self.failed_partitions
            .iter()
            .map(|failure| failure.partition_key.as_str())
            .collect()
    }
}

/// Reads many partitions concurrently through a [`StorageClient`].
pub struct FanoutQueryExecutor<S> {
    storage: Arc<S>,
    schema: Arc<TableSchema>,
    retry: RetryConfig,
    policy: PartialFailurePolicy,
    max_concurrency: usize,
}

impl<S> Clone for FanoutQueryExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            schema: Arc::clone(&self.schema),
            retry: self.retry.clone(),
            policy: self.policy,
            max_concurrency: self.max_concurrency,
        }
    }
}

impl<S: StorageClient + 'static> FanoutQueryExecutor<S> {
    pub fn new(storage: Arc<S>, schema: TableSchema) -> Self {
        Self {
            storage,
            schema: Arc::new(schema),
            retry: RetryConfig::default(),
            policy: PartialFailurePolicy::default(),
            max_concurrency: 16,
        }
    }

    /// Executor configured from `config` (schema, retry, policy, concurrency).
    pub fn from_config(storage: Arc<S>, config: &Config) -> Self {
        Self::new(storage, config.schema.clone())
            .with_retry(config.retry.clone())
            .with_policy(config.partial_failure_policy)
            .with_max_concurrency(config.max_concurrency)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_policy(mut self, policy: PartialFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Caps the partition reads in flight. Zero acts as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn policy(&self) -> PartialFailurePolicy {
        self.policy
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Reads every partition of `request` and merges the results.
    ///
    /// Non-transient partition errors fail the call immediately. Transient
    /// errors are retried per partition; a partition that still fails is
    /// handled by the configured [`PartialFailurePolicy`].
    pub async fn query(&self, request: &FanoutRequest) -> Result<QueryResult> {
        let total = request.partitions.len();
        if total == 0 {
            return Ok(QueryResult::default());
        }
        if let Some(index) = &request.index {
            if self.schema.index(index).is_none() {
                return Err(Error::Storage {
                    operation: Operation::Query,
                    partition_key: request.partitions[0].clone(),
                    attempts: 0,
                    source: StorageError::UnknownIndex(index.clone()),
                });
            }
        }

        tracing::debug!(
            partitions = total,
            index = ?request.index,
            direction = ?request.direction,
            policy = %self.policy,
            "fan-out query started",
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut reads = JoinSet::new();
        for (position, partition_key) in request.partitions.iter().enumerate() {
            let storage = Arc::clone(&self.storage);
            let semaphore = Arc::clone(&semaphore);
            let retry = self.retry.clone();
            let query = request.partition_query(partition_key);
            reads.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = with_retry(&retry, "range_query", &query.partition_key, || {
                    storage.range_query(&query)
                })
                .await;
                (position, outcome)
            });
        }

        let mut pages: Vec<Option<Vec<Item>>> = (0..total).map(|_| None).collect();
        let mut failures: Vec<(usize, PartitionFailure)> = Vec::new();

        while let Some(joined) = reads.join_next().await {
            let (position, outcome) = match joined {
                Ok(read) => read,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => return Err(Error::Cancelled),
            };
            let partition_key = &request.partitions[position];

            match outcome {
                Ok(items) => {
                    tracing::trace!(
                        partition_key = %partition_key,
                        items = items.len(),
                        "partition read",
                    );
                    pages[position] = Some(items);
                }
                Err(RetryError { attempts, error }) if !error.is_transient() => {
                    tracing::warn!(
                        partition_key = %partition_key,
                        attempts,
                        error = %error,
                        "partition read failed, aborting fan-out",
                    );
                    return Err(Error::storage(Operation::Query, partition_key, attempts, error));
                }
                Err(RetryError { attempts, error }) => {
                    tracing::warn!(
                        partition_key = %partition_key,
                        attempts,
                        error = %error,
                        "partition read failed after retries",
                    );
                    let failure = PartitionFailure {
                        partition_key: partition_key.clone(),
                        attempts,
                        error,
                    };
                    if self.policy == PartialFailurePolicy::FailFast {
                        return Err(fail_fast(request, &pages, failure));
                    }
                    failures.push((position, failure));
                }
            }
        }

        failures.sort_by_key(|(position, _)| *position);
        let failed_partitions: Vec<PartitionFailure> =
            failures.into_iter().map(|(_, failure)| failure).collect();

        if failed_partitions.len() == total {
            let first = &failed_partitions[0];
            return Err(Error::storage(
                Operation::Query,
                first.partition_key.clone(),
                first.attempts,
                first.error.clone(),
            ));
        }

        let index = request.index.as_deref();
        let schema = &self.schema;
        let items = merge_sorted(
            pages.into_iter().flatten().collect(),
            request.direction,
            request.limit,
            |item| {
                schema
                    .sort_key_of(index, item)
                    .unwrap_or_default()
                    .to_string()
            },
        );

        tracing::debug!(
            partitions = total,
            failed = failed_partitions.len(),
            items = items.len(),
            "fan-out query finished",
        );

        Ok(QueryResult {
            items,
            failed_partitions,
        })
    }

    /// Like [`query`](Self::query), but gives up as soon as `cancel`
    /// completes.
    ///
    /// On cancellation every read still in flight is aborted and no partial
    /// results are returned.
    pub async fn query_until<C>(&self, request: &FanoutRequest, cancel: C) -> Result<QueryResult>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::debug!(partitions = request.partitions.len(), "fan-out query cancelled");
                Err(Error::Cancelled)
            }
            result = self.query(request) => result,
        }
    }
}

fn fail_fast(
    request: &FanoutRequest,
    pages: &[Option<Vec<Item>>],
    failure: PartitionFailure,
) -> Error {
    if request.partitions.len() == 1 {
        return Error::storage(
            Operation::Query,
            failure.partition_key,
            failure.attempts,
            failure.error,
        );
    }
    let (succeeded, aborted): (Vec<_>, Vec<_>) = request
        .partitions
        .iter()
        .zip(pages)
        .filter(|(partition_key, _)| **partition_key != failure.partition_key)
        .partition(|(_, page)| page.is_some());
    Error::PartialFanoutFailure {
        operation: Operation::Query,
        succeeded: succeeded.into_iter().map(|(key, _)| key.clone()).collect(),
        failed: vec![failure],
        aborted: aborted.into_iter().map(|(key, _)| key.clone()).collect(),
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use tablekit_core::keys::{apply_projections, date_token, CompositeKey, KeyCodec};
    use tablekit_core::storage::IndexDefinition;

    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::testutil::ScriptedStorage;

    const SHARDS: [&str; 4] = [
        "TENANT#t-037#USER#hot#S0",
        "TENANT#t-037#USER#hot#S1",
        "TENANT#t-037#USER#hot#S2",
        "TENANT#t-037#USER#hot#S3",
    ];

    fn throttled() -> StorageError {
        StorageError::Throttled("throughput exceeded".to_string())
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(3)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(2))
    }

    /// Writes 40 events spread round-robin over the four shards.
    async fn seeded() -> Arc<ScriptedStorage> {
        let inner = InMemoryStorage::default();
        for n in 0..40u64 {
            let shard = SHARDS[(n % 4) as usize];
            let item = Item::new(CompositeKey::new(shard, format!("EVENT#{n:010}#{n:06}")));
            inner.put_item(&item).await.unwrap();
        }
        Arc::new(ScriptedStorage::new(inner))
    }

    fn executor(storage: Arc<ScriptedStorage>) -> FanoutQueryExecutor<ScriptedStorage> {
        FanoutQueryExecutor::new(storage, TableSchema::default()).with_retry(fast_retry())
    }

    fn request() -> FanoutRequest {
        FanoutRequest::new(SHARDS.iter().map(|s| s.to_string()).collect())
            .with_range(SortKeyRange::BeginsWith("EVENT#".to_string()))
            .with_direction(Direction::Descending)
    }

    fn sort_keys(items: &[Item]) -> Vec<String> {
        items.iter().map(|i| i.key.sort_key.clone()).collect()
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "fail-fast".parse::<PartialFailurePolicy>(),
            Ok(PartialFailurePolicy::FailFast)
        );
        assert_eq!(
            "return-partial".parse::<PartialFailurePolicy>(),
            Ok(PartialFailurePolicy::ReturnPartial)
        );
        assert!("partial".parse::<PartialFailurePolicy>().is_err());
        assert_eq!(PartialFailurePolicy::ReturnPartial.to_string(), "return-partial");
    }

    #[tokio::test]
    async fn test_descending_merge_across_shards() {
        let storage = seeded().await;
        let result = executor(storage).query(&request()).await.unwrap();

        assert!(result.is_complete());
        assert_eq!(result.items.len(), 40);
        let expected: Vec<String> = (0..40u64)
            .rev()
            .map(|n| format!("EVENT#{n:010}#{n:06}"))
            .collect();
        assert_eq!(sort_keys(&result.items), expected);
    }

    #[tokio::test]
    async fn test_limits() {
        let storage = seeded().await;
        // Top five across shards, at most 50 read from each shard.
        let request = request()
            .with_per_partition_limit(Some(50))
            .with_limit(Some(5));
        let result = executor(storage).query(&request).await.unwrap();
        assert_eq!(
            sort_keys(&result.items),
            vec![
                "EVENT#0000000039#000039",
                "EVENT#0000000038#000038",
                "EVENT#0000000037#000037",
                "EVENT#0000000036#000036",
                "EVENT#0000000035#000035",
            ]
        );

        let storage = seeded().await;
        let request = FanoutRequest::new(vec![SHARDS[0].to_string()])
            .with_direction(Direction::Ascending)
            .with_per_partition_limit(Some(2));
        let result = executor(storage).query(&request).await.unwrap();
        assert_eq!(
            sort_keys(&result.items),
            vec!["EVENT#0000000000#000000", "EVENT#0000000004#000004"]
        );
    }

    #[tokio::test]
    async fn test_merge_ignores_completion_order() {
        let storage = seeded().await;
        storage.delay(SHARDS[0], Duration::from_millis(30));
        storage.delay(SHARDS[3], Duration::from_millis(10));
        let slow_first = executor(Arc::clone(&storage)).query(&request()).await.unwrap();

        let fresh = seeded().await;
        let undelayed = executor(fresh).query(&request()).await.unwrap();

        assert_eq!(slow_first, undelayed);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let storage = seeded().await;
        storage.fail_times(SHARDS[2], 2, throttled());

        let result = executor(Arc::clone(&storage))
            .query(&request())
            .await
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.items.len(), 40);
        assert_eq!(storage.reads(SHARDS[2]), 3);
        assert_eq!(storage.reads(SHARDS[0]), 1);
    }

    #[tokio::test]
    async fn test_return_partial_reports_failed_shard() {
        let storage = seeded().await;
        storage.fail_always(SHARDS[2], throttled());

        let result = executor(Arc::clone(&storage))
            .with_policy(PartialFailurePolicy::ReturnPartial)
            .query(&request())
            .await
            .unwrap();

        assert!(!result.is_complete());
        assert_eq!(result.failed_partition_keys(), vec![SHARDS[2]]);
        assert_eq!(result.failed_partitions[0].attempts, 3);
        assert_eq!(result.failed_partitions[0].error, throttled());

        // Shard 2 holds n % 4 == 2; everything else is merged in order.
        let expected: Vec<String> = (0..40u64)
            .rev()
            .filter(|n| n % 4 != 2)
            .map(|n| format!("EVENT#{n:010}#{n:06}"))
            .collect();
        assert_eq!(sort_keys(&result.items), expected);
    }

    #[tokio::test]
    async fn test_fail_fast_reports_partial_failure() {
        let storage = seeded().await;
        storage.fail_always(SHARDS[2], throttled());

        let err = executor(storage)
            .with_policy(PartialFailurePolicy::FailFast)
            .query(&request())
            .await
            .unwrap_err();

        match err {
            Error::PartialFanoutFailure {
                operation,
                succeeded,
                failed,
                aborted,
            } => {
                assert_eq!(operation, Operation::Query);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].partition_key, SHARDS[2]);
                assert!(!succeeded.contains(&SHARDS[2].to_string()));
                assert_eq!(succeeded.len() + aborted.len(), 3);
            }
            other => panic!("expected PartialFanoutFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fail_fast_accounts_for_reads_in_flight() {
        let storage = seeded().await;
        storage.delay(SHARDS[0], Duration::from_millis(200));
        storage.delay(SHARDS[3], Duration::from_millis(200));
        // Fails after shard 1 has been read.
        storage.delay(SHARDS[2], Duration::from_millis(50));
        storage.fail_always(SHARDS[2], throttled());

        let err = executor(storage)
            .with_retry(RetryConfig::no_retry())
            .query(&request())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Partial fan-out failure during query: 1 of 4 partitions failed, 2 aborted"
        );
        match err {
            Error::PartialFanoutFailure {
                succeeded,
                failed,
                aborted,
                ..
            } => {
                assert_eq!(succeeded, vec![SHARDS[1]]);
                assert_eq!(failed[0].partition_key, SHARDS[2]);
                assert_eq!(aborted, vec![SHARDS[0], SHARDS[3]]);
            }
            other => panic!("expected PartialFanoutFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_partition_failure_is_storage_unavailable() {
        let storage = seeded().await;
        storage.fail_always(SHARDS[0], StorageError::Unavailable("reset".to_string()));

        let request = FanoutRequest::new(vec![SHARDS[0].to_string()]);
        let err = executor(storage).query(&request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::StorageUnavailable { attempts: 3, ref partition_key, .. } if partition_key == SHARDS[0]
        ));
    }

    #[tokio::test]
    async fn test_all_partitions_failing_is_an_error() {
        let storage = seeded().await;
        for shard in SHARDS {
            storage.fail_always(shard, throttled());
        }

        let err = executor(storage)
            .with_policy(PartialFailurePolicy::ReturnPartial)
            .query(&request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::StorageUnavailable { ref partition_key, .. } if partition_key == SHARDS[0]
        ));
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let storage = seeded().await;
        storage.fail_always(
            SHARDS[1],
            StorageError::AccessDenied("explicit deny".to_string()),
        );

        let err = executor(Arc::clone(&storage))
            .with_policy(PartialFailurePolicy::ReturnPartial)
            .query(&request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Storage {
                attempts: 1,
                source: StorageError::AccessDenied(_),
                ..
            }
        ));
        assert_eq!(storage.reads(SHARDS[1]), 1);
    }

    #[tokio::test]
    async fn test_cancellation_discards_results() {
        let storage = seeded().await;
        storage.delay(SHARDS[1], Duration::from_secs(30));

        let err = executor(storage)
            .query_until(&request(), tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);
    }

    #[tokio::test]
    async fn test_concurrency_of_one_still_reads_everything() {
        let storage = seeded().await;
        let result = executor(storage)
            .with_max_concurrency(1)
            .query(&request())
            .await
            .unwrap();
        assert_eq!(result.items.len(), 40);
    }

    #[tokio::test]
    async fn test_index_fanout_orders_by_index_sort_key() {
        let schema = TableSchema::default().with_index(IndexDefinition::new("GSI1", "status"));
        let inner = InMemoryStorage::new(schema.clone());
        for (tenant, date, id) in [
            ("t-037", "20250928", "o1"),
            ("t-001", "20250929", "o7"),
            ("t-037", "20250930", "o2"),
        ] {
            let item = Item::new(CompositeKey::new(
                format!("TENANT#{tenant}#USER#u1"),
                format!("ORDER#{date}#{id}"),
            ))
            .with_attribute("GSI1PK", format!("TENANT#{tenant}#STATUS#PENDING"))
            .with_attribute("GSI1SK", format!("{date}#{id}"));
            inner.put_item(&item).await.unwrap();
        }

        let executor = FanoutQueryExecutor::new(Arc::new(inner), schema);
        let request = FanoutRequest::new(vec![
            "TENANT#t-037#STATUS#PENDING".to_string(),
            "TENANT#t-001#STATUS#PENDING".to_string(),
        ])
        .on_index("GSI1");
        let result = executor.query(&request).await.unwrap();

        let ids: Vec<_> = result
            .items
            .iter()
            .filter_map(|i| i.string_attribute("GSI1SK"))
            .collect();
        assert_eq!(ids, vec!["20250928#o1", "20250929#o7", "20250930#o2"]);
    }

    #[tokio::test]
    async fn test_single_tenant_table() {
        let codec = KeyCodec::single_tenant();
        let schema = TableSchema::default().with_index(IndexDefinition::new("GSI1", "status"));
        let inner = InMemoryStorage::new(schema.clone());

        let profile = codec.encode_primary_key(None, "USER", "u200").unwrap();
        inner
            .put_item(&Item::new(profile).with_type("USER").with_attribute("name", "Ada"))
            .await
            .unwrap();
        for (day, id, status) in [
            (26, "o101", "PENDING"),
            (28, "o102", "PENDING"),
            (29, "o103", "SHIPPED"),
        ] {
            let placed_on = date_token(NaiveDate::from_ymd_opt(2025, 9, day).unwrap());
            let key = codec
                .encode_child_key(None, "USER", "u200", "ORDER", id, &placed_on)
                .unwrap();
            let mut item = Item::new(key)
                .with_type("ORDER")
                .with_attribute("status", status);
            apply_projections(&codec, &schema, &mut item).unwrap();
            inner.put_item(&item).await.unwrap();
        }
        let executor = FanoutQueryExecutor::new(Arc::new(inner), schema);

        let partition = executor
            .query(&FanoutRequest::new(vec!["USER#u200".to_string()]))
            .await
            .unwrap();
        assert_eq!(
            sort_keys(&partition.items),
            vec![
                "ORDER#20250926#o101",
                "ORDER#20250928#o102",
                "ORDER#20250929#o103",
                "PROFILE#u200",
            ]
        );

        let pending_key = codec.index_partition_key(None, "STATUS", "PENDING").unwrap();
        assert_eq!(pending_key, "STATUS#PENDING");
        let pending = executor
            .query(
                &FanoutRequest::new(vec![pending_key])
                    .on_index("GSI1")
                    .with_direction(Direction::Descending),
            )
            .await
            .unwrap();
        assert_eq!(
            sort_keys(&pending.items),
            vec!["ORDER#20250928#o102", "ORDER#20250926#o101"]
        );
    }

    #[tokio::test]
    async fn test_unknown_index_fails_before_reading() {
        let storage = seeded().await;
        let err = executor(Arc::clone(&storage))
            .query(&request().on_index("GSI9"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Storage {
                source: StorageError::UnknownIndex(_),
                ..
            }
        ));
        assert_eq!(storage.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_request() {
        let storage = seeded().await;
        let result = executor(storage)
            .query(&FanoutRequest::default())
            .await
            .unwrap();
        assert_eq!(result, QueryResult::default());
    }
}
