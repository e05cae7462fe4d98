//! Storage doubles for failure injection in unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tablekit_core::keys::CompositeKey;
use tablekit_core::storage::{Item, RangeQuery, Result, StorageClient, StorageError};

use crate::storage::InMemoryStorage;

/// Wraps [`InMemoryStorage`] and injects scripted failures and delays per
/// partition key.
#[derive(Debug, Default)]
pub(crate) struct ScriptedStorage {
    inner: InMemoryStorage,
    failures: Mutex<HashMap<String, VecDeque<StorageError>>>,
    permanent: Mutex<HashMap<String, StorageError>>,
    delays: Mutex<HashMap<String, Duration>>,
    reads: Mutex<HashMap<String, u32>>,
    calls: AtomicUsize,
}

impl ScriptedStorage {
    pub(crate) fn new(inner: InMemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// The next `times` calls against `partition_key` fail with `error`.
    pub(crate) fn fail_times(&self, partition_key: &str, times: usize, error: StorageError) {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.entry(partition_key.to_string()).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Every call against `partition_key` fails with `error`.
    pub(crate) fn fail_always(&self, partition_key: &str, error: StorageError) {
        self.permanent
            .lock()
            .unwrap()
            .insert(partition_key.to_string(), error);
    }

    /// Range reads of `partition_key` take at least `delay`.
    pub(crate) fn delay(&self, partition_key: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(partition_key.to_string(), delay);
    }

    /// Total calls of any kind.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Range reads issued against `partition_key`.
    pub(crate) fn reads(&self, partition_key: &str) -> u32 {
        self.reads
            .lock()
            .unwrap()
            .get(partition_key)
            .copied()
            .unwrap_or(0)
    }

    fn check(&self, partition_key: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.permanent.lock().unwrap().get(partition_key) {
            return Err(error.clone());
        }
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(partition_key).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageClient for ScriptedStorage {
    async fn put_item(&self, item: &Item) -> Result<()> {
        self.check(&item.key.partition_key)?;
        self.inner.put_item(item).await
    }

    async fn get_item(&self, key: &CompositeKey) -> Result<Option<Item>> {
        self.check(&key.partition_key)?;
        self.inner.get_item(key).await
    }

    async fn range_query(&self, query: &RangeQuery) -> Result<Vec<Item>> {
        *self
            .reads
            .lock()
            .unwrap()
            .entry(query.partition_key.clone())
            .or_default() += 1;
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&query.partition_key)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(&query.partition_key)?;
        self.inner.range_query(query).await
    }
}
