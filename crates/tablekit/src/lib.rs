//! Tenant-scoped, sharded fan-out queries over single-table key-value stores.
//!
//! Pure key logic lives in `tablekit_core`; this crate holds everything that
//! talks to a store: the fan-out executor, retry, the tenant boundary guard
//! and the storage backends.

pub mod config;
pub mod error;
pub mod fanout;
pub mod guard;
pub mod loadgen;
pub mod retry;
pub mod storage;

#[cfg(all(test, feature = "inmemory"))]
mod testutil;

pub use config::{Config, ConfigError};
pub use error::{Error, PartitionFailure, Result};
pub use fanout::{FanoutQueryExecutor, FanoutRequest, PartialFailurePolicy, QueryResult};
pub use guard::{ReadOptions, TenantBoundaryGuard};
pub use retry::RetryConfig;
