//! Storage backend implementations.
//!
//! Concrete implementations of [`StorageClient`](tablekit_core::storage::StorageClient),
//! selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-process backend for tests and local runs
//! - `dynamodb`: AWS DynamoDB backend using `aws-sdk-dynamodb`
//!
//! Both backends can be enabled together.
//!
//! # Examples
//!
//! Build with DynamoDB (and the `tablekit` binary):
//! ```bash
//! cargo build -p tablekit --features dynamodb
//! ```

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStorage;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStorage;
