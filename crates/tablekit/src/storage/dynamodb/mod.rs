//! DynamoDB storage backend.
//!
//! Implements [`StorageClient`](tablekit_core::storage::StorageClient) on a
//! single table using `aws-sdk-dynamodb`. Secondary indexes are expected to
//! project all attributes.

mod conversions;
mod error;
mod repository;

pub use repository::DynamoDbStorage;
