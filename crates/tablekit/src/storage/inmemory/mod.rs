//! In-memory storage backend for testing.
//!
//! Items live in a `BTreeMap` ordered by composite key, wrapped in
//! `Arc<RwLock<_>>`, so base-table range reads are ordered scans. Index reads
//! scan every item and order by the index sort attribute.
//!
//! # Example
//!
//! ```rust
//! use tablekit::storage::InMemoryStorage;
//! use tablekit_core::storage::TableSchema;
//!
//! let storage = InMemoryStorage::new(TableSchema::default());
//! // Use storage for testing...
//! ```

mod repository;

pub use repository::InMemoryStorage;
