//! Functional core for single-table key design.
//!
//! Everything in this crate is synchronous and free of I/O: key encoding,
//! shard routing, result merging and tenant policy checks. The async shell
//! lives in the `tablekit` crate.

pub mod keys;
pub mod merge;
pub mod shard;
pub mod storage;
pub mod tenant;
