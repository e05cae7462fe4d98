mod error;
mod schema;
mod traits;
mod types;

pub use error::{Result, StorageError};
pub use schema::{IndexDefinition, IndexScope, TableSchema};
pub use traits::StorageClient;
pub use types::{Attributes, Direction, Item, Operation, RangeQuery, SortKeyRange, TYPE_ATTRIBUTE};
