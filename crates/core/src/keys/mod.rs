mod codec;
mod error;
mod projection;
mod tokens;
mod types;

pub use codec::{tenant_of, KeyCodec, Tenancy, DELIMITER, PROFILE_TOKEN, TENANT_TOKEN};
pub use error::{KeyError, Result};
pub use projection::{apply_projections, project_index};
pub use tokens::{date_token, sequence_token};
pub use types::{ChildKeyParts, CompositeKey, IndexKeyParts, PrimaryKeyParts};
