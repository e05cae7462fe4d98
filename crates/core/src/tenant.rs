//! Client-side tenant boundary checks.
//!
//! These checks make a misconfigured caller fail locally before a request is
//! sent. They do not replace server-side isolation: the store is expected to
//! enforce its own tenant policy on the partition key prefix.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::{tenant_of, KeyError, DELIMITER};
use crate::storage::Operation;

/// Shown as the requested tenant when a key carries no tenant prefix.
pub const UNSCOPED: &str = "<unscoped>";

/// Errors raised by tenant boundary checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantError {
    #[error("Cross-tenant access denied: tenant '{caller}' attempted {operation} on tenant '{requested}'")]
    CrossTenantAccessDenied {
        operation: Operation,
        caller: String,
        requested: String,
    },
}

/// The tenant a caller is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Result<Self, KeyError> {
        let tenant_id = tenant_id.into();
        if tenant_id.is_empty() || tenant_id.contains(DELIMITER) {
            return Err(KeyError::InvalidIdentifier {
                component: "tenant id",
                value: tenant_id,
                reason: "must be non-empty and must not contain '#'",
            });
        }
        Ok(Self { tenant_id })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Checks that a request names the caller's own tenant.
    pub fn authorize(&self, operation: Operation, requested: &str) -> Result<(), TenantError> {
        if requested == self.tenant_id {
            return Ok(());
        }
        Err(self.deny(operation, requested))
    }

    /// Checks that a partition key is scoped to the caller's tenant.
    pub fn authorize_key(
        &self,
        operation: Operation,
        partition_key: &str,
    ) -> Result<(), TenantError> {
        match tenant_of(partition_key) {
            Some(tenant) if tenant == self.tenant_id => Ok(()),
            Some(tenant) => Err(self.deny(operation, tenant)),
            None => Err(self.deny(operation, UNSCOPED)),
        }
    }

    pub fn deny(&self, operation: Operation, requested: &str) -> TenantError {
        TenantError::CrossTenantAccessDenied {
            operation,
            caller: self.tenant_id.clone(),
            requested: requested.to_string(),
        }
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tenant_id)
    }
}
