//! Composite key encoding for the single-table design.
//!
//! Pure functions for building and parsing partition and sort keys.
//! All functions are sync and have no side effects.
//!
//! | Item            | Partition key                      | Sort key                   |
//! |-----------------|------------------------------------|----------------------------|
//! | Root entity     | `[TENANT#<t>#]<TYPE>#<id>`         | `PROFILE#<id>`             |
//! | Child item      | parent partition key               | `<CHILD>#<timestamp>#<id>` |
//! | Index projection| `[TENANT#<t>#]<ATTR>#<value>`      | `<timestamp>#<id>`         |
//!
//! The tenant, when present, is always the leading token of a partition key.

use serde::{Deserialize, Serialize};

use crate::storage::SortKeyRange;

use super::error::{KeyError, Result};
use super::types::{ChildKeyParts, CompositeKey, IndexKeyParts, PrimaryKeyParts};

// ============================================================================
// Key tokens
// ============================================================================

pub const DELIMITER: char = '#';
pub const TENANT_TOKEN: &str = "TENANT";
pub const PROFILE_TOKEN: &str = "PROFILE";

/// The character right after `#` in byte order. `<prefix>$` sorts after every
/// key of the form `<prefix>#...`.
const AFTER_DELIMITER: char = '$';

/// Whether partition keys carry a tenant prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tenancy {
    /// Tenant prefix is optional.
    #[default]
    Single,
    /// Every entity key must carry a tenant prefix.
    Multi,
}

/// Builds and parses composite keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyCodec {
    tenancy: Tenancy,
}

impl KeyCodec {
    pub fn new(tenancy: Tenancy) -> Self {
        Self { tenancy }
    }

    pub fn single_tenant() -> Self {
        Self::new(Tenancy::Single)
    }

    pub fn multi_tenant() -> Self {
        Self::new(Tenancy::Multi)
    }

    pub fn tenancy(&self) -> Tenancy {
        self.tenancy
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Generate the partition key of a root entity.
    ///
    /// Pattern: `[TENANT#<tenant>#]<entity_type>#<entity_id>`
    pub fn partition_key(
        &self,
        tenant: Option<&str>,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<String> {
        let mut tokens = self.tenant_tokens(tenant)?;
        validate_leading("entity type", entity_type)?;
        validate("entity id", entity_id)?;
        tokens.extend([entity_type, entity_id]);
        Ok(join(&tokens))
    }

    /// Generate the key of a root entity.
    ///
    /// Pattern: `[TENANT#<tenant>#]<entity_type>#<entity_id>` / `PROFILE#<entity_id>`
    pub fn encode_primary_key(
        &self,
        tenant: Option<&str>,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<CompositeKey> {
        let partition_key = self.partition_key(tenant, entity_type, entity_id)?;
        Ok(CompositeKey::new(
            partition_key,
            join(&[PROFILE_TOKEN, entity_id]),
        ))
    }

    /// Generate the key of an item stored under its parent's partition.
    ///
    /// Pattern: `<parent partition key>` / `<child_type>#<timestamp>#<child_id>`
    ///
    /// Children of one type sort by timestamp, then id, so a `begins_with`
    /// on `<child_type>#` returns them in chronological order.
    pub fn encode_child_key(
        &self,
        tenant: Option<&str>,
        parent_type: &str,
        parent_id: &str,
        child_type: &str,
        child_id: &str,
        timestamp: &str,
    ) -> Result<CompositeKey> {
        let partition_key = self.partition_key(tenant, parent_type, parent_id)?;
        validate("child type", child_type)?;
        validate("timestamp", timestamp)?;
        validate("child id", child_id)?;
        Ok(CompositeKey::new(
            partition_key,
            join(&[child_type, timestamp, child_id]),
        ))
    }

    /// Generate the partition key of a secondary index.
    ///
    /// Pattern: `[TENANT#<tenant>#]<attribute_name>#<attribute_value>`
    pub fn index_partition_key(
        &self,
        tenant: Option<&str>,
        attribute_name: &str,
        attribute_value: &str,
    ) -> Result<String> {
        let mut tokens = self.tenant_tokens(tenant)?;
        validate_leading("attribute name", attribute_name)?;
        validate("attribute value", attribute_value)?;
        tokens.extend([attribute_name, attribute_value]);
        Ok(join(&tokens))
    }

    /// Generate a tenant-scoped secondary index key.
    ///
    /// Pattern: `[TENANT#<tenant>#]<attribute_name>#<attribute_value>` / `<timestamp>#<entity_id>`
    pub fn encode_index_key(
        &self,
        tenant: Option<&str>,
        attribute_name: &str,
        attribute_value: &str,
        timestamp: &str,
        entity_id: &str,
    ) -> Result<CompositeKey> {
        let partition_key = self.index_partition_key(tenant, attribute_name, attribute_value)?;
        validate("timestamp", timestamp)?;
        validate("entity id", entity_id)?;
        Ok(CompositeKey::new(partition_key, join(&[timestamp, entity_id])))
    }

    /// Generate a secondary index key that spans every tenant.
    ///
    /// Pattern: `<attribute_name>#<attribute_value>` / `<timestamp>#<entity_id>`
    pub fn encode_global_index_key(
        &self,
        attribute_name: &str,
        attribute_value: &str,
        timestamp: &str,
        entity_id: &str,
    ) -> Result<CompositeKey> {
        KeyCodec::single_tenant().encode_index_key(
            None,
            attribute_name,
            attribute_value,
            timestamp,
            entity_id,
        )
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Parse a key produced by [`KeyCodec::encode_primary_key`].
    pub fn decode_primary_key(&self, key: &CompositeKey) -> Result<PrimaryKeyParts> {
        let (tenant, rest) = self.split_partition_key(&key.partition_key)?;
        let &[entity_type, entity_id] = rest.as_slice() else {
            return Err(KeyError::malformed(
                &key.partition_key,
                "expected <TYPE>#<ID> after the tenant prefix",
            ));
        };

        match split(&key.sort_key)?.as_slice() {
            &[PROFILE_TOKEN, id] if id == entity_id => Ok(PrimaryKeyParts {
                tenant,
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
            }),
            _ => Err(KeyError::malformed(
                &key.sort_key,
                "expected PROFILE#<ID> matching the partition key",
            )),
        }
    }

    /// Parse a key produced by [`KeyCodec::encode_child_key`].
    pub fn decode_child_key(&self, key: &CompositeKey) -> Result<ChildKeyParts> {
        let (tenant, rest) = self.split_partition_key(&key.partition_key)?;
        let &[parent_type, parent_id] = rest.as_slice() else {
            return Err(KeyError::malformed(
                &key.partition_key,
                "expected <TYPE>#<ID> after the tenant prefix",
            ));
        };
        let sort_tokens = split(&key.sort_key)?;
        let &[child_type, timestamp, child_id] = sort_tokens.as_slice() else {
            return Err(KeyError::malformed(
                &key.sort_key,
                "expected <CHILD>#<TIMESTAMP>#<ID>",
            ));
        };

        Ok(ChildKeyParts {
            tenant,
            parent_type: parent_type.to_string(),
            parent_id: parent_id.to_string(),
            child_type: child_type.to_string(),
            timestamp: timestamp.to_string(),
            child_id: child_id.to_string(),
        })
    }

    /// Parse a key produced by [`KeyCodec::encode_index_key`] or
    /// [`KeyCodec::encode_global_index_key`].
    pub fn decode_index_key(&self, key: &CompositeKey) -> Result<IndexKeyParts> {
        let (tenant, rest) = split_tenant(&key.partition_key)?;
        let &[attribute_name, attribute_value] = rest.as_slice() else {
            return Err(KeyError::malformed(
                &key.partition_key,
                "expected <ATTRIBUTE>#<VALUE> after the tenant prefix",
            ));
        };
        let sort_tokens = split(&key.sort_key)?;
        let &[timestamp, entity_id] = sort_tokens.as_slice() else {
            return Err(KeyError::malformed(&key.sort_key, "expected <TIMESTAMP>#<ID>"));
        };

        Ok(IndexKeyParts {
            tenant,
            attribute_name: attribute_name.to_string(),
            attribute_value: attribute_value.to_string(),
            timestamp: timestamp.to_string(),
            entity_id: entity_id.to_string(),
        })
    }

    // ========================================================================
    // Sort key ranges
    // ========================================================================

    /// All children of one type under a partition.
    ///
    /// Pattern: `begins_with(<child_type>#)`
    pub fn children_of(&self, child_type: &str) -> Result<SortKeyRange> {
        validate("child type", child_type)?;
        Ok(SortKeyRange::BeginsWith(format!("{child_type}{DELIMITER}")))
    }

    /// Children of one type whose timestamp token lies in `[from, to]`.
    ///
    /// Pattern: `BETWEEN <child_type>#<from># AND <child_type>#<to>$`
    pub fn children_between(&self, child_type: &str, from: &str, to: &str) -> Result<SortKeyRange> {
        validate("child type", child_type)?;
        validate("timestamp", from)?;
        validate("timestamp", to)?;
        Ok(SortKeyRange::Between {
            start: format!("{child_type}{DELIMITER}{from}{DELIMITER}"),
            end: format!("{child_type}{DELIMITER}{to}{AFTER_DELIMITER}"),
        })
    }

    /// Index entries whose timestamp token lies in `[from, to]`.
    ///
    /// Pattern: `BETWEEN <from># AND <to>$`
    pub fn index_between(&self, from: &str, to: &str) -> Result<SortKeyRange> {
        validate("timestamp", from)?;
        validate("timestamp", to)?;
        Ok(SortKeyRange::Between {
            start: format!("{from}{DELIMITER}"),
            end: format!("{to}{AFTER_DELIMITER}"),
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn tenant_tokens<'a>(&self, tenant: Option<&'a str>) -> Result<Vec<&'a str>> {
        match tenant {
            Some(tenant) => {
                validate("tenant id", tenant)?;
                Ok(vec![TENANT_TOKEN, tenant])
            }
            None if self.tenancy == Tenancy::Multi => Err(KeyError::invalid(
                "tenant id",
                "",
                "required in multi-tenant mode",
            )),
            None => Ok(Vec::new()),
        }
    }

    fn split_partition_key<'k>(&self, key: &'k str) -> Result<(Option<String>, Vec<&'k str>)> {
        let (tenant, rest) = split_tenant(key)?;
        if tenant.is_none() && self.tenancy == Tenancy::Multi {
            return Err(KeyError::malformed(key, "missing TENANT#<id> prefix"));
        }
        Ok((tenant, rest))
    }
}

/// Returns the tenant id a partition key is scoped to, if any.
///
/// # Examples
///
/// ```
/// use tablekit_core::keys::tenant_of;
///
/// assert_eq!(tenant_of("TENANT#t-037#USER#u1"), Some("t-037"));
/// assert_eq!(tenant_of("USER#u1"), None);
/// ```
pub fn tenant_of(partition_key: &str) -> Option<&str> {
    let rest = partition_key
        .strip_prefix(TENANT_TOKEN)?
        .strip_prefix(DELIMITER)?;
    let tenant = rest.split(DELIMITER).next()?;
    (!tenant.is_empty()).then_some(tenant)
}

fn validate(component: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(KeyError::invalid(component, value, "must not be empty"));
    }
    if value.contains(DELIMITER) {
        return Err(KeyError::invalid(
            component,
            value,
            "must not contain the '#' delimiter",
        ));
    }
    Ok(())
}

/// Validates a token that may end up first in a partition key.
fn validate_leading(component: &'static str, value: &str) -> Result<()> {
    validate(component, value)?;
    if value == TENANT_TOKEN {
        return Err(KeyError::invalid(component, value, "TENANT is reserved"));
    }
    Ok(())
}

fn join(tokens: &[&str]) -> String {
    tokens.join(&DELIMITER.to_string())
}

fn split(key: &str) -> Result<Vec<&str>> {
    let tokens: Vec<&str> = key.split(DELIMITER).collect();
    if tokens.iter().any(|token| token.is_empty()) {
        return Err(KeyError::malformed(key, "empty component"));
    }
    Ok(tokens)
}

fn split_tenant(key: &str) -> Result<(Option<String>, Vec<&str>)> {
    let tokens = split(key)?;
    if tokens.first() != Some(&TENANT_TOKEN) {
        return Ok((None, tokens));
    }
    match tokens.get(1) {
        Some(tenant) => Ok((Some(tenant.to_string()), tokens[2..].to_vec())),
        None => Err(KeyError::malformed(key, "TENANT prefix without an id")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::keys::date_token;

    #[test]
    fn test_multi_tenant_primary_key() {
        let codec = KeyCodec::multi_tenant();
        let key = codec
            .encode_primary_key(Some("t-037"), "USER", "u1")
            .unwrap();
        assert_eq!(key.partition_key, "TENANT#t-037#USER#u1");
        assert_eq!(key.sort_key, "PROFILE#u1");
    }

    #[test]
    fn test_single_tenant_primary_key() {
        let codec = KeyCodec::single_tenant();
        let key = codec.encode_primary_key(None, "USER", "u123").unwrap();
        assert_eq!(key.partition_key, "USER#u123");
        assert_eq!(key.sort_key, "PROFILE#u123");
    }

    #[test]
    fn test_child_key_shares_parent_partition() {
        let codec = KeyCodec::multi_tenant();
        let parent = codec
            .encode_primary_key(Some("t-037"), "USER", "u1")
            .unwrap();
        let placed_on = date_token(NaiveDate::from_ymd_opt(2025, 9, 28).unwrap());
        let child = codec
            .encode_child_key(Some("t-037"), "USER", "u1", "ORDER", "o1", &placed_on)
            .unwrap();
        assert_eq!(child.partition_key, parent.partition_key);
        assert_eq!(child.sort_key, "ORDER#20250928#o1");
    }

    #[test]
    fn test_index_keys() {
        let codec = KeyCodec::multi_tenant();
        let scoped = codec
            .encode_index_key(Some("t-037"), "STATUS", "PENDING", "20250928", "o1")
            .unwrap();
        assert_eq!(scoped.partition_key, "TENANT#t-037#STATUS#PENDING");
        assert_eq!(scoped.sort_key, "20250928#o1");

        let global = codec
            .encode_global_index_key("STATUS", "PENDING", "20250928", "o1")
            .unwrap();
        assert_eq!(global.partition_key, "STATUS#PENDING");
        assert_eq!(global.sort_key, "20250928#o1");

        assert_eq!(
            codec
                .index_partition_key(Some("t-037"), "STATUS", "PENDING")
                .unwrap(),
            scoped.partition_key
        );
    }

    #[test]
    fn test_primary_key_round_trip() {
        let codec = KeyCodec::multi_tenant();
        let key = codec
            .encode_primary_key(Some("t-037"), "USER", "u1")
            .unwrap();
        assert_eq!(
            codec.decode_primary_key(&key).unwrap(),
            PrimaryKeyParts {
                tenant: Some("t-037".to_string()),
                entity_type: "USER".to_string(),
                entity_id: "u1".to_string(),
            }
        );

        let codec = KeyCodec::single_tenant();
        let key = codec.encode_primary_key(None, "USER", "u200").unwrap();
        let parts = codec.decode_primary_key(&key).unwrap();
        assert_eq!(parts.tenant, None);
        assert_eq!(parts.entity_id, "u200");
    }

    #[test]
    fn test_child_key_round_trip() {
        let codec = KeyCodec::single_tenant();
        let key = codec
            .encode_child_key(Some("t-1"), "USER", "u1", "ORDER", "o2", "20250929")
            .unwrap();
        let parts = codec.decode_child_key(&key).unwrap();
        assert_eq!(parts.tenant.as_deref(), Some("t-1"));
        assert_eq!(parts.parent_type, "USER");
        assert_eq!(parts.parent_id, "u1");
        assert_eq!(parts.child_type, "ORDER");
        assert_eq!(parts.timestamp, "20250929");
        assert_eq!(parts.child_id, "o2");
    }

    #[test]
    fn test_index_key_round_trip() {
        let codec = KeyCodec::multi_tenant();
        let key = codec
            .encode_index_key(Some("t-037"), "STATUS", "SHIPPED", "20250929", "o2")
            .unwrap();
        let parts = codec.decode_index_key(&key).unwrap();
        assert_eq!(parts.tenant.as_deref(), Some("t-037"));
        assert_eq!(parts.attribute_name, "STATUS");
        assert_eq!(parts.attribute_value, "SHIPPED");
        assert_eq!(parts.timestamp, "20250929");
        assert_eq!(parts.entity_id, "o2");

        let global = codec
            .encode_global_index_key("STATUS", "PENDING", "20250926", "o101")
            .unwrap();
        assert_eq!(codec.decode_index_key(&global).unwrap().tenant, None);
    }

    #[test]
    fn test_multi_tenant_requires_tenant() {
        let codec = KeyCodec::multi_tenant();
        let err = codec.encode_primary_key(None, "USER", "u1").unwrap_err();
        assert!(matches!(
            err,
            KeyError::InvalidIdentifier {
                component: "tenant id",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_empty_and_delimited_components() {
        let codec = KeyCodec::single_tenant();
        assert!(matches!(
            codec.encode_primary_key(None, "", "u1"),
            Err(KeyError::InvalidIdentifier {
                component: "entity type",
                ..
            })
        ));
        assert!(matches!(
            codec.encode_primary_key(None, "USER", "u#1"),
            Err(KeyError::InvalidIdentifier {
                component: "entity id",
                ..
            })
        ));
        assert!(matches!(
            codec.encode_primary_key(Some("t#1"), "USER", "u1"),
            Err(KeyError::InvalidIdentifier {
                component: "tenant id",
                ..
            })
        ));
        assert!(matches!(
            codec.encode_child_key(None, "USER", "u1", "ORDER", "o1", ""),
            Err(KeyError::InvalidIdentifier {
                component: "timestamp",
                ..
            })
        ));
    }

    #[test]
    fn test_tenant_entity_type_is_reserved() {
        let codec = KeyCodec::single_tenant();
        assert!(codec.encode_primary_key(None, "TENANT", "t-1").is_err());
        assert!(codec
            .encode_index_key(None, "TENANT", "x", "20250101", "i1")
            .is_err());
    }

    #[test]
    fn test_decode_rejects_foreign_keys() {
        let codec = KeyCodec::multi_tenant();
        let missing_tenant = CompositeKey::new("USER#u1", "PROFILE#u1");
        assert!(matches!(
            codec.decode_primary_key(&missing_tenant),
            Err(KeyError::MalformedKey { .. })
        ));

        let codec = KeyCodec::single_tenant();
        let mismatched = CompositeKey::new("USER#u1", "PROFILE#u2");
        assert!(codec.decode_primary_key(&mismatched).is_err());

        let child = CompositeKey::new("USER#u1", "ORDER#20250928#o1");
        assert!(codec.decode_primary_key(&child).is_err());
        assert!(codec.decode_child_key(&child).is_ok());

        let empty_token = CompositeKey::new("USER##u1", "PROFILE#u1");
        assert!(codec.decode_primary_key(&empty_token).is_err());
    }

    #[test]
    fn test_distinct_entities_do_not_collide() {
        let codec = KeyCodec::single_tenant();
        let a = codec.encode_primary_key(Some("t1"), "USER", "u1").unwrap();
        let b = codec.encode_primary_key(None, "USER", "u1").unwrap();
        let c = codec.encode_primary_key(Some("t1"), "TEAM", "u1").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_orders_sort_before_profile() {
        // "O" (0x4F) < "P" (0x50): ascending reads return orders first.
        let codec = KeyCodec::multi_tenant();
        let profile = codec
            .encode_primary_key(Some("t-037"), "USER", "u1")
            .unwrap();
        let order = codec
            .encode_child_key(Some("t-037"), "USER", "u1", "ORDER", "o1", "20250928")
            .unwrap();
        assert!(order.sort_key < profile.sort_key);
    }

    #[test]
    fn test_children_ranges() {
        let codec = KeyCodec::single_tenant();
        assert_eq!(
            codec.children_of("ORDER").unwrap(),
            SortKeyRange::BeginsWith("ORDER#".to_string())
        );

        let range = codec
            .children_between("ORDER", "20250926", "20250928")
            .unwrap();
        assert!(range.contains("ORDER#20250926#o101"));
        assert!(range.contains("ORDER#20250928#o102"));
        assert!(!range.contains("ORDER#20250925#o100"));
        assert!(!range.contains("ORDER#20250929#o103"));
        assert!(!range.contains("PROFILE#u200"));
    }

    #[test]
    fn test_index_between() {
        let codec = KeyCodec::single_tenant();
        let range = codec.index_between("20250926", "20250926").unwrap();
        assert!(range.contains("20250926#o101"));
        assert!(!range.contains("20250928#o102"));
    }

    #[test]
    fn test_tenant_of() {
        assert_eq!(tenant_of("TENANT#t-037#USER#u1"), Some("t-037"));
        assert_eq!(tenant_of("TENANT#t-037"), Some("t-037"));
        assert_eq!(tenant_of("TENANTS#t-037#USER#u1"), None);
        assert_eq!(tenant_of("TENANT##USER"), None);
        assert_eq!(tenant_of("USER#u1"), None);
    }
}
