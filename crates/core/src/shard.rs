//! Write sharding for hot partitions.
//!
//! A logical partition that takes more traffic than one physical partition
//! allows (e.g. one user emitting many events) is spread over `N` physical
//! partitions named `<logical partition>#S<index>`. Writes pick a shard by
//! hashing the item's routing id; reads enumerate all `N` shard keys and
//! fan out.
//!
//! The shard count of an entity class must stay fixed for the lifetime of its
//! data. Changing it requires migrating the existing items.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keys::{KeyCodec, KeyError, Result, DELIMITER};

pub const SHARD_TOKEN: char = 'S';

/// Where a sharded write lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardAssignment {
    pub logical_partition: String,
    pub shard_index: u32,
    pub partition_key: String,
}

/// Maps a routing id to a shard index.
///
/// Uses the first 8 bytes of the SHA-256 digest (big-endian) modulo the shard
/// count, so the result is stable across processes, platforms and releases.
///
/// # Examples
///
/// ```
/// use tablekit_core::shard::assign_shard;
///
/// let shard = assign_shard("evt-42", 4).unwrap();
/// assert!(shard < 4);
/// assert_eq!(assign_shard("evt-42", 4).unwrap(), shard);
/// ```
pub fn assign_shard(routing_id: &str, shard_count: u32) -> Result<u32> {
    if shard_count == 0 {
        return Err(KeyError::InvalidShardCount(shard_count));
    }
    let digest = Sha256::digest(routing_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(prefix);
    Ok((hash % u64::from(shard_count)) as u32)
}

/// Generate the physical partition key of one shard.
///
/// Pattern: `<logical_partition>#S<shard_index>`
pub fn shard_partition_key(logical_partition: &str, shard_index: u32) -> String {
    format!("{logical_partition}{DELIMITER}{SHARD_TOKEN}{shard_index}")
}

/// Splits a shard partition key into its logical partition and shard index.
pub fn parse_shard_key(partition_key: &str) -> Result<(&str, u32)> {
    let malformed = || KeyError::MalformedKey {
        key: partition_key.to_string(),
        reason: "expected <PARTITION>#S<INDEX>",
    };
    let (logical, shard) = partition_key.rsplit_once(DELIMITER).ok_or_else(malformed)?;
    let index = shard
        .strip_prefix(SHARD_TOKEN)
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or_else(malformed)?;
    if logical.is_empty() {
        return Err(malformed());
    }
    Ok((logical, index))
}

/// Routes sharded writes and enumerates shard keys for reads.
///
/// Writes and reads of a sharded entity class must both go through the
/// router so they agree on the physical layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardRouter {
    codec: KeyCodec,
}

impl ShardRouter {
    pub fn new(codec: KeyCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// See [`assign_shard`].
    pub fn assign_shard(&self, routing_id: &str, shard_count: u32) -> Result<u32> {
        assign_shard(routing_id, shard_count)
    }

    /// Picks the shard of the item identified by `routing_id` under the
    /// logical partition of `entity_type`/`entity_id`.
    pub fn route_write(
        &self,
        tenant: Option<&str>,
        entity_type: &str,
        entity_id: &str,
        routing_id: &str,
        shard_count: u32,
    ) -> Result<ShardAssignment> {
        let logical_partition = self.codec.partition_key(tenant, entity_type, entity_id)?;
        let shard_index = assign_shard(routing_id, shard_count)?;
        Ok(ShardAssignment {
            partition_key: shard_partition_key(&logical_partition, shard_index),
            logical_partition,
            shard_index,
        })
    }

    /// Returns every shard key of a logical partition, in shard order.
    pub fn enumerate_shard_keys(
        &self,
        tenant: Option<&str>,
        entity_type: &str,
        entity_id: &str,
        shard_count: u32,
    ) -> Result<Vec<String>> {
        if shard_count == 0 {
            return Err(KeyError::InvalidShardCount(shard_count));
        }
        let logical_partition = self.codec.partition_key(tenant, entity_type, entity_id)?;
        Ok((0..shard_count)
            .map(|index| shard_partition_key(&logical_partition, index))
            .collect())
    }
}

/// Shard counts per entity class.
///
/// Entity classes without an explicit count are not sharded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPolicy {
    counts: BTreeMap<String, u32>,
}

impl ShardPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shards `entity_type` over `shard_count` partitions.
    pub fn with_shards(mut self, entity_type: impl Into<String>, shard_count: u32) -> Result<Self> {
        if shard_count == 0 {
            return Err(KeyError::InvalidShardCount(shard_count));
        }
        self.counts.insert(entity_type.into(), shard_count);
        Ok(self)
    }

    /// Shard count of a sharded entity class, `None` when not sharded.
    pub fn shard_count(&self, entity_type: &str) -> Option<u32> {
        self.counts.get(entity_type).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl fmt::Display for ShardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .counts
            .iter()
            .map(|(entity_type, count)| format!("{entity_type}={count}"))
            .collect();
        f.write_str(&entries.join(","))
    }
}

/// Parses `EVENT=4,ORDER=2`.
impl FromStr for ShardPolicy {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        let mut policy = ShardPolicy::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = || KeyError::InvalidIdentifier {
                component: "shard policy entry",
                value: entry.to_string(),
                reason: "expected <ENTITY>=<COUNT>",
            };
            let (entity_type, count) = entry.split_once('=').ok_or_else(invalid)?;
            let entity_type = entity_type.trim();
            if entity_type.is_empty() {
                return Err(invalid());
            }
            let count: u32 = count.trim().parse().map_err(|_| invalid())?;
            policy = policy.with_shards(entity_type, count)?;
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_assign_shard_is_deterministic() {
        for id in ["evt-1", "evt-2", "hotuser", ""] {
            let first = assign_shard(id, 4).unwrap();
            for _ in 0..10 {
                assert_eq!(assign_shard(id, 4).unwrap(), first);
            }
            assert!(first < 4);
        }
    }

    #[test]
    fn test_assign_shard_spreads_ids() {
        let mut used = HashSet::new();
        for n in 0..200 {
            used.insert(assign_shard(&format!("evt-{n}"), 4).unwrap());
        }
        assert_eq!(used.len(), 4);
    }

    #[test]
    fn test_single_shard_always_zero() {
        for n in 0..20 {
            assert_eq!(assign_shard(&n.to_string(), 1).unwrap(), 0);
        }
    }

    #[test]
    fn test_zero_shard_count_rejected() {
        assert_eq!(assign_shard("x", 0), Err(KeyError::InvalidShardCount(0)));
        let router = ShardRouter::default();
        assert_eq!(
            router.enumerate_shard_keys(None, "USER", "hot", 0),
            Err(KeyError::InvalidShardCount(0))
        );
    }

    #[test]
    fn test_enumerate_shard_keys() {
        let router = ShardRouter::new(KeyCodec::multi_tenant());
        let keys = router
            .enumerate_shard_keys(Some("t-037"), "USER", "hot", 4)
            .unwrap();
        assert_eq!(
            keys,
            vec![
                "TENANT#t-037#USER#hot#S0",
                "TENANT#t-037#USER#hot#S1",
                "TENANT#t-037#USER#hot#S2",
                "TENANT#t-037#USER#hot#S3",
            ]
        );
    }

    #[test]
    fn test_enumeration_covers_every_write() {
        let router = ShardRouter::new(KeyCodec::single_tenant());
        let keys: HashSet<String> = router
            .enumerate_shard_keys(None, "USER", "hotuser", 8)
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(keys.len(), 8);

        for n in 0..120 {
            let assignment = router
                .route_write(None, "USER", "hotuser", &format!("{n:06}"), 8)
                .unwrap();
            assert_eq!(assignment.logical_partition, "USER#hotuser");
            assert!(keys.contains(&assignment.partition_key));
        }
    }

    #[test]
    fn test_route_write_is_stable() {
        let router = ShardRouter::new(KeyCodec::multi_tenant());
        let a = router
            .route_write(Some("t-037"), "USER", "hot", "evt-9", 4)
            .unwrap();
        let b = router
            .route_write(Some("t-037"), "USER", "hot", "evt-9", 4)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.partition_key,
            shard_partition_key("TENANT#t-037#USER#hot", a.shard_index)
        );
    }

    #[test]
    fn test_parse_shard_key() {
        assert_eq!(
            parse_shard_key("TENANT#t-037#USER#hot#S3").unwrap(),
            ("TENANT#t-037#USER#hot", 3)
        );
        assert!(parse_shard_key("USER#hot").is_err());
        assert!(parse_shard_key("USER#hot#Sx").is_err());
        assert!(parse_shard_key("S1").is_err());
        assert!(parse_shard_key("#S1").is_err());
    }

    #[test]
    fn test_shard_policy_parse() {
        let policy: ShardPolicy = "EVENT=4, ORDER=2".parse().unwrap();
        assert_eq!(policy.shard_count("EVENT"), Some(4));
        assert_eq!(policy.shard_count("ORDER"), Some(2));
        assert_eq!(policy.shard_count("USER"), None);
        assert_eq!(policy.to_string(), "EVENT=4,ORDER=2");

        assert!("".parse::<ShardPolicy>().unwrap().is_empty());
        assert!("EVENT".parse::<ShardPolicy>().is_err());
        assert!("EVENT=x".parse::<ShardPolicy>().is_err());
        assert!("=4".parse::<ShardPolicy>().is_err());
        assert_eq!(
            "EVENT=0".parse::<ShardPolicy>(),
            Err(KeyError::InvalidShardCount(0))
        );
    }
}
