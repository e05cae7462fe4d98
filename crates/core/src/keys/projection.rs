//! Secondary index projections.
//!
//! An index projection is derived from a mutable attribute (e.g. `status`),
//! so it has to be recomputed on every write of the item. Items without the
//! source attribute get no projection, which keeps the index sparse.

use serde_json::Value;

use crate::shard::parse_shard_key;
use crate::storage::{IndexDefinition, IndexScope, Item, TableSchema};

use super::codec::{tenant_of, KeyCodec};
use super::error::{KeyError, Result};
use super::types::{ChildKeyParts, CompositeKey};

/// Computes the index key an item should carry for `index`.
///
/// Returns `Ok(None)` when the item has no value for the source attribute, or
/// when it is a root item and the index declares no timestamp attribute (or
/// the item lacks it). The timestamp and id come from the item's child key,
/// or from the index's timestamp attribute and the entity id for root items.
pub fn project_index(
    codec: &KeyCodec,
    index: &IndexDefinition,
    item: &Item,
) -> Result<Option<CompositeKey>> {
    let Some(value) = scalar_attribute(item, &index.source_attribute)? else {
        return Ok(None);
    };
    let Some((timestamp, id)) = timestamp_and_id(codec, index, item)? else {
        return Ok(None);
    };

    let key = match index.scope {
        IndexScope::Tenant => codec.encode_index_key(
            tenant_of(&item.key.partition_key),
            &index.key_token,
            &value,
            &timestamp,
            &id,
        )?,
        IndexScope::Global => {
            codec.encode_global_index_key(&index.key_token, &value, &timestamp, &id)?
        }
    };
    Ok(Some(key))
}

/// Rewrites every index projection attribute of `item` from its current
/// attribute values, removing projections whose source attribute is gone.
pub fn apply_projections(codec: &KeyCodec, schema: &TableSchema, item: &mut Item) -> Result<()> {
    for index in &schema.indexes {
        match project_index(codec, index, item)? {
            Some(key) => {
                item.attributes.insert(
                    index.partition_attribute.clone(),
                    Value::String(key.partition_key),
                );
                item.attributes
                    .insert(index.sort_attribute.clone(), Value::String(key.sort_key));
            }
            None => {
                item.attributes.remove(&index.partition_attribute);
                item.attributes.remove(&index.sort_attribute);
            }
        }
    }
    Ok(())
}

fn scalar_attribute(item: &Item, name: &str) -> Result<Option<String>> {
    match item.attributes.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(KeyError::invalid(
            "attribute value",
            &other.to_string(),
            "index source attributes must be scalar",
        )),
    }
}

fn timestamp_and_id(
    codec: &KeyCodec,
    index: &IndexDefinition,
    item: &Item,
) -> Result<Option<(String, String)>> {
    let from_attribute = match &index.timestamp_attribute {
        Some(name) => scalar_attribute(item, name)?,
        None => None,
    };

    match decode_child(codec, &item.key) {
        Ok(child) => Ok(Some((
            from_attribute.unwrap_or(child.timestamp),
            child.child_id,
        ))),
        Err(child_err) => {
            let root = codec.decode_primary_key(&item.key).map_err(|_| child_err)?;
            Ok(from_attribute.map(|timestamp| (timestamp, root.entity_id)))
        }
    }
}

/// Decodes a child key, looking through a `#S<n>` shard suffix.
fn decode_child(codec: &KeyCodec, key: &CompositeKey) -> Result<ChildKeyParts> {
    codec.decode_child_key(key).or_else(|err| {
        let (logical, _) = parse_shard_key(&key.partition_key).map_err(|_| err.clone())?;
        codec
            .decode_child_key(&CompositeKey::new(logical, key.sort_key.clone()))
            .map_err(|_| err)
    })
}
