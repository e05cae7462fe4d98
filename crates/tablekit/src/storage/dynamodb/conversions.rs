//! DynamoDB attribute conversion functions.
//!
//! Pure functions between `AttributeValue` maps and [`Item`]s, testable
//! without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use tablekit_core::keys::CompositeKey;
use tablekit_core::storage::{Item, Result, StorageError, TableSchema};

// ============================================================================
// Values
// ============================================================================

/// Convert a JSON value to a DynamoDB attribute value.
pub fn value_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(value_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(name, value)| (name.clone(), value_to_attribute(value)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB attribute value to a JSON value.
///
/// String and number sets become arrays. Binary values are not supported.
pub fn attribute_to_value(attribute: &AttributeValue) -> Result<Value> {
    match attribute {
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(values) => values
            .iter()
            .map(attribute_to_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        AttributeValue::M(map) => map
            .iter()
            .map(|(name, value)| Ok((name.clone(), attribute_to_value(value)?)))
            .collect::<Result<Map<_, _>>>()
            .map(Value::Object),
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|n| parse_number(n))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => Err(StorageError::Serialization(format!(
            "unsupported attribute type: {other:?}"
        ))),
    }
}

fn parse_number(n: &str) -> Result<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::from(u));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StorageError::Serialization(format!("invalid number: {n}")))
}

// ============================================================================
// Items
// ============================================================================

/// Convert key attributes to a DynamoDB key map.
pub fn key_to_attributes(
    schema: &TableSchema,
    key: &CompositeKey,
) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            schema.partition_attribute.clone(),
            AttributeValue::S(key.partition_key.clone()),
        ),
        (
            schema.sort_attribute.clone(),
            AttributeValue::S(key.sort_key.clone()),
        ),
    ])
}

/// Convert an Item to a DynamoDB item. Key attributes win over same-named
/// plain attributes.
pub fn item_to_attributes(schema: &TableSchema, item: &Item) -> HashMap<String, AttributeValue> {
    let mut attributes: HashMap<String, AttributeValue> = item
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), value_to_attribute(value)))
        .collect();
    attributes.extend(key_to_attributes(schema, &item.key));
    attributes
}

/// Convert a DynamoDB item to an Item.
pub fn attributes_to_item(
    schema: &TableSchema,
    attributes: &HashMap<String, AttributeValue>,
) -> Result<Item> {
    let key = CompositeKey::new(
        get_string(attributes, &schema.partition_attribute)?,
        get_string(attributes, &schema.sort_attribute)?,
    );

    let mut item = Item::new(key);
    for (name, attribute) in attributes {
        if *name == schema.partition_attribute || *name == schema.sort_attribute {
            continue;
        }
        item.attributes
            .insert(name.clone(), attribute_to_value(attribute)?);
    }
    Ok(item)
}

fn get_string(attributes: &HashMap<String, AttributeValue>, name: &str) -> Result<String> {
    attributes
        .get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| StorageError::Serialization(format!("missing string attribute: {name}")))
}
