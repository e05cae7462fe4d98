//! DynamoDB storage implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use tablekit_core::keys::CompositeKey;
use tablekit_core::storage::{
    Item, RangeQuery, Result, SortKeyRange, StorageClient, StorageError, TableSchema,
};

use super::conversions::{attributes_to_item, item_to_attributes, key_to_attributes};
use super::error::{map_get_item_error, map_put_item_error, map_query_error};
use crate::config::Config;

/// DynamoDB-backed [`StorageClient`] over one table.
#[derive(Debug, Clone)]
pub struct DynamoDbStorage {
    client: Client,
    table_name: String,
    schema: TableSchema,
}

impl DynamoDbStorage {
    /// Creates a storage with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            schema,
        }
    }

    /// Creates a storage from `config`.
    ///
    /// Credentials come from the AWS SDK default chain; region and endpoint
    /// from the configuration.
    pub async fn connect(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = loader.load().await;

        tracing::debug!(
            table = %config.table_name,
            region = %config.region,
            endpoint_url = ?config.endpoint_url,
            "connected DynamoDB storage",
        );
        Self::new(
            Client::new(&sdk_config),
            config.table_name.clone(),
            config.schema.clone(),
        )
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Key attribute names of the base table or of an index.
    fn key_attributes(&self, index: Option<&str>) -> Result<(&str, &str)> {
        match index {
            None => Ok((
                self.schema.partition_attribute.as_str(),
                self.schema.sort_attribute.as_str(),
            )),
            Some(name) => self
                .schema
                .index(name)
                .map(|index| {
                    (
                        index.partition_attribute.as_str(),
                        index.sort_attribute.as_str(),
                    )
                })
                .ok_or_else(|| StorageError::UnknownIndex(name.to_string())),
        }
    }
}

/// Key condition expression and its placeholder values.
#[derive(Debug, PartialEq)]
struct KeyCondition {
    expression: String,
    uses_sort_key: bool,
    values: Vec<(&'static str, String)>,
}

/// Renders `#pk = :pk` plus the sort key condition of `range`.
fn key_condition(partition_key: &str, range: &SortKeyRange) -> KeyCondition {
    let mut values = vec![(":pk", partition_key.to_string())];
    let sort_condition = match range {
        SortKeyRange::All => None,
        SortKeyRange::Exact(value) => {
            values.push((":sk", value.clone()));
            Some("#sk = :sk")
        }
        SortKeyRange::BeginsWith(prefix) => {
            values.push((":sk", prefix.clone()));
            Some("begins_with(#sk, :sk)")
        }
        SortKeyRange::Between { start, end } => {
            values.push((":start", start.clone()));
            values.push((":end", end.clone()));
            Some("#sk BETWEEN :start AND :end")
        }
        SortKeyRange::AtLeast(start) => {
            values.push((":sk", start.clone()));
            Some("#sk >= :sk")
        }
        SortKeyRange::AtMost(end) => {
            values.push((":sk", end.clone()));
            Some("#sk <= :sk")
        }
    };

    KeyCondition {
        expression: match sort_condition {
            Some(condition) => format!("#pk = :pk AND {condition}"),
            None => "#pk = :pk".to_string(),
        },
        uses_sort_key: sort_condition.is_some(),
        values,
    }
}

#[async_trait]
impl StorageClient for DynamoDbStorage {
    async fn put_item(&self, item: &Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_to_attributes(&self.schema, item)))
            .send()
            .await
            .map_err(map_put_item_error)?;

        Ok(())
    }

    async fn get_item(&self, key: &CompositeKey) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_attributes(&self.schema, key)))
            .send()
            .await
            .map_err(map_get_item_error)?;

        match result.item {
            Some(attributes) => Ok(Some(attributes_to_item(&self.schema, &attributes)?)),
            None => Ok(None),
        }
    }

    async fn range_query(&self, query: &RangeQuery) -> Result<Vec<Item>> {
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }
        let (partition_attribute, sort_attribute) = self.key_attributes(query.index.as_deref())?;
        let condition = key_condition(&query.partition_key, &query.range);

        let mut items = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .set_index_name(query.index.clone())
                .key_condition_expression(&condition.expression)
                .expression_attribute_names("#pk", partition_attribute)
                .scan_index_forward(query.direction.is_ascending())
                .set_exclusive_start_key(start_key.take());
            if condition.uses_sort_key {
                request = request.expression_attribute_names("#sk", sort_attribute);
            }
            for (placeholder, value) in &condition.values {
                request =
                    request.expression_attribute_values(*placeholder, AttributeValue::S(value.clone()));
            }
            if let Some(limit) = query.limit {
                let remaining = limit.saturating_sub(items.len());
                request = request.limit(i32::try_from(remaining).unwrap_or(i32::MAX));
            }

            let output = request.send().await.map_err(map_query_error)?;
            for attributes in output.items.unwrap_or_default() {
                items.push(attributes_to_item(&self.schema, &attributes)?);
            }

            let wants_more = query.limit.is_none_or(|limit| items.len() < limit);
            match output.last_evaluated_key {
                Some(key) if wants_more => start_key = Some(key),
                _ => break,
            }
            tracing::trace!(
                partition_key = %query.partition_key,
                fetched = items.len(),
                "fetching next page",
            );
        }

        if let Some(limit) = query.limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}
