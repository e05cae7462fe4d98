use std::env;

use thiserror::Error;

use tablekit_core::keys::KeyError;
use tablekit_core::shard::ShardPolicy;
use tablekit_core::storage::{IndexDefinition, TableSchema};

use crate::fanout::PartialFailurePolicy;
use crate::retry::RetryConfig;

/// Errors raised while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {variable}: '{value}' ({reason})")]
    InvalidValue {
        variable: &'static str,
        value: String,
        reason: String,
    },
}

/// Library configuration.
///
/// Built explicitly and handed to constructors; only the binary reads it from
/// the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Table name (default: "tablekit")
    pub table_name: String,
    /// AWS region (default: "us-east-1")
    pub region: String,
    /// Endpoint override, e.g. DynamoDB Local
    pub endpoint_url: Option<String>,
    /// Tenant the caller is authenticated as
    pub tenant_id: Option<String>,
    pub schema: TableSchema,
    pub shard_policy: ShardPolicy,
    pub partial_failure_policy: PartialFailurePolicy,
    pub retry: RetryConfig,
    /// Maximum partition reads in flight per fan-out (default: 16)
    pub max_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: "tablekit".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            tenant_id: None,
            schema: TableSchema::default(),
            shard_policy: ShardPolicy::default(),
            partial_failure_policy: PartialFailurePolicy::default(),
            retry: RetryConfig::default(),
            max_concurrency: 16,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TABLEKIT_TABLE` - Table name (default: "tablekit")
    /// - `AWS_REGION` - Region (default: "us-east-1")
    /// - `AWS_ENDPOINT_URL` - Endpoint override (optional)
    /// - `TENANT_ID` - Caller tenant (optional)
    /// - `TABLEKIT_INDEXES` - Secondary indexes, e.g. `GSI1=status,GSI2=status@global`
    /// - `TABLEKIT_SHARDS` - Shard counts, e.g. `EVENT=4,ORDER=1` (default: none)
    /// - `TABLEKIT_PARTIAL_FAILURE` - `fail-fast` or `return-partial` (default: fail-fast)
    /// - `TABLEKIT_RETRY_MAX_ATTEMPTS` - Attempts per partition read (default: 4)
    /// - `TABLEKIT_MAX_CONCURRENCY` - Partition reads in flight (default: 16)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let schema = match lookup("TABLEKIT_INDEXES") {
            Some(value) => parse_indexes(&value)?,
            None => defaults.schema,
        };
        let shard_policy = match lookup("TABLEKIT_SHARDS") {
            Some(value) => value
                .parse()
                .map_err(|err: KeyError| invalid("TABLEKIT_SHARDS", &value, err.to_string()))?,
            None => defaults.shard_policy,
        };
        let partial_failure_policy = match lookup("TABLEKIT_PARTIAL_FAILURE") {
            Some(value) => value
                .parse()
                .map_err(|reason: String| invalid("TABLEKIT_PARTIAL_FAILURE", &value, reason))?,
            None => defaults.partial_failure_policy,
        };
        let max_attempts = parse_number(&lookup, "TABLEKIT_RETRY_MAX_ATTEMPTS")?
            .unwrap_or(defaults.retry.max_attempts);
        let max_concurrency = parse_number(&lookup, "TABLEKIT_MAX_CONCURRENCY")?
            .unwrap_or(defaults.max_concurrency);

        Ok(Self {
            table_name: lookup("TABLEKIT_TABLE").unwrap_or(defaults.table_name),
            region: lookup("AWS_REGION").unwrap_or(defaults.region),
            endpoint_url: lookup("AWS_ENDPOINT_URL"),
            tenant_id: lookup("TENANT_ID"),
            schema,
            shard_policy,
            partial_failure_policy,
            retry: defaults.retry.with_max_attempts(max_attempts),
            max_concurrency,
        })
    }
}

/// Parses `NAME=attribute[@global]` entries.
fn parse_indexes(value: &str) -> Result<TableSchema, ConfigError> {
    let mut schema = TableSchema::default();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, source) = entry.split_once('=').ok_or_else(|| {
            invalid(
                "TABLEKIT_INDEXES",
                entry,
                "expected <NAME>=<ATTRIBUTE>".to_string(),
            )
        })?;
        let (source, global) = match source.split_once('@') {
            Some((source, "global")) => (source, true),
            Some((_, scope)) => {
                return Err(invalid(
                    "TABLEKIT_INDEXES",
                    entry,
                    format!("unknown scope '{scope}'"),
                ))
            }
            None => (source, false),
        };
        if name.trim().is_empty() || source.trim().is_empty() {
            return Err(invalid(
                "TABLEKIT_INDEXES",
                entry,
                "empty index or attribute name".to_string(),
            ));
        }
        let index = IndexDefinition::new(name.trim(), source.trim());
        schema = schema.with_index(if global { index.global() } else { index });
    }
    Ok(schema)
}

fn parse_number<F, T>(lookup: &F, variable: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(variable) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|err: T::Err| invalid(variable, &value, err.to_string())),
        None => Ok(None),
    }
}

fn invalid(variable: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        variable,
        value: value.to_string(),
        reason,
    }
}
