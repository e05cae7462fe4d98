use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tablekit::loadgen::{synthetic_events, write_all, EventLoad};
use tablekit::retry::{with_retry, RetryError};
use tablekit::storage::DynamoDbStorage;
use tablekit::{
    Config, FanoutQueryExecutor, PartialFailurePolicy, QueryResult, ReadOptions,
    TenantBoundaryGuard,
};
use tablekit_core::keys::{CompositeKey, KeyCodec};
use tablekit_core::shard::{ShardPolicy, ShardRouter};
use tablekit_core::storage::{Operation, SortKeyRange, StorageClient};
use tablekit_core::tenant::TenantContext;

/// tablekit - Tenant-scoped, sharded queries against a single DynamoDB table
#[derive(Parser, Debug)]
#[command(name = "tablekit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Table name
    #[arg(long, global = true, env = "TABLEKIT_TABLE")]
    table: Option<String>,

    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Endpoint override, e.g. http://localhost:8000 for DynamoDB Local
    #[arg(long, global = true, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Tenant to act as. Without one, keys are single-tenant and indexes
    /// spanning every tenant are readable.
    #[arg(long, short, global = true, env = "TENANT_ID")]
    tenant: Option<String>,

    /// Shard counts per entity type, e.g. USER=4
    #[arg(long, global = true, env = "TABLEKIT_SHARDS")]
    shards: Option<ShardPolicy>,

    /// fail-fast or return-partial
    #[arg(long, global = true, env = "TABLEKIT_PARTIAL_FAILURE")]
    partial_failure: Option<PartialFailurePolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the keys of an entity
    Keys {
        entity_type: String,
        entity_id: String,
    },
    /// Get the root item of an entity
    Get {
        entity_type: String,
        entity_id: String,
    },
    /// Read one entity partition, optionally only one child type
    Query {
        entity_type: String,
        entity_id: String,
        /// Only children of this type
        #[arg(long)]
        child_type: Option<String>,
        #[command(flatten)]
        window: Window,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Read every shard of an entity and merge
    Fanout {
        entity_type: String,
        entity_id: String,
        /// Sort key prefix, e.g. EVENT#
        #[arg(long)]
        begins_with: Option<String>,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Read a secondary index (tenant-scoped with --tenant, otherwise unscoped)
    Index {
        index: String,
        value: String,
        #[command(flatten)]
        window: Window,
        #[command(flatten)]
        read: ReadArgs,
    },
    /// Write synthetic events to random shards of an entity
    Loadgen {
        entity_type: String,
        entity_id: String,
        /// Shard count (default: the configured count for the entity type)
        #[arg(long)]
        shard_count: Option<u32>,
        #[arg(long, default_value = "200")]
        events: u64,
        /// Writes in flight
        #[arg(long, default_value = "16")]
        concurrency: usize,
    },
}

/// Inclusive timestamp window.
#[derive(Args, Debug)]
struct Window {
    #[arg(long, requires = "to")]
    from: Option<String>,
    #[arg(long, requires = "from")]
    to: Option<String>,
}

impl Window {
    fn between(&self) -> Option<(&str, &str)> {
        self.from.as_deref().zip(self.to.as_deref())
    }
}

#[derive(Args, Debug)]
struct ReadArgs {
    /// Newest first
    #[arg(long)]
    desc: bool,
    /// Maximum items returned
    #[arg(long)]
    limit: Option<usize>,
    /// Maximum items read per partition
    #[arg(long)]
    per_partition_limit: Option<usize>,
}

impl ReadArgs {
    fn options(&self) -> ReadOptions {
        let mut options = if self.desc {
            ReadOptions::descending()
        } else {
            ReadOptions::default()
        };
        options.limit = self.limit;
        options.per_partition_limit = self.per_partition_limit;
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablekit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;

    let result = tokio::select! {
        result = run(cli.command, config) => result,
        _ = signal::ctrl_c() => bail!("interrupted"),
    };
    if let Err(err) = &result {
        if err
            .downcast_ref::<tablekit::Error>()
            .is_some_and(tablekit::Error::is_retryable)
        {
            tracing::warn!("storage was unavailable, the command is safe to retry");
        }
    }
    result
}

/// Environment configuration with command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env().context("invalid environment configuration")?;
    if let Some(table) = &cli.table {
        config.table_name = table.clone();
    }
    if let Some(region) = &cli.region {
        config.region = region.clone();
    }
    if cli.endpoint_url.is_some() {
        config.endpoint_url = cli.endpoint_url.clone();
    }
    if cli.tenant.is_some() {
        config.tenant_id = cli.tenant.clone();
    }
    if let Some(shards) = &cli.shards {
        config.shard_policy = shards.clone();
    }
    if let Some(policy) = cli.partial_failure {
        config.partial_failure_policy = policy;
    }
    Ok(config)
}

async fn run(command: Command, config: Config) -> Result<()> {
    let storage = Arc::new(DynamoDbStorage::connect(&config).await);
    match config.tenant_id.clone() {
        Some(tenant) => run_scoped(command, &tenant, storage, &config).await,
        None => {
            tracing::debug!("no tenant configured, using single-tenant keys");
            run_unscoped(command, storage, &config).await
        }
    }
}

/// Runs `command` as `tenant`, through the tenant boundary guard.
async fn run_scoped(
    command: Command,
    tenant: &str,
    storage: Arc<DynamoDbStorage>,
    config: &Config,
) -> Result<()> {
    let context = TenantContext::new(tenant)?;
    let guard = TenantBoundaryGuard::new(context, Arc::clone(&storage), config);

    match command {
        Command::Keys {
            entity_type,
            entity_id,
        } => {
            let primary = guard.primary_key(tenant, &entity_type, &entity_id)?;
            let partitions = guard.partition_keys(tenant, &entity_type, &entity_id)?;
            print_keys(&primary, &partitions)
        }
        Command::Get {
            entity_type,
            entity_id,
        } => {
            let key = guard.primary_key(tenant, &entity_type, &entity_id)?;
            match guard.get(tenant, &key).await? {
                Some(item) => print_json(&item),
                None => bail!("not found: {key}"),
            }
        }
        Command::Query {
            entity_type,
            entity_id,
            child_type,
            window,
            read,
        } => {
            let result = match child_type {
                Some(child_type) => {
                    guard
                        .query_children(
                            tenant,
                            &entity_type,
                            &entity_id,
                            &child_type,
                            window.between(),
                            read.options(),
                        )
                        .await?
                }
                None => {
                    guard
                        .query_partition(
                            tenant,
                            &entity_type,
                            &entity_id,
                            SortKeyRange::All,
                            read.options(),
                        )
                        .await?
                }
            };
            print_result(&result)
        }
        Command::Fanout {
            entity_type,
            entity_id,
            begins_with,
            read,
        } => {
            let range = begins_with.map_or(SortKeyRange::All, SortKeyRange::BeginsWith);
            let result = guard
                .query_sharded(tenant, &entity_type, &entity_id, range, read.options())
                .await?;
            print_result(&result)
        }
        Command::Index {
            index,
            value,
            window,
            read,
        } => {
            let result = guard
                .query_index(tenant, &index, &value, window.between(), read.options())
                .await?;
            print_result(&result)
        }
        Command::Loadgen {
            entity_type,
            entity_id,
            shard_count,
            events,
            concurrency,
        } => {
            let shard_count = loadgen_shard_count(config, &entity_type, shard_count)?;
            let load =
                EventLoad::new(entity_type, entity_id, shard_count, events).for_tenant(tenant);
            loadgen(&KeyCodec::multi_tenant(), &load, &storage, concurrency, config).await
        }
    }
}

/// Runs `command` against a single-tenant table. Indexes spanning every
/// tenant of a multi-tenant table are readable here too, since their keys
/// carry no tenant prefix.
async fn run_unscoped(
    command: Command,
    storage: Arc<DynamoDbStorage>,
    config: &Config,
) -> Result<()> {
    let codec = KeyCodec::single_tenant();
    let router = ShardRouter::new(codec);
    let executor = FanoutQueryExecutor::from_config(Arc::clone(&storage), config);
    let partitions_of = |entity_type: &str, entity_id: &str| -> Result<Vec<String>> {
        Ok(match config.shard_policy.shard_count(entity_type) {
            Some(count) => router.enumerate_shard_keys(None, entity_type, entity_id, count)?,
            None => vec![codec.partition_key(None, entity_type, entity_id)?],
        })
    };

    match command {
        Command::Keys {
            entity_type,
            entity_id,
        } => {
            let primary = codec.encode_primary_key(None, &entity_type, &entity_id)?;
            print_keys(&primary, &partitions_of(&entity_type, &entity_id)?)
        }
        Command::Get {
            entity_type,
            entity_id,
        } => {
            let key = codec.encode_primary_key(None, &entity_type, &entity_id)?;
            let item = with_retry(&config.retry, "get_item", &key.partition_key, || {
                storage.get_item(&key)
            })
            .await
            .map_err(|RetryError { attempts, error }| {
                tablekit::Error::storage(Operation::Get, key.partition_key.as_str(), attempts, error)
            })?;
            match item {
                Some(item) => print_json(&item),
                None => bail!("not found: {key}"),
            }
        }
        Command::Query {
            entity_type,
            entity_id,
            child_type,
            window,
            read,
        } => {
            let range = match (child_type, window.between()) {
                (Some(child_type), Some((from, to))) => {
                    codec.children_between(&child_type, from, to)?
                }
                (Some(child_type), None) => codec.children_of(&child_type)?,
                (None, _) => SortKeyRange::All,
            };
            let partition_key = codec.partition_key(None, &entity_type, &entity_id)?;
            let result = executor
                .query(&read.options().request(vec![partition_key], range))
                .await?;
            print_result(&result)
        }
        Command::Fanout {
            entity_type,
            entity_id,
            begins_with,
            read,
        } => {
            let range = begins_with.map_or(SortKeyRange::All, SortKeyRange::BeginsWith);
            let partitions = partitions_of(&entity_type, &entity_id)?;
            let result = executor
                .query(&read.options().request(partitions, range))
                .await?;
            print_result(&result)
        }
        Command::Index {
            index,
            value,
            window,
            read,
        } => {
            let Some(definition) = config.schema.index(&index) else {
                bail!("unknown index: {index}");
            };
            let partition_key = codec.index_partition_key(None, &definition.key_token, &value)?;
            let range = match window.between() {
                Some((from, to)) => codec.index_between(from, to)?,
                None => SortKeyRange::All,
            };
            let request = read
                .options()
                .request(vec![partition_key], range)
                .on_index(index);
            print_result(&executor.query(&request).await?)
        }
        Command::Loadgen {
            entity_type,
            entity_id,
            shard_count,
            events,
            concurrency,
        } => {
            let shard_count = loadgen_shard_count(config, &entity_type, shard_count)?;
            let load = EventLoad::new(entity_type, entity_id, shard_count, events);
            loadgen(&codec, &load, &storage, concurrency, config).await
        }
    }
}

fn loadgen_shard_count(config: &Config, entity_type: &str, flag: Option<u32>) -> Result<u32> {
    match flag.or_else(|| config.shard_policy.shard_count(entity_type)) {
        Some(count) => Ok(count),
        None => bail!("no shard count for {entity_type} (--shard-count or TABLEKIT_SHARDS)"),
    }
}

async fn loadgen(
    codec: &KeyCodec,
    load: &EventLoad,
    storage: &DynamoDbStorage,
    concurrency: usize,
    config: &Config,
) -> Result<()> {
    let items = synthetic_events(codec, load, &mut rand::rng())?;
    let written = write_all(storage, items, concurrency, &config.retry).await?;
    print_json(&serde_json::json!({ "written": written }))
}

fn print_keys(primary: &CompositeKey, partitions: &[String]) -> Result<()> {
    print_json(&serde_json::json!({
        "primary_key": primary,
        "partitions": partitions,
    }))
}

fn print_result(result: &QueryResult) -> Result<()> {
    if !result.is_complete() {
        tracing::warn!(
            failed = ?result.failed_partition_keys(),
            "partial result: some partitions could not be read",
        );
    }
    print_json(&result.items)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
