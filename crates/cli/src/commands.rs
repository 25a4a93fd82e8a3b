use crate::{
    error::CliError,
    feed::{FeedGenerator, read_feed, write_feed},
    output,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use chrono::Utc;
use clap::Subcommand;
use connectors::sql::postgres::adapter::PgAdapter;
use engine_config::settings::Settings;
use engine_core::{
    ledger::{BatchLedger, postgres::PgBatchLedger},
    retry::RetryPolicy,
    store::postgres::PgStore,
};
use engine_processing::{
    loader::Loader,
    monitor::{MonitorConfig, ReplicationMonitor},
};
use model::core::identifiers::BatchKey;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a batch of orders, write its feed file and load it into the source
    Load {
        #[arg(long, help = "Number of orders to generate (defaults to batch_size from config)")]
        batch_size: Option<usize>,

        #[arg(long, help = "Batch id (defaults to the current Unix timestamp)")]
        batch_id: Option<i64>,

        #[arg(long, default_value = "config.json", help = "Config file path")]
        config: String,
    },
    /// Wait until a loaded batch has replicated to the target
    Verify {
        #[arg(long, help = "Batch id to verify")]
        batch_id: i64,

        #[arg(long, help = "Monitoring timeout in seconds")]
        timeout: Option<u64>,

        #[arg(
            long,
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Check interval in seconds (at least 1)"
        )]
        interval: Option<u64>,

        #[arg(long, default_value = "config.json", help = "Config file path")]
        config: String,
    },
    /// Show a batch, or the latest batch and its replication progress
    Status {
        #[arg(long, help = "Batch id to show; the latest batch when omitted")]
        batch_id: Option<i64>,

        #[arg(long, default_value = "config.json", help = "Config file path")]
        config: String,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,
    },
    /// Create the orders and ledger tables if they are missing
    Init {
        #[arg(long, default_value = "config.json", help = "Config file path")]
        config: String,
    },
}

/// Source and target access built from one configuration.
struct Stores {
    source: Arc<PgStore>,
    target: Arc<PgStore>,
    ledger: Arc<PgBatchLedger>,
}

impl Stores {
    fn new(settings: &Settings) -> Self {
        let source_adapter = PgAdapter::new(settings.db.to_pg_config());
        let target_adapter = PgAdapter::new(settings.target_db.to_pg_config());
        let ledger_table = settings.ledger_ref();

        Self {
            source: Arc::new(PgStore::new(source_adapter.clone(), &ledger_table)),
            target: Arc::new(PgStore::new(target_adapter, &ledger_table)),
            ledger: Arc::new(
                PgBatchLedger::new(source_adapter, &ledger_table)
                    .with_slot_name(settings.slot_name.clone()),
            ),
        }
    }
}

pub async fn run(command: Commands) -> Result<ExitCode, CliError> {
    match command {
        Commands::Load {
            batch_size,
            batch_id,
            config,
        } => load(&Settings::load(&config)?, batch_size, batch_id).await,
        Commands::Verify {
            batch_id,
            timeout,
            interval,
            config,
        } => verify(&Settings::load(&config)?, batch_id, timeout, interval).await,
        Commands::Status {
            batch_id,
            config,
            json,
        } => status(&Settings::load(&config)?, batch_id, json).await,
        Commands::Init { config } => init(&Settings::load(&config)?).await,
    }
}

async fn load(
    settings: &Settings,
    batch_size: Option<usize>,
    batch_id: Option<i64>,
) -> Result<ExitCode, CliError> {
    let batch_size = batch_size.unwrap_or(settings.batch_size);
    let batch_id = batch_id.unwrap_or_else(|| Utc::now().timestamp());
    info!(batch_id, batch_size, "Generating batch");

    let orders = FeedGenerator::from_settings(settings)?.generate(batch_size);
    tokio::fs::create_dir_all(&settings.feed_dir).await?;
    let feed_file = settings.feed_file(batch_id);
    write_feed(&feed_file, &orders)?;
    info!(path = %feed_file.display(), "Created feed file");

    let records = read_feed(&feed_file)?;
    let stores = Stores::new(settings);
    let loader = Loader::new(stores.source, stores.ledger, settings.entity_ref());
    let summary = loader.load(&records, batch_id).await?;

    info!(
        batch = %summary.key,
        ledger_id = summary.ledger_id,
        row_count = summary.row_count,
        "Batch processing completed successfully"
    );
    Ok(ExitCode::Success)
}

async fn verify(
    settings: &Settings,
    batch_id: i64,
    timeout: Option<u64>,
    interval: Option<u64>,
) -> Result<ExitCode, CliError> {
    let config = MonitorConfig {
        timeout: timeout.map_or_else(|| settings.monitor.timeout(), Duration::from_secs),
        interval: interval.map_or_else(|| settings.monitor.interval(), Duration::from_secs),
        retry: RetryPolicy::for_database(),
    };

    let stores = Stores::new(settings);
    let monitor = ReplicationMonitor::new(stores.ledger, stores.source, stores.target, config);

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let key = BatchKey::new(settings.entity_ref(), batch_id);
    let verdict = monitor.run(&key, shutdown.cancel_token()).await;
    if shutdown.is_shutdown_requested() {
        info!(batch = %key, "Verification interrupted by signal");
    }
    Ok(ExitCode::from(&verdict))
}

async fn status(
    settings: &Settings,
    batch_id: Option<i64>,
    json: bool,
) -> Result<ExitCode, CliError> {
    let stores = Stores::new(settings);
    let entity = settings.entity_ref();

    match batch_id {
        Some(batch_id) => {
            let key = BatchKey::new(entity, batch_id);
            let Some(batch) = stores.ledger.batch(&key).await? else {
                println!("No batch {key} in the ledger");
                return Ok(ExitCode::GeneralError);
            };
            if json {
                output::print_json(&batch)?;
            } else {
                output::print_batch_table(&batch);
            }
        }
        None => {
            let Some(status) = stores.ledger.latest_status(&entity).await? else {
                println!("No batches for {entity} in the ledger");
                return Ok(ExitCode::GeneralError);
            };
            if json {
                output::print_json(&status)?;
            } else {
                output::print_status_table(&entity.to_string(), &status);
            }
        }
    }

    Ok(ExitCode::Success)
}

async fn init(settings: &Settings) -> Result<ExitCode, CliError> {
    let stores = Stores::new(settings);
    let entity = settings.entity_ref();

    stores.source.adapter().ping().await?;
    stores.target.adapter().ping().await?;

    stores.source.ensure_entity(&entity).await?;
    stores.target.ensure_entity(&entity).await?;
    stores.ledger.ensure_table().await?;

    info!(entity = %entity, ledger = %settings.ledger_ref(), "Tables ready on source and target");
    Ok(ExitCode::Success)
}
