//! stockflow CLI
//!
//! One-shot run execution and the long-running scheduler/sensor service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stockflow_core::{Config, Profile, RunConfig};
use stockflow_orchestrator::{
    execute_run, MemoryLedger, PartitionSet, Scheduler, SeenLedger, Sensor, SqliteLedger,
};
use stockflow_pipeline::{CancelToken, RetryPolicy, Runner};
use stockflow_stores::create_sensor_store;

#[derive(Parser)]
#[command(name = "stockflow")]
#[command(about = "Periodic partitioned stock ETL", long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resource profile override (local or production)
    #[arg(long, global = true)]
    profile: Option<Profile>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one run and exit
    Run {
        /// Partition key from the declared set
        #[arg(long, conflicts_with = "object_key")]
        partition: Option<String>,

        /// Explicit object key to process
        #[arg(long)]
        object_key: Option<String>,
    },

    /// Start the scheduler and sensor until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(profile) = cli.profile {
        config.profile = profile;
    }
    config.validate()?;

    match cli.command {
        Commands::Run {
            partition,
            object_key,
        } => run_command(config, partition, object_key).await,
        Commands::Serve => serve_command(config).await,
    }
}

/// Resolve and execute a single run, then exit with its outcome.
async fn run_command(
    config: Config,
    partition: Option<String>,
    object_key: Option<String>,
) -> Result<()> {
    let run_config = match (partition, object_key) {
        (Some(key), _) => {
            PartitionSet::new(&config.source.prefix).resolve(&key, config.resources.clone())?
        }
        (None, Some(key)) => RunConfig::for_object_key(key, config.resources.clone()),
        (None, None) => RunConfig::for_object_key(
            config.source.local_object_key.clone(),
            config.resources.clone(),
        ),
    };

    let runner = Runner::new(RetryPolicy::from(config.retry), CancelToken::new());
    let report = execute_run(config.profile, &runner, run_config).await?;

    println!("{report}");
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Run scheduler and sensor side by side until ctrl-c.
async fn serve_command(config: Config) -> Result<()> {
    let cancel = CancelToken::new();
    let runner = Arc::new(Runner::new(RetryPolicy::from(config.retry), cancel.clone()));

    let scheduler = Scheduler::from_config(&config, runner.clone(), cancel.clone())?;

    let ledger: Arc<dyn SeenLedger> = match &config.sensor.ledger_path {
        Some(path) => Arc::new(SqliteLedger::open(path)?),
        None => Arc::new(MemoryLedger::new()),
    };
    let store = create_sensor_store(config.profile, &config.resources, &config.source.prefix)?;
    let sensor = Sensor::new(
        config.source.prefix.clone(),
        config.resources.clone(),
        store,
        ledger,
    );

    let interval = Duration::from_secs(config.sensor.poll_interval_secs);
    let profile = config.profile;

    let scheduler_task = tokio::spawn(async move { scheduler.run_loop().await });
    let sensor_cancel = cancel.clone();
    let sensor_task = tokio::spawn(async move {
        sensor.run_loop(interval, profile, runner, sensor_cancel).await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    if let Err(error) = scheduler_task.await {
        tracing::error!(%error, "scheduler task failed");
    }
    if let Err(error) = sensor_task.await {
        tracing::error!(%error, "sensor task failed");
    }
    Ok(())
}
