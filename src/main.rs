//! device-status-simulator entry point.
//!
//! Connects to PostgreSQL, seeds reference data and drives the status
//! generator until SIGINT/SIGTERM.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use device_status_simulator::config::{LogFormat, SimulatorConfig};
use device_status_simulator::domain::ReferenceData;
use device_status_simulator::persistence::postgres::PostgresStore;
use device_status_simulator::random::SystemRandom;
use device_status_simulator::service::scheduler::{self, Schedule};
use device_status_simulator::service::StatusGenerator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = SimulatorConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(
        database = ?config.database,
        interval_secs = config.tick_interval.as_secs(),
        reassign_probability = config.reassign_probability,
        "starting device-status-simulator"
    );

    // Reference snapshot
    let reference = match &config.reference_data_path {
        Some(path) => ReferenceData::from_path(path),
        None => ReferenceData::builtin(),
    }
    .context("loading reference data")?;

    // Store
    let store = PostgresStore::connect(&config.database)
        .await
        .context("connecting to PostgreSQL")?;

    let rng = config
        .random_seed
        .map_or_else(SystemRandom::from_os, SystemRandom::seeded);

    let mut generator = match StatusGenerator::bootstrap(
        reference,
        store.clone(),
        rng,
        config.reassign_probability,
    )
    .await
    {
        Ok(generator) => generator,
        Err(e) => {
            store.close().await;
            return Err(e).context("preparing schema and seed data");
        }
    };

    let schedule = Schedule {
        interval: config.tick_interval,
        tick_timeout: config.tick_timeout,
    };
    scheduler::run(&mut generator, schedule, scheduler::shutdown_signal()).await;

    store.close().await;
    tracing::info!("shutdown complete");

    Ok(())
}
