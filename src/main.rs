use anyhow::Context;
use poolpoints::datasource::{SquidEventSource, SquidPriceOracle};
use poolpoints::orchestration::{DailyCycle, EventIngestor, Scheduler};
use poolpoints::{config::Config, db::init_db, Repository};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = Config::from_env().context("configuration error")?;

    // Initialize database and dependencies
    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let event_source = Arc::new(SquidEventSource::new(config.event_source_url.clone()));
    let price_oracle = Arc::new(SquidPriceOracle::new(
        config.event_source_url.clone(),
        config.base_price_url.clone(),
    ));

    let ingestor = EventIngestor::new(event_source, price_oracle, repo.clone(), config.clone());
    let daily = Arc::new(DailyCycle::new(repo, config.clone()));
    let scheduler = Arc::new(Scheduler::new(daily, config.clone()));

    tracing::info!("Starting ingestion and daily schedulers");

    let ingest_handle = tokio::spawn(Scheduler::run_ingest_loop(
        ingestor,
        config.ingest_interval_secs,
    ));
    let daily_handle = tokio::spawn(scheduler.clone().run_daily_loop());
    let cleanup_handle = tokio::spawn(scheduler.run_cleanup_loop());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received; stopping schedulers");

    ingest_handle.abort();
    daily_handle.abort();
    cleanup_handle.abort();

    Ok(())
}
