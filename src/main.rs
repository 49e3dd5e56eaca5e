use crate::booking::scheduler::{BookingScheduler, Registration};
use crate::browser::chrome::ChromeBackend;
use crate::cli::{Args, Command};
use crate::config::Config;
use crate::logging::setup_logging;
use crate::store::EventStore;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use url::Url;

mod booking;
mod browser;
mod cli;
mod config;
mod crawler;
mod logging;
mod store;
mod utils;
mod wodboard;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Config errors surface on stderr because logging isn't up yet.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(version = env!("CARGO_PKG_VERSION"), "starting wodbot");

    let result = match args.command {
        Command::Crawl { months, store } => crawl(&config, months, store).await,
        Command::Schedule { store } => schedule(&config, store).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "run failed");
            ExitCode::FAILURE
        }
    }
}

/// Discovery entry point: crawl the timetable and write the event store.
async fn crawl(config: &Config, months: Option<u32>, store: Option<PathBuf>) -> anyhow::Result<()> {
    let base = Url::parse(&config.base_url).context("invalid base URL")?;
    let months = months.unwrap_or(config.months_to_scan);
    let store = EventStore::new(store.unwrap_or_else(|| config.store_path.clone()));
    let backend = Arc::new(ChromeBackend::new(config.headless));
    crawler::run(backend, config, base, months, &store).await
}

/// Scheduling entry point: load the event store and book each session when
/// its window opens.
async fn schedule(config: &Config, store: Option<PathBuf>) -> anyhow::Result<()> {
    let base = Url::parse(&config.base_url).context("invalid base URL")?;
    let store = EventStore::new(store.unwrap_or_else(|| config.store_path.clone()));

    let records = store.read()?;
    if records.is_empty() {
        warn!(path = %store.path().display(), "event store is empty; nothing to schedule");
        return Ok(());
    }

    let mut scheduler = BookingScheduler::new(config.pool_size);
    for record in &records {
        match scheduler.register(record) {
            Registration::Scheduled { run_at } => {
                info!(url = record.url.as_str(), run_at = %run_at, "booking job scheduled");
            }
            Registration::Immediate => {
                info!(
                    url = record.url.as_str(),
                    "booking window already open; dispatching immediately"
                );
            }
            Registration::Replaced { run_at } => {
                warn!(
                    url = record.url.as_str(),
                    run_at = %run_at,
                    "duplicate link in event store; later record wins"
                );
            }
        }
    }
    info!(
        records = records.len(),
        jobs = scheduler.job_count(),
        "event store loaded"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(());
        }
    });

    let backend = Arc::new(ChromeBackend::new(config.headless));
    scheduler
        .run(backend, base, config.credentials(), shutdown_rx)
        .await;
    Ok(())
}
