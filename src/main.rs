//! Application entry point for the `purpleair-influx` writer.
//!
//! This binary orchestrates the full startup sequence, including:
//! - Loading configuration from the command line, environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Validating the sensor address and building the InfluxDB client
//! - Waiting for InfluxDB and creating the target database if it does not exist
//! - Polling the sensor on a fixed interval until Ctrl-C
//!
//! # Environment Variables
//! Every command-line option has an environment fallback (see `config.rs`).
//! Logging is controlled by:
//! - `RUST_LOG` (optional) – full `tracing` filter, wins over the level below
//! - `PURPLEAIR_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `FORCE_COLOR` (optional) – force ANSI colors on or off
use std::{env, io::IsTerminal, time::Duration};

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tokio::time::Instant;
use tracing_subscriber::filter::EnvFilter;

use purpleair_influx::influx::InfluxClient;
use purpleair_influx::sensor::{HttpFetcher, Sensor};
use purpleair_influx::{Config, WritePipeline};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = Config::parse();
    cfg.validate()?;
    cfg.log_config();

    let sensor = cfg.sensor()?;
    let db = InfluxClient::from_config(&cfg)?;
    let mut pipeline = WritePipeline::new(sensor, HttpFetcher::new(), db, &cfg.database);

    match pipeline.sensor() {
        Sensor::Lan { addr, live: true } => {
            tracing::info!("Fetching the live sensor reading from {}.", addr)
        }
        Sensor::Lan { addr, live: false } => {
            tracing::info!("Fetching the average sensor reading from {}.", addr)
        }
        Sensor::Web { sensor_id } => tracing::info!("Fetching data from sensor: {}", sensor_id),
    }
    let interval = cfg.interval();

    // Wait for the database to come online.
    while !pipeline.bootstrap().await {
        if sleep_or_shutdown(interval).await {
            return Ok(());
        }
    }

    tracing::info!(
        "Data is fetched on a {} second interval.",
        interval.as_secs()
    );

    loop {
        let start = Instant::now();
        let outcome = pipeline.poll().await;
        tracing::debug!("Poll cycle finished: {:?}", outcome);

        if sleep_or_shutdown(interval.saturating_sub(start.elapsed())).await {
            return Ok(());
        }
    }
}

/// Sleep for `duration`, returning `true` if Ctrl-C arrived first.
async fn sleep_or_shutdown(duration: Duration) -> bool {
    // ---
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt, shutting down.");
            true
        }
    }
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Log level controlled by the `PURPLEAIR_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// macros are invoked. It installs the subscriber globally for the lifetime
/// of the process.
fn init_tracing() {
    // ---
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to PURPLEAIR_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("PURPLEAIR_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
