//! hwmon Agent - local hardware sensor monitor
//!
//! This agent hosts the monitoring engine on the local machine:
//! - Sensor sampling through `sysinfo` (temperatures, CPU load, memory)
//! - Fixed-interval polling with level-triggered limit alerts
//! - Alert presentation (terminal bell, external command)
//! - Live limit edits from stdin while the loop runs

mod alerts;
mod config;
mod console;
mod control;
mod provider;

use alerts::{BellSink, CommandSink, FanOutSink};
use anyhow::{Context, Result};
use clap::Parser;
use config::{AgentConfig, AlertConfig};
use console::ConsoleDisplay;
use hwmon_engine::{AlertSink, LogAlertSink, PollScheduler, Sample, SensorCatalog, TickReport};
use provider::SysinfoProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "hwmon_agent=info,hwmon_engine=info";

/// CPU load needs two samples this far apart to be meaningful
const WARM_UP: Duration = Duration::from_millis(200);

/// Poll local hardware sensors and alert when a value exceeds its limit
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (defaults to $HWMON_CONFIG, then the OS config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the poll period in milliseconds
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Print every available sensor reading and exit
    #[arg(long)]
    list_sensors: bool,

    /// Run a single tick, print its report and exit
    #[arg(long)]
    once: bool,

    /// Save the effective configuration and exit
    #[arg(long)]
    write_config: bool,

    /// Do not read limit commands from stdin
    #[arg(long)]
    no_control: bool,
}

fn build_alert_sink(config: &AlertConfig) -> Result<Arc<dyn AlertSink>> {
    let mut sink = FanOutSink::new().with(Arc::new(LogAlertSink));

    if config.bell {
        sink = sink.with(Arc::new(BellSink::new(config.cue())));
    }
    if let Some(command) = &config.command {
        let command = CommandSink::new(command).context("Invalid alert command")?;
        sink = sink.with(Arc::new(command));
    }

    Ok(Arc::new(sink))
}

fn build_scheduler(config: &AgentConfig) -> Result<PollScheduler> {
    let provider = SysinfoProvider::new();
    let display = ConsoleDisplay::new(config.display.summary_every());
    let sink = build_alert_sink(&config.alert)?;

    PollScheduler::new(&config.engine, Box::new(provider), Box::new(display), sink)
        .context("Failed to create poll scheduler")
}

async fn list_sensors() -> Result<()> {
    let mut provider = SysinfoProvider::new();
    let mut catalog = SensorCatalog::new();

    catalog.refresh(&mut provider).context("Failed to read sensors")?;
    tokio::time::sleep(WARM_UP).await;
    catalog.refresh(&mut provider).context("Failed to read sensors")?;

    for reading in catalog.readings() {
        println!("{}", reading);
    }
    info!("{} readings available", catalog.len());
    Ok(())
}

fn print_report(report: &TickReport) {
    for (key, sample) in &report.samples {
        match sample {
            Sample::Value(value) => println!("{}: {} {}", key, value, key.kind.unit()),
            Sample::Unavailable => println!("{}: unavailable", key),
        }
    }
    for alert in &report.alerts {
        println!("ALERT {}: {} > {}", alert.key, alert.value, alert.limit);
    }
    if let Some(e) = &report.provider_error {
        println!("provider error: {}", e);
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let cli = Cli::parse();
    info!("hwmon agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = AgentConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    if let Some(interval_ms) = cli.interval_ms {
        config.engine.interval_ms = interval_ms;
        config.engine.validate().context("Invalid --interval-ms")?;
    }

    if cli.write_config {
        let path = config
            .save(cli.config.as_deref())
            .await
            .context("Failed to save configuration")?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    if cli.list_sensors {
        return list_sensors().await;
    }

    let mut scheduler = build_scheduler(&config)?;

    if cli.once {
        tokio::time::sleep(WARM_UP).await;
        let report = scheduler.tick_async().await;
        print_report(&report);
        return Ok(());
    }

    if !cli.no_control {
        tokio::spawn(control::serve(control::spawn_stdin_reader(), scheduler.limits()));
        info!("{}", control::HELP);
    }

    let stats = scheduler.run(shutdown_signal()).await;
    info!("Run stats: {}", serde_json::to_string(&stats).context("Failed to serialize run stats")?);

    Ok(())
}
