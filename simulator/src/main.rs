//! Currency Wallet Simulator
//!
//! Drives concurrent users against the wallet service and audits the
//! ledger for conservation when the run ends.

use std::time::Duration;

use clap::Parser;
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_engine::WalletConfig;

mod controller;
mod market;
mod metrics;
mod scenario;

use controller::{SimulationController, SimulationSettings};
use scenario::Scenario;

/// Currency Wallet Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Load and conservation simulator for the currency wallet")]
struct Args {
    /// Scenario to run: steady, source-outage or contention
    #[arg(short, long, default_value = "steady")]
    scenario: String,

    /// Number of wallet users
    #[arg(short, long, default_value = "10")]
    users: u64,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Run duration in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Pause between operations of one worker, in milliseconds
    #[arg(long, default_value = "5")]
    pause_ms: u64,

    /// Opening deposit per user and currency
    #[arg(long, default_value = "10000")]
    initial_funds: Decimal,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Emit JSON logs and print the report as JSON
    #[arg(long)]
    json: bool,

    /// Print wallet counters in Prometheus text format after the run
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(args.json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.json).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting Currency Wallet Simulator");

    anyhow::ensure!(args.users > 0, "at least one user is required");
    anyhow::ensure!(args.workers > 0, "at least one worker is required");

    let config = WalletConfig::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    let scenario = Scenario::load(&args.scenario)?;
    let settings = SimulationSettings {
        users: args.users,
        workers: args.workers,
        duration: Duration::from_secs(args.duration),
        pause: Duration::from_millis(args.pause_ms),
        initial_funds: args.initial_funds,
        seed: args.seed,
        ..SimulationSettings::default()
    };

    let controller = SimulationController::new(config, scenario, settings)?;
    let service = controller.service().clone();
    let report = controller.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!("Simulation complete");
        info!("Total operations: {}", report.operations);
        info!("Success rate: {:.1}%", report.success_rate * 100.0);
        info!("Throughput: {:.0} ops/s", report.throughput);
        info!(
            "Latency: avg {}us, p50 {}us, p99 {}us",
            report.latency_avg_us, report.latency_p50_us, report.latency_p99_us
        );
        for (operation, count) in &report.committed {
            info!("Committed {:?}: {}", operation, count);
        }
        for (code, count) in &report.failures {
            info!("Rejected {}: {}", code, count);
        }
        info!(
            "Stale-rate exchanges: {}, quote fetches: {}, refresher failures: {}",
            report.wallet.stale_rates_used, report.quote_fetches, report.refresher.failures
        );
        for (currency, total) in &report.totals {
            info!("Total {}: {}", currency, total);
        }
    }

    if args.metrics {
        println!("{}", service.metrics().to_prometheus());
    }

    Ok(())
}
