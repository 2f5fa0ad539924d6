//! barsim CLI — validate configs and run simulations from files.
//!
//! Commands:
//! - `validate-config` — parse and validate provider + simulator TOML
//! - `run` — execute a simulation from JSON orders and JSON/CSV bars,
//!   optionally resuming from and/or writing a checkpoint

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Deserialize;

use barsim_core::checkpoint::SimulationCheckpoint;
use barsim_core::config::{config_hash, ProviderConfig, SimulatorConfig};
use barsim_core::domain::{Bar, OrderRequest};
use barsim_core::Simulator;

#[derive(Parser)]
#[command(name = "barsim", about = "Deterministic bar-driven execution simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate provider and simulator configurations.
    ValidateConfig {
        /// Path to provider config TOML
        provider_config: PathBuf,
        /// Path to simulator config TOML
        simulator_config: PathBuf,
    },
    /// Run a simulation and print a summary.
    Run {
        /// Path to orders JSON list
        orders: PathBuf,
        /// Path to bars (JSON list or CSV by extension)
        bars: PathBuf,
        /// Path to provider config TOML
        provider_config: PathBuf,
        /// Path to simulator config TOML
        simulator_config: PathBuf,
        /// Checkpoint to resume from
        #[arg(long)]
        checkpoint_in: Option<PathBuf>,
        /// Where to write a checkpoint after the run
        #[arg(long)]
        checkpoint_out: Option<PathBuf>,
        /// Backtest id recorded in checkpoints
        #[arg(long, default_value = "cli-run")]
        backtest_id: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::ValidateConfig {
            provider_config,
            simulator_config,
        } => {
            load_configs(&provider_config, &simulator_config)?;
            println!("Configs are valid.");
            Ok(())
        }
        Command::Run {
            orders,
            bars,
            provider_config,
            simulator_config,
            checkpoint_in,
            checkpoint_out,
            backtest_id,
        } => run_sim(
            &orders,
            &bars,
            &provider_config,
            &simulator_config,
            checkpoint_in.as_deref(),
            checkpoint_out.as_deref(),
            &backtest_id,
        ),
    }
}

fn load_configs(provider_path: &Path, simulator_path: &Path) -> Result<(ProviderConfig, SimulatorConfig)> {
    let provider_text = std::fs::read_to_string(provider_path)
        .with_context(|| format!("reading {}", provider_path.display()))?;
    let provider: ProviderConfig =
        toml::from_str(&provider_text).context("parsing provider config")?;
    provider.validate().context("invalid provider config")?;

    let simulator_text = std::fs::read_to_string(simulator_path)
        .with_context(|| format!("reading {}", simulator_path.display()))?;
    let mut simulator: SimulatorConfig =
        toml::from_str(&simulator_text).context("parsing simulator config")?;
    simulator.validate().context("invalid simulator config")?;

    Ok((provider, simulator))
}

/// Bar row as it appears in CSV input.
#[derive(Debug, Deserialize)]
struct CsvBar {
    symbol: String,
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut bars = Vec::new();
        for row in reader.deserialize() {
            let row: CsvBar = row.context("parsing CSV bar row")?;
            bars.push(Bar {
                symbol: row.symbol,
                timestamp: row.timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                spread: None,
            });
        }
        Ok(bars)
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).context("parsing bars JSON")
    }
}

fn load_orders(path: &Path) -> Result<Vec<OrderRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).context("parsing orders JSON")
}

fn run_sim(
    orders_path: &Path,
    bars_path: &Path,
    provider_path: &Path,
    simulator_path: &Path,
    checkpoint_in: Option<&Path>,
    checkpoint_out: Option<&Path>,
    backtest_id: &str,
) -> Result<()> {
    let mut sim = match checkpoint_in {
        Some(path) => {
            let checkpoint =
                SimulationCheckpoint::load(path, None).context("loading checkpoint")?;
            Simulator::from_checkpoint(checkpoint).context("restoring simulator")?
        }
        None => {
            let (provider, simulator) = load_configs(provider_path, simulator_path)?;
            Simulator::new(provider, simulator).context("building simulator")?
        }
    };

    let orders = load_orders(orders_path)?;
    let bars = load_bars(bars_path)?;
    if bars.is_empty() {
        bail!("no bars loaded from {}", bars_path.display());
    }

    let result = sim
        .run(&orders, &bars, None, None, None)
        .context("simulation failed")?;

    println!("Fills: {}", result.fills.len());
    println!("Rejected: {}", result.rejected_orders.len());
    for rejection in &result.rejected_orders {
        println!(
            "  {} {} @ {}: {}",
            rejection.order.client_order_id,
            rejection.order.symbol,
            rejection.timestamp,
            rejection.reason
        );
    }
    match result.equity_curve.last() {
        Some((ts, equity)) => println!("Final equity: {equity} at {ts}"),
        None => println!("Final equity: n/a"),
    }
    if result.funding_charged != Decimal::ZERO {
        println!("Funding charged: {}", result.funding_charged);
    }
    for (percentile, value) in &result.slippage_stats {
        println!("Slippage {percentile}: {value:.6}");
    }

    if let Some(path) = checkpoint_out {
        let hash = config_hash(&sim.provider_config, &sim.config);
        sim.to_checkpoint(backtest_id, &hash)
            .save(path)
            .context("writing checkpoint")?;
        println!("Checkpoint written to {}", path.display());
    }
    Ok(())
}
