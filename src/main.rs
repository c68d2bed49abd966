//! Signal bot - scans Bybit pairs with a gradient-boosted model and posts the
//! strongest trade idea to Telegram.
//!
//! # Usage
//! ```sh
//! signalbot            # same as `signalbot run`
//! signalbot scan       # one scan, printed to stdout (`--metrics` adds Prometheus text)
//! signalbot check      # exchange connectivity check
//! ```
//!
//! Configuration comes from environment variables (and `.env`). `run` needs
//! `TELEGRAM_TOKEN` and `CHAT_ID`; `scan` and `check` do not.

use anyhow::Result;
use clap::{Parser, Subcommand};
use signalbot::application::system::Application;
use signalbot::config::Config;
use signalbot::infrastructure::BybitMarketDataService;
use signalbot::infrastructure::observability::metrics::TRIGGER_CLI;
use signalbot::domain::ports::MarketDataService;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq, Debug)]
enum Command {
    /// Run the chat bot and the periodic signal scheduler (default)
    Run,
    /// Scan once and print every candidate signal and the best one
    Scan {
        /// Also print the scan's metrics in Prometheus text format
        #[arg(long)]
        metrics: bool,
    },
    /// Check exchange connectivity: server time and instrument count
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Scan { metrics } => scan(config, metrics).await,
        Command::Check => check(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Signal bot {} starting...", env!("CARGO_PKG_VERSION"));
    // Fail before touching the network when credentials are missing
    config.telegram.credentials()?;

    let app = Application::build(config).await?;
    let handle = app.start().await?;

    info!("Bot running. Press Ctrl+C to shutdown.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting...");
    handle.shutdown();
    Ok(())
}

async fn scan(config: Config, print_metrics: bool) -> Result<()> {
    let app = Application::build(config).await?;
    let report = app.pipeline.run(TRIGGER_CLI).await;

    println!(
        "Scanned {} pairs: {} candidates, {} failed",
        report.scanned,
        report.signals.len(),
        report.failed.len()
    );
    for signal in &report.signals {
        println!("\n{}", signal);
    }
    for (symbol, error) in &report.failed {
        println!("\n{} failed: {}", symbol, error);
    }
    match &report.best {
        Some(best) => println!("\n=== Best ===\n{}", best),
        None => println!("\nNo suitable signals at the moment."),
    }
    if print_metrics {
        println!("\n{}", app.metrics.render());
    }
    Ok(())
}

async fn check(config: Config) -> Result<()> {
    let market = BybitMarketDataService::new(&config.exchange);

    let server_time = market.get_server_time().await?;
    let drift = chrono::Utc::now() - server_time;
    println!(
        "Bybit server time: {} (local drift {}s)",
        server_time.to_rfc3339(),
        drift.num_seconds()
    );

    let symbols = market.get_tradable_symbols().await?;
    let quoted = symbols
        .iter()
        .filter(|s| s.ends_with(&config.exchange.quote_asset))
        .count();
    println!(
        "{} instruments trading in {} ({} quoted in {})",
        symbols.len(),
        config.exchange.category,
        quoted,
        config.exchange.quote_asset
    );
    Ok(())
}
