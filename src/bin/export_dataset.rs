//! Builds a labelled training dataset from recent Bybit candles.
//!
//! Each row holds the configured feature columns plus `symbol`, `timestamp`
//! and `target` (1 = long, 0 = short, 2 = neutral when kept).
//!
//! ```sh
//! export_dataset --output dataset.csv --forward 3 --low 0.01 --high 0.03
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use signalbot::application::feature_engineering_service::IndicatorSettings;
use signalbot::application::ml::labeling::{LabelSettings, build_dataset};
use signalbot::application::signals::PairUniverse;
use signalbot::config::Config;
use signalbot::domain::ports::MarketDataService;
use signalbot::domain::trading::types::{normalize_symbol, sort_chronologically};
use signalbot::infrastructure::BybitMarketDataService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Symbols to export (comma separated). Defaults to the top pairs.
    #[arg(short, long)]
    symbols: Option<String>,

    /// Output CSV file
    #[arg(short, long, default_value = "dataset.csv")]
    output: PathBuf,

    /// Future bars inspected per row
    #[arg(long, default_value_t = 3)]
    forward: usize,

    /// Minimum move for a long/short label (fraction of close)
    #[arg(long, default_value_t = 0.01)]
    low: f64,

    /// Maximum move for a long/short label (fraction of close)
    #[arg(long, default_value_t = 0.03)]
    high: f64,

    /// Keep neutral rows, labelled 2
    #[arg(long)]
    keep_neutral: bool,

    /// Candles per symbol (defaults to KLINE_LIMIT)
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    if cli.low > cli.high {
        anyhow::bail!("--low ({}) must not exceed --high ({})", cli.low, cli.high);
    }

    let config = Config::from_env()?;
    let market: Arc<dyn MarketDataService> = Arc::new(BybitMarketDataService::new(&config.exchange));

    let symbols: Vec<String> = match &cli.symbols {
        Some(list) => list
            .split(',')
            .map(normalize_symbol)
            .filter(|s| !s.is_empty())
            .collect(),
        None => {
            PairUniverse::new(market.clone(), &config.exchange)
                .top_pairs()
                .await
        }
    };

    let schema = config.strategy.feature_schema;
    let indicators = IndicatorSettings::from(&config.strategy);
    let labels = LabelSettings {
        forward: cli.forward,
        low: cli.low,
        high: cli.high,
        keep_neutral: cli.keep_neutral,
    };
    let limit = cli.limit.unwrap_or(config.exchange.kline_limit);

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let mut header: Vec<&str> = schema.names().to_vec();
    header.extend(["symbol", "timestamp", "target"]);
    writer.write_record(&header)?;

    let mut total = 0usize;
    for symbol in &symbols {
        let mut candles = match market
            .get_klines(symbol, config.exchange.timeframe, limit)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!("{}: skipped ({:#})", symbol, e);
                continue;
            }
        };
        sort_chronologically(&mut candles);

        let rows = match build_dataset(symbol, &candles, &indicators, schema, &labels) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("{}: skipped ({})", symbol, e);
                continue;
            }
        };

        for row in &rows {
            let mut record: Vec<String> = row.features.iter().map(|v| v.to_string()).collect();
            record.push(row.symbol.clone());
            record.push(row.timestamp.to_string());
            record.push(row.target.to_string());
            writer.write_record(&record)?;
        }
        info!("{}: {} rows", symbol, rows.len());
        total += rows.len();
    }

    writer.flush()?;
    info!(
        "Wrote {} rows for {} symbols to {}",
        total,
        symbols.len(),
        cli.output.display()
    );
    Ok(())
}
