#![allow(dead_code)]

use signalbot::application::ml::XgboostClassifier;
use signalbot::application::system::Application;
use signalbot::config::{Config, Vars};
use signalbot::domain::ports::SignalNotifier;
use signalbot::infrastructure::mock::{MockMarketDataService, MockNotifier};
use signalbot::infrastructure::observability::Metrics;
use std::sync::Arc;

pub const CHAT_ID: &str = "4242";

/// Three-class model over the full schema: rsi < 40 favours short, rsi >= 60
/// favours long, low volatility adds to long, everything else is neutral.
pub const DIRECTION_MODEL: &str = include_str!("../fixtures/direction_model.json");

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

pub fn config(extra: &[(&str, &str)]) -> Config {
    let mut pairs: Vec<(String, String)> = vec![
        ("CHAT_ID".into(), CHAT_ID.into()),
        ("TELEGRAM_TOKEN".into(), "test-token".into()),
        ("KLINE_LIMIT".into(), "200".into()),
        ("OBSERVABILITY_ENABLED".into(), "false".into()),
    ];
    pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_vars(&Vars::from_pairs(pairs)).expect("test config")
}

/// BTC: clean uptrend, ETH: noisy uptrend, SOL: downtrend, XRP: choppy
/// (RSI near 50), BAD: exchange errors.
pub fn market() -> MockMarketDataService {
    let market = MockMarketDataService::new();
    market.set_trend_with_spread("BTCUSDT", 100.0, 1.0, 0.1, 200);
    market.set_trend_with_spread("ETHUSDT", 100.0, 1.0, 2.0, 200);
    market.set_trend_with_spread("SOLUSDT", 300.0, -1.0, 2.0, 200);
    let chop: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
    market.set_closes("XRPUSDT", &chop, 0.5);
    market.set_trend("BADUSDT", 100.0, 1.0, 200);
    market.fail_symbol("BADUSDT");
    market
}

pub const ALL_SYMBOLS: &str = "BTCUSDT,ETHUSDT,SOLUSDT,XRPUSDT,BADUSDT";

pub fn app(
    config: Config,
    market: MockMarketDataService,
    notifier: &MockNotifier,
) -> anyhow::Result<Application> {
    let classifier = Arc::new(XgboostClassifier::from_json(DIRECTION_MODEL)?);
    let notifier: Arc<dyn SignalNotifier> = Arc::new(notifier.clone());
    Application::build_with(
        config,
        Arc::new(market),
        classifier,
        Some(notifier),
        Metrics::new()?,
    )
}

/// softmax probability of the winning class given per-class margins
pub fn softmax_max(margins: &[f64]) -> f64 {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = margins.iter().map(|m| (m - max).exp()).sum();
    1.0 / sum
}
