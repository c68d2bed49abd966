mod common;

use common::{ALL_SYMBOLS, CHAT_ID, app, config, init_logging, market, softmax_max};
use rust_decimal_macros::dec;
use signalbot::application::agents::SignalScheduler;
use signalbot::domain::trading::types::Direction;
use signalbot::infrastructure::mock::MockNotifier;
use signalbot::infrastructure::observability::metrics::{
    OUTCOME_ERROR, OUTCOME_NO_SIGNAL, OUTCOME_SIGNAL, TRIGGER_CLI,
};
use std::time::Duration;

#[tokio::test]
async fn test_scan_ranks_signals_and_isolates_failures() -> anyhow::Result<()> {
    init_logging();
    let notifier = MockNotifier::new();
    let app = app(config(&[("SYMBOLS", ALL_SYMBOLS)]), market(), &notifier)?;

    let report = app.pipeline.run(TRIGGER_CLI).await;

    assert_eq!(report.scanned, 5);
    let symbols: Vec<&str> = report.signals.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "BADUSDT");

    let best = report.best.expect("a best signal");
    assert_eq!(best.symbol, "BTCUSDT");
    assert_eq!(best.direction, Direction::Long);
    assert!((best.confidence - softmax_max(&[-1.0, 3.0, 0.5])).abs() < 1e-9);

    let sol = &report.signals[2];
    assert_eq!(sol.direction, Direction::Short);
    assert!((sol.confidence - softmax_max(&[2.0, -1.0, 0.5])).abs() < 1e-9);

    assert_eq!(app.metrics.analyzed(OUTCOME_SIGNAL), 3);
    assert_eq!(app.metrics.analyzed(OUTCOME_NO_SIGNAL), 1);
    assert_eq!(app.metrics.analyzed(OUTCOME_ERROR), 1);
    assert!(app.metrics.render().contains("signalbot_scans_total{trigger=\"cli\"} 1"));
    Ok(())
}

#[tokio::test]
async fn test_levels_follow_direction() -> anyhow::Result<()> {
    let notifier = MockNotifier::new();
    let market = market();
    market.set_price("BTCUSDT", dec!(300));
    let app = app(config(&[("SYMBOLS", "BTCUSDT,SOLUSDT")]), market, &notifier)?;

    let report = app.pipeline.run(TRIGGER_CLI).await;
    let btc = &report.signals[0];
    assert_eq!(btc.entry, dec!(300));
    assert_eq!(btc.stop_loss, dec!(298.5));
    assert_eq!(btc.take_profit, dec!(303));

    // No ticker price for SOL: entry is the last close (300 - 199)
    let sol = &report.signals[1];
    assert_eq!(sol.entry, dec!(101));
    assert_eq!(sol.stop_loss, dec!(101.505));
    assert_eq!(sol.take_profit, dec!(99.99));
    Ok(())
}

#[tokio::test]
async fn test_long_only_and_threshold() -> anyhow::Result<()> {
    let notifier = MockNotifier::new();
    let app = app(
        config(&[
            ("SYMBOLS", ALL_SYMBOLS),
            ("LONG_ONLY", "true"),
            ("MIN_CONFIDENCE", "0.85"),
        ]),
        market(),
        &notifier,
    )?;

    let report = app.pipeline.run(TRIGGER_CLI).await;
    let symbols: Vec<&str> = report.signals.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSDT"]);
    Ok(())
}

#[tokio::test]
async fn test_compact_schema_is_rejected_for_full_model() {
    let notifier = MockNotifier::new();
    let result = app(config(&[("FEATURE_SCHEMA", "compact")]), market(), &notifier);
    let err = result.err().expect("width mismatch must fail the build");
    assert!(format!("{:#}", err).contains("FEATURE_SCHEMA"));
}

#[tokio::test]
async fn test_scheduler_posts_best_signal() -> anyhow::Result<()> {
    let notifier = MockNotifier::new();
    let app = app(config(&[("SYMBOLS", ALL_SYMBOLS)]), market(), &notifier)?;
    let scheduler = SignalScheduler::new(
        std::sync::Arc::new(notifier.clone()),
        app.pipeline.clone(),
        CHAT_ID.to_string(),
        Duration::from_secs(900),
    );

    let posted = scheduler.tick().await?.expect("signal posted");
    assert_eq!(posted.symbol, "BTCUSDT");

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, CHAT_ID);
    assert!(sent[0].1.starts_with("BTCUSDT\nLONG @ "));
    assert!(sent[0].1.ends_with("Conf: 90.9%"));
    Ok(())
}

#[tokio::test]
async fn test_scheduler_stays_quiet_without_signal() -> anyhow::Result<()> {
    let notifier = MockNotifier::new();
    let app = app(config(&[("SYMBOLS", "XRPUSDT,BADUSDT")]), market(), &notifier)?;
    let scheduler = SignalScheduler::new(
        std::sync::Arc::new(notifier.clone()),
        app.pipeline.clone(),
        CHAT_ID.to_string(),
        Duration::from_secs(900),
    );

    assert!(scheduler.tick().await?.is_none());
    assert!(notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_start_spawns_background_tasks() -> anyhow::Result<()> {
    let notifier = MockNotifier::new();
    let app = app(
        config(&[("SYMBOLS", "BTCUSDT"), ("OBSERVABILITY_ENABLED", "true")]),
        market(),
        &notifier,
    )?;

    let handle = tokio_test::assert_ok!(app.start().await);
    assert_eq!(handle.task_count(), 3);
    handle.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_start_requires_chat_id() -> anyhow::Result<()> {
    let notifier = MockNotifier::new();
    let mut cfg = config(&[]);
    cfg.telegram.chat_id = None;
    let app = app(cfg, market(), &notifier)?;

    assert!(app.start().await.is_err());
    Ok(())
}
