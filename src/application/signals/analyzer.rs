use crate::application::feature_engineering_service::{IndicatorSettings, latest_vector};
use crate::application::ml::SignalClassifier;
use crate::config::Config;
use crate::domain::errors::MarketDataError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::feature_registry::FeatureSchema;
use crate::domain::ports::MarketDataService;
use crate::domain::trading::types::{Direction, TradeLevels, TradeSignal, sort_chronologically};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::observability::metrics::{
    OUTCOME_ERROR, OUTCOME_FILTERED, OUTCOME_NO_SIGNAL, OUTCOME_SIGNAL,
};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything the analyzer needs besides its adapters
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub indicators: IndicatorSettings,
    pub schema: FeatureSchema,
    pub timeframe: Timeframe,
    pub kline_limit: usize,
    pub levels: TradeLevels,
    pub min_confidence: f64,
    pub long_only: bool,
}

impl AnalyzerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            indicators: IndicatorSettings::from(&config.strategy),
            schema: config.strategy.feature_schema,
            timeframe: config.exchange.timeframe,
            kline_limit: config.exchange.kline_limit,
            levels: config.strategy.trade_levels(),
            min_confidence: config.strategy.min_confidence,
            long_only: config.strategy.long_only,
        }
    }
}

/// Turns one symbol's recent candles into at most one trade signal.
pub struct SignalAnalyzer {
    market: Arc<dyn MarketDataService>,
    classifier: Arc<dyn SignalClassifier>,
    settings: AnalyzerSettings,
    metrics: Option<Metrics>,
}

impl SignalAnalyzer {
    /// Fails when the configured feature schema cannot feed the classifier
    /// or `kline_limit` is too short for the indicator warm-up.
    pub fn new(
        market: Arc<dyn MarketDataService>,
        classifier: Arc<dyn SignalClassifier>,
        settings: AnalyzerSettings,
    ) -> Result<Self> {
        settings
            .schema
            .check_width(classifier.num_features())
            .with_context(|| {
                format!(
                    "FEATURE_SCHEMA={} does not fit the {} model",
                    settings.schema,
                    classifier.name()
                )
            })?;
        let required = settings.indicators.min_candles();
        if settings.kline_limit < required {
            anyhow::bail!(
                "KLINE_LIMIT={} is below the {} candles the indicators need",
                settings.kline_limit,
                required
            );
        }
        if let Some(columns) = classifier.feature_names() {
            settings
                .schema
                .check_columns(columns)
                .context("Model feature columns do not match FEATURE_SCHEMA")?;
        }

        Ok(Self {
            market,
            classifier,
            settings,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns `Ok(None)` when the model predicts the neutral class or the
    /// signal is filtered out by confidence or direction.
    pub async fn analyze(&self, symbol: &str) -> Result<Option<TradeSignal>> {
        let result = self.run(symbol).await;
        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(Outcome::Signal(_)) => OUTCOME_SIGNAL,
                Ok(Outcome::Neutral) => OUTCOME_NO_SIGNAL,
                Ok(Outcome::Filtered) => OUTCOME_FILTERED,
                Err(_) => OUTCOME_ERROR,
            };
            metrics.inc_analyzed(outcome);
        }

        result.map(|outcome| match outcome {
            Outcome::Signal(signal) => Some(signal),
            Outcome::Neutral | Outcome::Filtered => None,
        })
    }

    async fn run(&self, symbol: &str) -> Result<Outcome> {
        let mut candles = self
            .market
            .get_klines(symbol, self.settings.timeframe, self.settings.kline_limit)
            .await
            .with_context(|| format!("Failed to fetch klines for {}", symbol))?;
        sort_chronologically(&mut candles);

        let last_close = match candles.last() {
            Some(c) => c.close,
            None => {
                return Err(MarketDataError::EmptyCandles {
                    symbol: symbol.to_string(),
                }
                .into());
            }
        };

        let features = latest_vector(&candles, &self.settings.indicators, self.settings.schema)
            .with_context(|| format!("Failed to compute features for {}", symbol))?;

        let started = Instant::now();
        let prediction = self
            .classifier
            .predict(&features)
            .with_context(|| format!("Inference failed for {}", symbol))?;
        if let Some(metrics) = &self.metrics {
            metrics
                .inference_latency_seconds
                .observe(started.elapsed().as_secs_f64());
        }

        let Some(direction) = Direction::from_label(prediction.label) else {
            debug!(
                "SignalAnalyzer: {} neutral (label {}, p={:.3})",
                symbol, prediction.label, prediction.confidence
            );
            return Ok(Outcome::Neutral);
        };

        if self.settings.long_only && direction == Direction::Short {
            debug!("SignalAnalyzer: {} SHORT dropped (long-only)", symbol);
            return Ok(Outcome::Filtered);
        }
        if prediction.confidence < self.settings.min_confidence {
            debug!(
                "SignalAnalyzer: {} {} below confidence threshold ({:.3} < {:.3})",
                symbol, direction, prediction.confidence, self.settings.min_confidence
            );
            return Ok(Outcome::Filtered);
        }

        let entry = match self.market.get_last_price(symbol).await {
            Ok(price) if price > Decimal::ZERO => price,
            Ok(price) => {
                warn!(
                    "SignalAnalyzer: {} last price {} is not positive, using last close {}",
                    symbol, price, last_close
                );
                last_close
            }
            Err(e) => {
                warn!(
                    "SignalAnalyzer: {} last price unavailable ({}), using last close {}",
                    symbol, e, last_close
                );
                last_close
            }
        };

        Ok(Outcome::Signal(TradeSignal::new(
            symbol,
            direction,
            entry,
            prediction.confidence,
            &self.settings.levels,
        )))
    }
}

enum Outcome {
    Signal(TradeSignal),
    Neutral,
    Filtered,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ModelError;
    use crate::infrastructure::mock::MockMarketDataService;
    use rust_decimal_macros::dec;

    /// Always returns the same class probabilities
    struct FixedClassifier {
        width: usize,
        probabilities: Vec<f64>,
    }

    impl SignalClassifier for FixedClassifier {
        fn num_features(&self) -> usize {
            self.width
        }

        fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
            if features.len() != self.width {
                return Err(ModelError::FeatureWidthMismatch {
                    expected: self.width,
                    actual: features.len(),
                });
            }
            Ok(self.probabilities.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn version(&self) -> &str {
            "test"
        }
    }

    fn settings() -> AnalyzerSettings {
        AnalyzerSettings {
            indicators: IndicatorSettings::default(),
            schema: FeatureSchema::Full,
            timeframe: Timeframe::FifteenMin,
            kline_limit: 200,
            levels: TradeLevels {
                stop_loss_pct: dec!(0.5),
                take_profit_pct: dec!(1.0),
            },
            min_confidence: 0.0,
            long_only: false,
        }
    }

    fn analyzer(
        market: MockMarketDataService,
        probabilities: Vec<f64>,
        settings: AnalyzerSettings,
    ) -> SignalAnalyzer {
        let classifier = Arc::new(FixedClassifier {
            width: 10,
            probabilities,
        });
        SignalAnalyzer::new(Arc::new(market), classifier, settings).unwrap()
    }

    #[tokio::test]
    async fn test_long_signal_uses_last_price() {
        let market = MockMarketDataService::new();
        market.set_trend("BTCUSDT", 100.0, 1.0, 200);
        market.set_price("BTCUSDT", dec!(300));

        let signal = analyzer(market, vec![0.1, 0.8, 0.1], settings())
            .analyze("BTCUSDT")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.entry, dec!(300));
        assert_eq!(signal.stop_loss, dec!(298.5));
        assert_eq!(signal.take_profit, dec!(303));
        assert_eq!(signal.confidence, 0.8);
    }

    #[tokio::test]
    async fn test_entry_falls_back_to_last_close() {
        let market = MockMarketDataService::new();
        market.set_trend("ETHUSDT", 100.0, 1.0, 200);

        let signal = analyzer(market, vec![0.9, 0.1], settings())
            .analyze("ETHUSDT")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.entry, dec!(299));
        assert_eq!(signal.stop_loss, dec!(300.495));
        assert_eq!(signal.take_profit, dec!(296.01));
    }

    #[tokio::test]
    async fn test_neutral_class_yields_nothing() {
        let market = MockMarketDataService::new();
        market.set_trend("SOLUSDT", 100.0, 0.0, 200);

        let result = analyzer(market, vec![0.1, 0.2, 0.7], settings())
            .analyze("SOLUSDT")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_filters() {
        let mut long_only = settings();
        long_only.long_only = true;
        let market = MockMarketDataService::new();
        market.set_trend("XRPUSDT", 1.0, 0.01, 200);
        let result = analyzer(market, vec![0.9, 0.1], long_only)
            .analyze("XRPUSDT")
            .await
            .unwrap();
        assert!(result.is_none());

        let mut strict = settings();
        strict.min_confidence = 0.85;
        let market = MockMarketDataService::new();
        market.set_trend("XRPUSDT", 1.0, 0.01, 200);
        let result = analyzer(market, vec![0.2, 0.8], strict)
            .analyze("XRPUSDT")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_short_history_is_an_error() {
        let market = MockMarketDataService::new();
        market.set_trend("ADAUSDT", 1.0, 0.01, 20);
        let metrics = Metrics::new().unwrap();

        let err = analyzer(market, vec![0.2, 0.8], settings())
            .with_metrics(metrics.clone())
            .analyze("ADAUSDT")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ADAUSDT"));
        assert_eq!(metrics.analyzed(OUTCOME_ERROR), 1);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_an_error() {
        let market = MockMarketDataService::new();
        let result = analyzer(market, vec![0.2, 0.8], settings())
            .analyze("NOPEUSDT")
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_kline_limit_must_cover_warmup() {
        let classifier = Arc::new(FixedClassifier {
            width: 10,
            probabilities: vec![0.5, 0.5],
        });
        let mut short = settings();
        short.kline_limit = 30;

        let market = Arc::new(MockMarketDataService::new());
        let err = SignalAnalyzer::new(market.clone(), classifier.clone(), short)
            .err()
            .expect("30 candles cannot cover the warm-up");
        assert!(err.to_string().contains("KLINE_LIMIT=30"));

        let mut exact = settings();
        exact.kline_limit = IndicatorSettings::default().min_candles();
        assert!(SignalAnalyzer::new(market, classifier, exact).is_ok());
    }

    #[test]
    fn test_schema_must_fit_model() {
        let classifier = Arc::new(FixedClassifier {
            width: 6,
            probabilities: vec![0.5, 0.5],
        });
        let result = SignalAnalyzer::new(
            Arc::new(MockMarketDataService::new()),
            classifier,
            settings(),
        );
        assert!(result.is_err());
    }
}
