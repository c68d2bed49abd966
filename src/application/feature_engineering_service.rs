use crate::config::StrategyEnvConfig;
use crate::domain::errors::FeatureError;
use crate::domain::ml::feature_registry::{FeatureRow, FeatureSchema};
use crate::domain::trading::types::Candle;
use rust_decimal::prelude::ToPrimitive;
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, Maximum, Minimum, SimpleMovingAverage};

/// Indicator periods used to build a [`FeatureRow`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub stoch_rsi_period: usize,
    pub stoch_rsi_smooth_k: usize,
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub atr_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            stoch_rsi_period: 14,
            stoch_rsi_smooth_k: 3,
            ema_fast_period: 20,
            ema_slow_period: 50,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            atr_period: 14,
        }
    }
}

impl From<&StrategyEnvConfig> for IndicatorSettings {
    fn from(config: &StrategyEnvConfig) -> Self {
        Self {
            rsi_period: config.rsi_period,
            stoch_rsi_period: config.stoch_rsi_period,
            stoch_rsi_smooth_k: config.stoch_rsi_smooth_k,
            ema_fast_period: config.ema_fast_period,
            ema_slow_period: config.ema_slow_period,
            macd_fast_period: config.macd_fast_period,
            macd_slow_period: config.macd_slow_period,
            macd_signal_period: config.macd_signal_period,
            atr_period: config.atr_period,
        }
    }
}

impl IndicatorSettings {
    /// Number of leading bars for which at least one indicator is still
    /// undefined. Dropping them is the same as dropping rows with missing
    /// values from the full indicator table.
    pub fn warmup_bars(&self) -> usize {
        let ema = self.ema_fast_period.max(self.ema_slow_period).saturating_sub(1);
        let macd = (self.macd_fast_period.max(self.macd_slow_period) + self.macd_signal_period)
            .saturating_sub(2);
        // Stochastic RSI runs its own RSI over the stochastic window
        let stoch = (2 * self.stoch_rsi_period + self.stoch_rsi_smooth_k).saturating_sub(3);
        let rsi = self.rsi_period.saturating_sub(1);
        let atr = self.atr_period.saturating_sub(1);
        ema.max(macd).max(stoch).max(rsi).max(atr)
    }

    /// Smallest candle count that yields at least one feature row.
    pub fn min_candles(&self) -> usize {
        self.warmup_bars() + 1
    }
}

fn invalid(name: &str, err: impl std::fmt::Debug) -> FeatureError {
    FeatureError::InvalidParameter(format!("{}: {:?}", name, err))
}

fn positive(name: &str, period: usize) -> Result<usize, FeatureError> {
    if period == 0 {
        return Err(FeatureError::InvalidParameter(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(period)
}

/// Relative strength index with Wilder smoothing (`alpha = 1/n`).
///
/// Average gain and loss start from a zero change on the first bar. The
/// value is 100 while the average loss is zero, flat series included.
pub struct WilderRsi {
    alpha: f64,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
}

impl WilderRsi {
    pub fn new(period: usize) -> Result<Self, FeatureError> {
        Ok(Self {
            alpha: 1.0 / positive("rsi_period", period)? as f64,
            prev_close: None,
            avg_gain: 0.0,
            avg_loss: 0.0,
        })
    }

    pub fn next(&mut self, close: f64) -> f64 {
        if let Some(prev) = self.prev_close {
            let change = close - prev;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            self.avg_gain = (1.0 - self.alpha) * self.avg_gain + self.alpha * gain;
            self.avg_loss = (1.0 - self.alpha) * self.avg_loss + self.alpha * loss;
        }
        self.prev_close = Some(close);

        if self.avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + self.avg_gain / self.avg_loss)
        }
    }
}

/// Average true range with Wilder smoothing.
///
/// Seeded with the mean of the first `n` true ranges (the first bar counts
/// as `high - low`), then `atr = (atr * (n - 1) + tr) / n`. Reads 0 until
/// the seed is complete.
pub struct WilderAtr {
    period: usize,
    prev_close: Option<f64>,
    seen: usize,
    seed_sum: f64,
    value: f64,
}

impl WilderAtr {
    pub fn new(period: usize) -> Result<Self, FeatureError> {
        Ok(Self {
            period: positive("atr_period", period)?,
            prev_close: None,
            seen: 0,
            seed_sum: 0.0,
            value: 0.0,
        })
    }

    pub fn next(&mut self, high: f64, low: f64, close: f64) -> f64 {
        let range = high - low;
        let tr = match self.prev_close {
            Some(prev) => range.max((high - prev).abs()).max((low - prev).abs()),
            None => range,
        };
        self.prev_close = Some(close);
        self.seen += 1;

        let n = self.period as f64;
        if self.seen < self.period {
            self.seed_sum += tr;
        } else if self.seen == self.period {
            self.seed_sum += tr;
            self.value = self.seed_sum / n;
        } else {
            self.value = (self.value * (n - 1.0) + tr) / n;
        }
        self.value
    }
}

/// MACD line and signal line.
///
/// The signal EMA starts on the first bar where the slow EMA is defined
/// rather than on the very first bar.
pub struct MacdLines {
    fast: ExponentialMovingAverage,
    slow: ExponentialMovingAverage,
    signal: ExponentialMovingAverage,
    signal_start: usize,
    seen: usize,
    last_signal: f64,
}

impl MacdLines {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self, FeatureError> {
        Ok(Self {
            fast: ExponentialMovingAverage::new(fast)
                .map_err(|e| invalid("macd_fast_period", e))?,
            slow: ExponentialMovingAverage::new(slow)
                .map_err(|e| invalid("macd_slow_period", e))?,
            signal: ExponentialMovingAverage::new(signal)
                .map_err(|e| invalid("macd_signal_period", e))?,
            signal_start: fast.max(slow),
            seen: 0,
            last_signal: 0.0,
        })
    }

    /// Returns `(macd, signal)`.
    pub fn next(&mut self, close: f64) -> (f64, f64) {
        let macd = self.fast.next(close) - self.slow.next(close);
        self.seen += 1;
        if self.seen >= self.signal_start {
            self.last_signal = self.signal.next(macd);
        }
        (macd, self.last_signal)
    }
}

/// Stochastic RSI, `%K` line
///
/// `(rsi - min(rsi, n)) / (max(rsi, n) - min(rsi, n))` over a Wilder RSI of
/// the same window `n`, smoothed by an SMA. A flat RSI window yields 0.
pub struct StochasticRsi {
    rsi: WilderRsi,
    max: Maximum,
    min: Minimum,
    smooth_k: SimpleMovingAverage,
}

impl StochasticRsi {
    pub fn new(period: usize, smooth_k: usize) -> Result<Self, FeatureError> {
        Ok(Self {
            rsi: WilderRsi::new(positive("stoch_rsi_period", period)?)?,
            max: Maximum::new(period).map_err(|e| invalid("stoch_rsi_period", e))?,
            min: Minimum::new(period).map_err(|e| invalid("stoch_rsi_period", e))?,
            smooth_k: SimpleMovingAverage::new(smooth_k)
                .map_err(|e| invalid("stoch_rsi_smooth_k", e))?,
        })
    }

    pub fn next(&mut self, close: f64) -> f64 {
        let rsi = self.rsi.next(close);
        let highest = self.max.next(rsi);
        let lowest = self.min.next(rsi);
        let range = highest - lowest;
        let raw = if range > 1e-12 {
            (rsi - lowest) / range
        } else {
            0.0
        };
        self.smooth_k.next(raw)
    }
}

/// Streaming indicator state for one symbol
pub struct TechnicalFeatureEngineeringService {
    rsi: WilderRsi,
    stoch_rsi: StochasticRsi,
    ema_fast: ExponentialMovingAverage,
    ema_slow: ExponentialMovingAverage,
    macd: MacdLines,
    atr: WilderAtr,
}

impl TechnicalFeatureEngineeringService {
    pub fn new(settings: &IndicatorSettings) -> Result<Self, FeatureError> {
        Ok(Self {
            rsi: WilderRsi::new(settings.rsi_period)?,
            stoch_rsi: StochasticRsi::new(settings.stoch_rsi_period, settings.stoch_rsi_smooth_k)?,
            ema_fast: ExponentialMovingAverage::new(settings.ema_fast_period)
                .map_err(|e| invalid("ema_fast_period", e))?,
            ema_slow: ExponentialMovingAverage::new(settings.ema_slow_period)
                .map_err(|e| invalid("ema_slow_period", e))?,
            macd: MacdLines::new(
                settings.macd_fast_period,
                settings.macd_slow_period,
                settings.macd_signal_period,
            )?,
            atr: WilderAtr::new(settings.atr_period)?,
        })
    }

    /// Feeds one bar (in chronological order) and returns its feature row.
    pub fn update(&mut self, candle: &Candle) -> FeatureRow {
        let close = candle.close.to_f64().unwrap_or(0.0);
        let high = candle.high.to_f64().unwrap_or(close);
        let low = candle.low.to_f64().unwrap_or(close);
        let volume = candle.volume.to_f64().unwrap_or(0.0);

        let (macd, macd_signal) = self.macd.next(close);
        let volatility = if close > 0.0 { (high - low) / close } else { 0.0 };

        FeatureRow {
            timestamp: candle.timestamp,
            rsi: self.rsi.next(close),
            stoch_rsi: self.stoch_rsi.next(close),
            ema_fast: self.ema_fast.next(close),
            ema_slow: self.ema_slow.next(close),
            macd,
            macd_signal,
            atr: self.atr.next(high, low, close),
            volatility,
            volume,
            close,
        }
    }
}

/// Computes feature rows for a chronologically ordered candle series.
///
/// Rows inside the indicator warm-up window are dropped, so the output has
/// `candles.len() - warmup_bars()` rows aligned with the tail of the input.
pub fn compute_features(
    candles: &[Candle],
    settings: &IndicatorSettings,
) -> Result<Vec<FeatureRow>, FeatureError> {
    let required = settings.min_candles();
    if candles.len() < required {
        return Err(FeatureError::InsufficientHistory {
            required,
            available: candles.len(),
        });
    }

    let mut service = TechnicalFeatureEngineeringService::new(settings)?;
    let warmup = settings.warmup_bars();

    Ok(candles
        .iter()
        .map(|c| service.update(c))
        .skip(warmup)
        .collect())
}

/// Feature row for the most recent bar.
pub fn latest_features(
    candles: &[Candle],
    settings: &IndicatorSettings,
) -> Result<FeatureRow, FeatureError> {
    let mut rows = compute_features(candles, settings)?;
    rows.pop()
        .ok_or(FeatureError::InsufficientHistory {
            required: settings.min_candles(),
            available: candles.len(),
        })
}

/// Model input for the most recent bar, in `schema` column order.
pub fn latest_vector(
    candles: &[Candle],
    settings: &IndicatorSettings,
    schema: FeatureSchema,
) -> Result<Vec<f64>, FeatureError> {
    latest_features(candles, settings).map(|row| schema.vector(&row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn candle(i: i64, close: f64, spread: f64) -> Candle {
        let dec = |v: f64| Decimal::from_f64_retain(v).unwrap_or(Decimal::ZERO);
        Candle {
            symbol: "BTCUSDT".to_string(),
            open: dec(close),
            high: dec(close + spread),
            low: dec(close - spread),
            close: dec(close),
            volume: dec(1000.0 + i as f64),
            turnover: dec(close * 1000.0),
            timestamp: i * 900_000,
        }
    }

    fn trending(n: i64, step: f64) -> Vec<Candle> {
        (0..n).map(|i| candle(i, 100.0 + step * i as f64, 0.5)).collect()
    }

    #[test]
    fn test_warmup_uses_longest_indicator() {
        let settings = IndicatorSettings::default();
        // EMA(50) first defined on bar 49; MACD signal on 33, stoch-RSI on 28
        assert_eq!(settings.warmup_bars(), 49);
        assert_eq!(settings.min_candles(), 50);
    }

    #[test]
    fn test_insufficient_history() {
        let settings = IndicatorSettings::default();
        let err = compute_features(&trending(30, 1.0), &settings).unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientHistory {
                required: 50,
                available: 30
            }
        );
    }

    #[test]
    fn test_rows_align_with_tail() {
        let settings = IndicatorSettings::default();
        let candles = trending(120, 1.0);
        let rows = compute_features(&candles, &settings).unwrap();

        assert_eq!(rows.len(), 120 - 49);
        assert_eq!(rows.first().unwrap().timestamp, candles[49].timestamp);
        assert_eq!(rows.last().unwrap().timestamp, candles[119].timestamp);
    }

    #[test]
    fn test_uptrend_features() {
        let settings = IndicatorSettings::default();
        let row = latest_features(&trending(200, 1.0), &settings).unwrap();

        // No losses at all
        assert_eq!(row.rsi, 100.0);
        assert!(row.ema_fast > row.ema_slow);
        assert!(row.macd > 0.0);
        assert!(row.atr > 0.0);
        assert_eq!(row.close, 299.0);
        assert!((row.volatility - 1.0 / 299.0).abs() < 1e-9);
    }

    #[test]
    fn test_downtrend_features() {
        let settings = IndicatorSettings::default();
        let row = latest_features(&trending(200, -0.4), &settings).unwrap();

        assert!(row.rsi.abs() < 1e-9, "no gains at all: {}", row.rsi);
        assert!(row.ema_fast < row.ema_slow);
        assert!(row.macd < 0.0);
    }

    #[test]
    fn test_flat_market_is_neutral() {
        let settings = IndicatorSettings::default();
        let flat: Vec<Candle> = (0..100).map(|i| candle(i, 50.0, 0.0)).collect();
        let row = latest_features(&flat, &settings).unwrap();

        assert_eq!(row.rsi, 100.0);
        assert_eq!(row.stoch_rsi, 0.0);
        assert!(row.macd.abs() < 1e-9);
        assert!(row.atr.abs() < 1e-9);
        assert_eq!(row.volatility, 0.0);
    }

    #[test]
    fn test_stoch_rsi_stays_in_unit_range() {
        let mut stoch = StochasticRsi::new(14, 3).unwrap();
        for i in 0..300 {
            let price = 100.0 + (i as f64 / 5.0).sin() * 10.0;
            let v = stoch.next(price);
            assert!(v > -1e-9 && v < 1.0 + 1e-9, "out of range at {}: {}", i, v);
        }
    }

    #[test]
    fn test_latest_vector_follows_schema() {
        let settings = IndicatorSettings::default();
        let candles = trending(80, 1.0);

        let full = latest_vector(&candles, &settings, FeatureSchema::Full).unwrap();
        let compact = latest_vector(&candles, &settings, FeatureSchema::Compact).unwrap();
        assert_eq!(full.len(), 10);
        assert_eq!(compact.len(), 6);
        assert_eq!(full[9], 179.0);
        assert_eq!(compact[5], 179.0);
        assert_eq!(full[0], compact[0]);
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let settings = IndicatorSettings {
            atr_period: 0,
            ..Default::default()
        };
        assert!(matches!(
            TechnicalFeatureEngineeringService::new(&settings),
            Err(FeatureError::InvalidParameter(_))
        ));
    }

    /// Choppy series on a 0.25 grid so every price is exact in both f64 and
    /// Decimal.
    fn reference_series() -> Vec<Candle> {
        let dec = |v: f64| Decimal::from_f64_retain(v).unwrap();
        (0..80i64)
            .map(|i| {
                let wave = ((i * 37) % 23) as f64;
                let close = 100.0 + 0.25 * i as f64 + 0.5 * wave;
                let high = close + 0.5 + ((i * 11) % 7) as f64 * 0.25;
                let low = close - 0.5 - ((i * 5) % 3) as f64 * 0.25;
                Candle {
                    symbol: "REFUSDT".to_string(),
                    open: dec(close),
                    high: dec(high),
                    low: dec(low),
                    close: dec(close),
                    volume: dec(1000.0 + i as f64),
                    turnover: dec(close * 1000.0),
                    timestamp: i,
                }
            })
            .collect()
    }

    fn assert_row(row: &FeatureRow, expected: [f64; 8]) {
        let actual = [
            row.rsi,
            row.stoch_rsi,
            row.ema_fast,
            row.ema_slow,
            row.macd,
            row.macd_signal,
            row.atr,
            row.volatility,
        ];
        let names = [
            "rsi", "stoch_rsi", "ema_fast", "ema_slow", "macd", "macd_signal", "atr", "volatility",
        ];
        for ((name, a), e) in names.iter().zip(actual).zip(expected) {
            assert!(
                (a - e).abs() < 1e-4,
                "{} at bar {}: got {}, expected {}",
                name,
                row.timestamp,
                a,
                e
            );
        }
    }

    #[test]
    fn test_reference_values() {
        // Expected values follow the Python `ta` definitions (RSIIndicator,
        // StochRSIIndicator.stochrsi_k, EMAIndicator, MACD, AverageTrueRange)
        let rows = compute_features(&reference_series(), &IndicatorSettings::default()).unwrap();

        assert_eq!(rows.len(), 31);
        assert_eq!(rows[0].timestamp, 49);
        assert_row(
            &rows[0],
            [55.191272, 0.591323, 115.43207, 111.767813, 1.8307, 1.787388, 6.429464, 0.01232],
        );
        assert_eq!(rows[14].timestamp, 63);
        assert_row(
            &rows[14],
            [51.294413, 0.408871, 118.84334, 115.15492, 1.776745, 1.805211, 6.40314, 0.008351],
        );
        assert_row(
            &rows[30],
            [49.325108, 0.536848, 122.471682, 118.97956, 1.472706, 1.647375, 6.247357, 0.014493],
        );
    }

    #[test]
    fn test_rsi_uses_wilder_smoothing() {
        // Alternating +1/-1 settles at 100 / (2 - 1/14) = 51.85 after a gain
        let mut rsi = WilderRsi::new(14).unwrap();
        let mut last = (0.0, 0.0);
        for i in 0..200 {
            let value = rsi.next(if i % 2 == 0 { 100.0 } else { 101.0 });
            last = (last.1, value);
        }
        assert!((last.0 - 48.148148).abs() < 1e-4, "after a loss: {}", last.0);
        assert!((last.1 - 51.851853).abs() < 1e-4, "after a gain: {}", last.1);
    }

    #[test]
    fn test_atr_seeds_with_mean_true_range() {
        let mut atr = WilderAtr::new(3).unwrap();
        assert_eq!(atr.next(11.0, 9.0, 10.0), 0.0);
        assert_eq!(atr.next(12.0, 10.0, 11.0), 0.0);
        // True ranges 2, 2, 5 (gap up from 11)
        assert_eq!(atr.next(16.0, 14.0, 15.0), 3.0);
        // (3 * 2 + 6) / 3 with the range measured from the previous close
        assert_eq!(atr.next(21.0, 19.0, 20.0), 4.0);
    }

    #[test]
    fn test_zero_rsi_period_is_rejected() {
        let settings = IndicatorSettings {
            rsi_period: 0,
            ..Default::default()
        };
        assert!(matches!(
            TechnicalFeatureEngineeringService::new(&settings),
            Err(FeatureError::InvalidParameter(_))
        ));
    }
}
