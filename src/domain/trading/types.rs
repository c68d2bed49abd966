use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLCV bar. `timestamp` is the bar open time in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub turnover: Decimal,
    pub timestamp: i64,
}

impl Candle {
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }
}

/// Puts candles in chronological order (oldest first) and drops duplicate bars.
///
/// The exchange returns klines newest-first; every indicator assumes the
/// opposite.
pub fn sort_chronologically(candles: &mut Vec<Candle>) {
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
}

/// Predicted price direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Maps a classifier label to a direction. `0` is short, `1` is long,
    /// everything else means "no signal".
    pub fn from_label(label: usize) -> Option<Self> {
        match label {
            0 => Some(Direction::Short),
            1 => Some(Direction::Long),
            _ => None,
        }
    }

    pub fn label(&self) -> usize {
        match self {
            Direction::Short => 0,
            Direction::Long => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Stop-loss / take-profit distances, in percent of the entry price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeLevels {
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}

impl TradeLevels {
    /// Returns `(stop_loss, take_profit)` for an entry in the given direction.
    pub fn for_entry(&self, direction: Direction, entry: Decimal) -> (Decimal, Decimal) {
        let sl = self.stop_loss_pct / Decimal::ONE_HUNDRED;
        let tp = self.take_profit_pct / Decimal::ONE_HUNDRED;
        match direction {
            Direction::Long => (entry * (Decimal::ONE - sl), entry * (Decimal::ONE + tp)),
            Direction::Short => (entry * (Decimal::ONE + sl), entry * (Decimal::ONE - tp)),
        }
    }
}

/// A trade recommendation for one symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeSignal {
    pub symbol: String,
    pub direction: Direction,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Predicted-class probability, 0.0 to 1.0
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

impl TradeSignal {
    pub fn new(
        symbol: impl Into<String>,
        direction: Direction,
        entry: Decimal,
        confidence: f64,
        levels: &TradeLevels,
    ) -> Self {
        let (stop_loss, take_profit) = levels.for_entry(direction, entry);
        Self {
            symbol: symbol.into(),
            direction,
            entry,
            stop_loss,
            take_profit,
            confidence,
            generated_at: Utc::now(),
        }
    }
}

/// Chat message body for a signal
impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} @ {:.4}\nSL {:.4} / TP {:.4}\nConf: {:.1}%",
            self.symbol,
            self.direction,
            self.entry.round_dp(4),
            self.stop_loss.round_dp(4),
            self.take_profit.round_dp(4),
            self.confidence * 100.0
        )
    }
}

/// 24h ticker summary used to rank the trading universe
#[derive(Debug, Clone, PartialEq)]
pub struct PairTicker {
    pub symbol: String,
    pub last_price: Decimal,
    pub turnover_24h: Decimal,
}

/// Upper-cases and strips separators so `btc/usdt` and `BTCUSDT` compare equal.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
