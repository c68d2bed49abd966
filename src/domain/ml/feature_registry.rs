use crate::domain::errors::FeatureError;
use anyhow::anyhow;
use std::fmt;
use std::str::FromStr;

/// Column order of the `full` schema.
/// This order MUST match the order used when the model was trained.
/// Any change here is a breaking change for ML models.
pub const FULL_FEATURE_NAMES: &[&str] = &[
    "rsi",
    "stoch_rsi",
    "ema20",
    "ema50",
    "macd",
    "macd_signal",
    "atr",
    "volatility",
    "volume",
    "close",
];

/// Column order of the `compact` schema.
pub const COMPACT_FEATURE_NAMES: &[&str] =
    &["rsi", "ema20", "ema50", "volatility", "volume", "close"];

/// Every indicator value computed for a single closed bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    pub timestamp: i64,
    pub rsi: f64,
    pub stoch_rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub atr: f64,
    pub volatility: f64,
    pub volume: f64,
    pub close: f64,
}

/// Named, ordered subset of [`FeatureRow`] fed to the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureSchema {
    #[default]
    Full,
    Compact,
}

impl FeatureSchema {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            FeatureSchema::Full => FULL_FEATURE_NAMES,
            FeatureSchema::Compact => COMPACT_FEATURE_NAMES,
        }
    }

    pub fn width(&self) -> usize {
        self.names().len()
    }

    /// Converts a row into the model input vector, in column order.
    pub fn vector(&self, row: &FeatureRow) -> Vec<f64> {
        match self {
            FeatureSchema::Full => vec![
                row.rsi,
                row.stoch_rsi,
                row.ema_fast,
                row.ema_slow,
                row.macd,
                row.macd_signal,
                row.atr,
                row.volatility,
                row.volume,
                row.close,
            ],
            FeatureSchema::Compact => vec![
                row.rsi,
                row.ema_fast,
                row.ema_slow,
                row.volatility,
                row.volume,
                row.close,
            ],
        }
    }

    /// Fails unless this schema produces exactly `expected` features.
    pub fn check_width(&self, expected: usize) -> Result<(), FeatureError> {
        check_width(expected, self.width())
    }

    /// Fails unless `columns` (as recorded by the trainer) match this schema
    /// name for name, in order.
    pub fn check_columns(&self, columns: &[String]) -> Result<(), FeatureError> {
        let names = self.names();
        if columns.len() == names.len() && columns.iter().zip(names).all(|(c, n)| c.as_str() == *n) {
            return Ok(());
        }
        Err(FeatureError::ColumnMismatch {
            expected: columns.to_vec(),
            actual: names.iter().map(|n| n.to_string()).collect(),
        })
    }
}

pub fn check_width(expected: usize, actual: usize) -> Result<(), FeatureError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FeatureError::WidthMismatch { expected, actual })
    }
}

impl FromStr for FeatureSchema {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(FeatureSchema::Full),
            "compact" => Ok(FeatureSchema::Compact),
            _ => Err(anyhow!(
                "Invalid FEATURE_SCHEMA: {}. Must be 'full' or 'compact'",
                s
            )),
        }
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSchema::Full => write!(f, "full"),
            FeatureSchema::Compact => write!(f, "compact"),
        }
    }
}
