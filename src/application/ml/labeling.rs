//! Forward-return labels for building training datasets

use crate::application::feature_engineering_service::{IndicatorSettings, compute_features};
use crate::domain::errors::FeatureError;
use crate::domain::ml::feature_registry::{FeatureRow, FeatureSchema};
use crate::domain::trading::types::{Candle, Direction};

/// Label written for rows that are neither long nor short
pub const NEUTRAL_LABEL: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelSettings {
    /// Number of future closes inspected
    pub forward: usize,
    /// Minimum move, as a fraction of the close
    pub low: f64,
    /// Maximum move, as a fraction of the close
    pub high: f64,
    pub keep_neutral: bool,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            forward: 3,
            low: 0.01,
            high: 0.03,
            keep_neutral: false,
        }
    }
}

/// Labels a bar from the closes that follow it.
///
/// `Some(1)` (long) when the best upward move lands in `[low, high]`,
/// otherwise `Some(0)` (short) when the worst downward move does, otherwise
/// `None`.
pub fn label_for(close: f64, future: &[f64], settings: &LabelSettings) -> Option<usize> {
    if future.is_empty() || close <= 0.0 {
        return None;
    }
    let max = future.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = future.iter().copied().fold(f64::INFINITY, f64::min);

    let up = (max - close) / close;
    let down = (close - min) / close;
    let in_band = |r: f64| r >= settings.low && r <= settings.high;

    if in_band(up) {
        Some(Direction::Long.label())
    } else if in_band(down) {
        Some(Direction::Short.label())
    } else {
        None
    }
}

/// One labelled training example
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub symbol: String,
    pub timestamp: i64,
    pub features: Vec<f64>,
    pub target: usize,
}

/// Computes features for a chronologically ordered series and attaches a
/// label to each row. Rows without `forward` future bars are dropped, and
/// neutral rows unless `keep_neutral` is set.
pub fn build_dataset(
    symbol: &str,
    candles: &[Candle],
    indicators: &IndicatorSettings,
    schema: FeatureSchema,
    labels: &LabelSettings,
) -> Result<Vec<DatasetRow>, FeatureError> {
    if labels.forward == 0 {
        return Err(FeatureError::InvalidParameter(
            "forward: must be at least 1".to_string(),
        ));
    }

    let rows: Vec<FeatureRow> = compute_features(candles, indicators)?;
    let closes: Vec<f64> = candles.iter().map(|c| c.close_f64()).collect();
    let offset = candles.len() - rows.len();

    Ok(rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let idx = offset + i;
            let future = closes.get(idx + 1..=idx + labels.forward)?;
            let target = match label_for(closes[idx], future, labels) {
                Some(label) => label,
                None if labels.keep_neutral => NEUTRAL_LABEL,
                None => return None,
            };
            Some(DatasetRow {
                symbol: symbol.to_string(),
                timestamp: row.timestamp,
                features: schema.vector(row),
                target,
            })
        })
        .collect())
}
