//! Strategy configuration parsing from environment variables.
//!
//! This module handles indicator periods, the model input schema and the
//! trade-decision thresholds.

use super::Vars;
use crate::domain::ml::feature_registry::FeatureSchema;
use crate::domain::trading::types::TradeLevels;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;

/// Strategy environment configuration
#[derive(Debug, Clone)]
pub struct StrategyEnvConfig {
    // RSI
    pub rsi_period: usize,
    pub stoch_rsi_period: usize,
    pub stoch_rsi_smooth_k: usize,

    // EMA
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,

    // MACD
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,

    // ATR
    pub atr_period: usize,

    // Model
    pub feature_schema: FeatureSchema,
    pub model_path: PathBuf,

    // Signal Parameters
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub min_confidence: f64,
    pub long_only: bool,

    // Scheduling
    pub scan_concurrency: usize,
    pub signal_interval_minutes: u64,
}

impl StrategyEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&Vars::from_env())
    }

    pub fn from_vars(vars: &Vars) -> Result<Self> {
        let feature_schema = vars
            .string("FEATURE_SCHEMA", "full")
            .parse::<FeatureSchema>()
            .context("Failed to parse FEATURE_SCHEMA")?;

        let config = Self {
            rsi_period: vars.parse("RSI_PERIOD", 14)?,
            stoch_rsi_period: vars.parse("STOCH_RSI_PERIOD", 14)?,
            stoch_rsi_smooth_k: vars.parse("STOCH_RSI_SMOOTH_K", 3)?,
            ema_fast_period: vars.parse("EMA_FAST_PERIOD", 20)?,
            ema_slow_period: vars.parse("EMA_SLOW_PERIOD", 50)?,
            macd_fast_period: vars.parse("MACD_FAST_PERIOD", 12)?,
            macd_slow_period: vars.parse("MACD_SLOW_PERIOD", 26)?,
            macd_signal_period: vars.parse("MACD_SIGNAL_PERIOD", 9)?,
            atr_period: vars.parse("ATR_PERIOD", 14)?,
            feature_schema,
            model_path: vars.parse("MODEL_PATH", PathBuf::from("model.json"))?,
            stop_loss_pct: vars.parse("STOP_LOSS_PCT", dec!(0.5))?,
            take_profit_pct: vars.parse("TAKE_PROFIT_PCT", dec!(1.0))?,
            min_confidence: vars.parse("MIN_CONFIDENCE", 0.0)?,
            long_only: vars.parse_bool("LONG_ONLY", false)?,
            scan_concurrency: vars.parse("SCAN_CONCURRENCY", 4)?,
            signal_interval_minutes: vars.parse("SIGNAL_INTERVAL_MINUTES", 15)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let periods = [
            ("RSI_PERIOD", self.rsi_period),
            ("STOCH_RSI_PERIOD", self.stoch_rsi_period),
            ("STOCH_RSI_SMOOTH_K", self.stoch_rsi_smooth_k),
            ("EMA_FAST_PERIOD", self.ema_fast_period),
            ("EMA_SLOW_PERIOD", self.ema_slow_period),
            ("MACD_FAST_PERIOD", self.macd_fast_period),
            ("MACD_SLOW_PERIOD", self.macd_slow_period),
            ("MACD_SIGNAL_PERIOD", self.macd_signal_period),
            ("ATR_PERIOD", self.atr_period),
            ("SCAN_CONCURRENCY", self.scan_concurrency),
        ];
        for (key, value) in periods {
            if value == 0 {
                anyhow::bail!("{} must be greater than 0", key);
            }
        }

        if self.macd_fast_period >= self.macd_slow_period {
            anyhow::bail!(
                "MACD_FAST_PERIOD ({}) must be smaller than MACD_SLOW_PERIOD ({})",
                self.macd_fast_period,
                self.macd_slow_period
            );
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            anyhow::bail!(
                "MIN_CONFIDENCE must be between 0 and 1, got {}",
                self.min_confidence
            );
        }

        for (key, pct) in [
            ("STOP_LOSS_PCT", self.stop_loss_pct),
            ("TAKE_PROFIT_PCT", self.take_profit_pct),
        ] {
            if pct <= Decimal::ZERO || pct >= Decimal::ONE_HUNDRED {
                anyhow::bail!("{} must be between 0 and 100 (exclusive), got {}", key, pct);
            }
        }

        if self.signal_interval_minutes == 0 {
            anyhow::bail!("SIGNAL_INTERVAL_MINUTES must be at least 1");
        }

        Ok(())
    }

    pub fn trade_levels(&self) -> TradeLevels {
        TradeLevels {
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_config_defaults() {
        let config = StrategyEnvConfig::from_vars(&Vars::default()).expect("Should parse with defaults");
        assert_eq!(config.rsi_period, 14);
        assert_eq!(config.ema_fast_period, 20);
        assert_eq!(config.ema_slow_period, 50);
        assert_eq!(config.feature_schema, FeatureSchema::Full);
        assert_eq!(config.stop_loss_pct, dec!(0.5));
        assert_eq!(config.take_profit_pct, dec!(1.0));
        assert_eq!(config.min_confidence, 0.0);
        assert_eq!(config.model_path, PathBuf::from("model.json"));
    }

    #[test]
    fn test_rejects_inverted_macd_periods() {
        let vars = Vars::from_pairs([("MACD_FAST_PERIOD", "30"), ("MACD_SLOW_PERIOD", "26")]);
        assert!(StrategyEnvConfig::from_vars(&vars).is_err());
    }

    #[test]
    fn test_rejects_confidence_out_of_range() {
        let vars = Vars::from_pairs([("MIN_CONFIDENCE", "85")]);
        assert!(StrategyEnvConfig::from_vars(&vars).is_err());
    }

    #[test]
    fn test_compact_schema_and_thresholds() {
        let vars = Vars::from_pairs([
            ("FEATURE_SCHEMA", "compact"),
            ("MIN_CONFIDENCE", "0.85"),
            ("LONG_ONLY", "true"),
            ("STOP_LOSS_PCT", "1.5"),
        ]);
        let config = StrategyEnvConfig::from_vars(&vars).unwrap();
        assert_eq!(config.feature_schema, FeatureSchema::Compact);
        assert_eq!(config.min_confidence, 0.85);
        assert!(config.long_only);
        assert_eq!(config.trade_levels().stop_loss_pct, dec!(1.5));
    }
}
