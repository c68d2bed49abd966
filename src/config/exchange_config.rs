//! Exchange configuration parsing from environment variables.
//!
//! This module handles the market data endpoint and the trading universe.

use super::Vars;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::trading::types::normalize_symbol;
use anyhow::{Context, Result};

/// Exchange environment configuration
#[derive(Debug, Clone)]
pub struct ExchangeEnvConfig {
    pub base_url: String,
    /// Bybit product category (`linear`, `inverse`, `spot`)
    pub category: String,
    pub timeframe: Timeframe,
    /// Candles requested per symbol (Bybit caps this at 1000)
    pub kline_limit: usize,
    /// When > 0, klines are requested up to `now - offset` so the forming bar is skipped
    pub kline_end_offset_minutes: i64,
    pub top_pairs_count: usize,
    pub quote_asset: String,
    /// Fixed universe; replaces the dynamic top-pairs lookup when set
    pub symbols: Option<Vec<String>>,
}

impl Default for ExchangeEnvConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bybit.com".to_string(),
            category: "linear".to_string(),
            timeframe: Timeframe::FifteenMin,
            kline_limit: 500,
            kline_end_offset_minutes: 0,
            top_pairs_count: 20,
            quote_asset: "USDT".to_string(),
            symbols: None,
        }
    }
}

impl ExchangeEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&Vars::from_env())
    }

    pub fn from_vars(vars: &Vars) -> Result<Self> {
        let defaults = Self::default();

        let timeframe = vars
            .string("KLINE_INTERVAL", defaults.timeframe.to_bybit_interval())
            .parse::<Timeframe>()
            .context("Failed to parse KLINE_INTERVAL")?;

        let kline_limit = vars.parse("KLINE_LIMIT", defaults.kline_limit)?;
        if !(1..=1000).contains(&kline_limit) {
            anyhow::bail!("KLINE_LIMIT must be between 1 and 1000, got {}", kline_limit);
        }

        let kline_end_offset_minutes =
            vars.parse("KLINE_END_OFFSET_MINUTES", defaults.kline_end_offset_minutes)?;
        if kline_end_offset_minutes < 0 {
            anyhow::bail!(
                "KLINE_END_OFFSET_MINUTES must not be negative, got {}",
                kline_end_offset_minutes
            );
        }

        let top_pairs_count = vars.parse("TOP_PAIRS_COUNT", defaults.top_pairs_count)?;
        if top_pairs_count == 0 {
            anyhow::bail!("TOP_PAIRS_COUNT must be at least 1");
        }

        let symbols = vars
            .list("SYMBOLS")
            .map(|list| list.iter().map(|s| normalize_symbol(s)).collect::<Vec<_>>())
            .filter(|list| !list.is_empty());

        Ok(Self {
            base_url: vars
                .string("BYBIT_BASE_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            category: vars.string("BYBIT_CATEGORY", &defaults.category),
            timeframe,
            kline_limit,
            kline_end_offset_minutes,
            top_pairs_count,
            quote_asset: normalize_symbol(&vars.string("QUOTE_ASSET", &defaults.quote_asset)),
            symbols,
        })
    }
}
