//! Bybit v5 response envelope and row parsing

use crate::domain::errors::MarketDataError;
use crate::domain::trading::types::Candle;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;

/// Every v5 response is wrapped in `{retCode, retMsg, result}`
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl Envelope {
    /// Checks `retCode` and decodes `result`.
    pub fn into_result<T: DeserializeOwned>(self, endpoint: &str) -> Result<T> {
        if self.ret_code != 0 {
            return Err(MarketDataError::Api {
                endpoint: endpoint.to_string(),
                code: self.ret_code,
                message: self.ret_msg,
            }
            .into());
        }
        serde_json::from_value(self.result)
            .with_context(|| format!("Unexpected result payload from {}", endpoint))
    }
}

#[derive(Debug, Deserialize)]
pub struct KlineResult {
    #[serde(default)]
    pub list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct TickerResult {
    #[serde(default)]
    pub list: Vec<TickerRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerRow {
    pub symbol: String,
    #[serde(default)]
    pub last_price: String,
    #[serde(default, rename = "turnover24h")]
    pub turnover_24h: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentsResult {
    #[serde(default)]
    pub list: Vec<InstrumentRow>,
    #[serde(default)]
    pub next_page_cursor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRow {
    pub symbol: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeResult {
    pub time_second: String,
}

fn decimal(symbol: &str, field: &str, raw: &str) -> Result<Decimal, MarketDataError> {
    Decimal::from_str(raw).map_err(|e| MarketDataError::InvalidData {
        symbol: symbol.to_string(),
        reason: format!("{} '{}': {}", field, raw, e),
    })
}

/// Parses one `[start, open, high, low, close, volume, turnover]` row.
pub fn parse_kline_row(symbol: &str, row: &[String]) -> Result<Candle, MarketDataError> {
    if row.len() < 7 {
        return Err(MarketDataError::InvalidData {
            symbol: symbol.to_string(),
            reason: format!("kline row has {} fields, expected 7", row.len()),
        });
    }
    let timestamp = row[0].parse::<i64>().map_err(|e| MarketDataError::InvalidData {
        symbol: symbol.to_string(),
        reason: format!("start '{}': {}", row[0], e),
    })?;

    Ok(Candle {
        symbol: symbol.to_string(),
        open: decimal(symbol, "open", &row[1])?,
        high: decimal(symbol, "high", &row[2])?,
        low: decimal(symbol, "low", &row[3])?,
        close: decimal(symbol, "close", &row[4])?,
        volume: decimal(symbol, "volume", &row[5])?,
        turnover: decimal(symbol, "turnover", &row[6])?,
        timestamp,
    })
}

/// Parses a ticker price field, treating blanks as zero.
pub fn parse_price(symbol: &str, field: &str, raw: &str) -> Result<Decimal, MarketDataError> {
    if raw.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    decimal(symbol, field, raw)
}
