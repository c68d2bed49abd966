use crate::domain::chat::ChatUpdate;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::trading::types::{Candle, PairTicker};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

// Need async_trait for async functions in traits
#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Most recent `limit` bars, oldest first.
    async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>>;
    async fn get_last_price(&self, symbol: &str) -> Result<Decimal>;
    async fn get_tickers(&self) -> Result<Vec<PairTicker>>;
    /// Symbols whose instrument status is "Trading".
    async fn get_tradable_symbols(&self) -> Result<Vec<String>>;
    async fn get_server_time(&self) -> Result<DateTime<Utc>>;
}

#[async_trait]
pub trait SignalNotifier: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
    /// Long-polls for incoming messages with `update_id >= offset`.
    async fn poll_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<ChatUpdate>>;
}
