//! In-memory adapters for tests and offline runs

use crate::domain::chat::ChatUpdate;
use crate::domain::errors::MarketDataError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::{MarketDataService, SignalNotifier};
use crate::domain::trading::types::{Candle, PairTicker};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Default)]
struct MarketState {
    candles: HashMap<String, Vec<Candle>>,
    prices: HashMap<String, Decimal>,
    tickers: Vec<PairTicker>,
    tradable: Vec<String>,
    failing: HashSet<String>,
    tickers_down: bool,
    kline_requests: usize,
}

/// Serves canned candles and tickers.
///
/// Candles are handed out newest-first, the same order the exchange uses.
#[derive(Clone, Default)]
pub struct MockMarketDataService {
    state: Arc<Mutex<MarketState>>,
}

impl MockMarketDataService {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MarketState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.with_state(|s| {
            s.candles.insert(symbol.to_string(), candles);
        });
    }

    /// `n` 15-minute bars with `close = start + step * i` and a high/low
    /// band of 0.5 around the close.
    pub fn set_trend(&self, symbol: &str, start: f64, step: f64, n: usize) {
        self.set_trend_with_spread(symbol, start, step, 0.5, n);
    }

    pub fn set_trend_with_spread(&self, symbol: &str, start: f64, step: f64, spread: f64, n: usize) {
        let closes: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        self.set_closes(symbol, &closes, spread);
    }

    /// 15-minute bars with the given closes and a high/low band of `spread`
    /// around each close. The open is the previous close, clipped to the band.
    pub fn set_closes(&self, symbol: &str, closes: &[f64], spread: f64) {
        let dec = |v: f64| Decimal::from_f64_retain(v).unwrap_or(Decimal::ZERO);
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let prev = if i == 0 { close } else { closes[i - 1] };
                let open = prev.clamp(close - spread, close + spread);
                Candle {
                    symbol: symbol.to_string(),
                    open: dec(open),
                    high: dec(close + spread),
                    low: dec(close - spread),
                    close: dec(close),
                    volume: dec(1_000.0),
                    turnover: dec(close * 1_000.0),
                    timestamp: 1_700_000_000_000 + i as i64 * Timeframe::FifteenMin.to_millis(),
                }
            })
            .collect();
        self.set_candles(symbol, candles);
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.with_state(|s| {
            s.prices.insert(symbol.to_string(), price);
        });
    }

    pub fn set_tickers(&self, tickers: Vec<PairTicker>) {
        self.with_state(|s| s.tickers = tickers);
    }

    pub fn set_tradable(&self, symbols: Vec<String>) {
        self.with_state(|s| s.tradable = symbols);
    }

    /// Every request for `symbol` fails.
    pub fn fail_symbol(&self, symbol: &str) {
        self.with_state(|s| {
            s.failing.insert(symbol.to_string());
        });
    }

    /// Ticker and instrument requests fail.
    pub fn set_tickers_down(&self, down: bool) {
        self.with_state(|s| s.tickers_down = down);
    }

    pub fn kline_requests(&self) -> usize {
        self.with_state(|s| s.kline_requests)
    }
}

#[async_trait]
impl MarketDataService for MockMarketDataService {
    async fn get_klines(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.with_state(|s| {
            s.kline_requests += 1;
            if s.failing.contains(symbol) {
                return Err(anyhow!("simulated outage for {}", symbol));
            }
            let candles = s
                .candles
                .get(symbol)
                .ok_or_else(|| MarketDataError::UnknownSymbol {
                    symbol: symbol.to_string(),
                })?;

            let skip = candles.len().saturating_sub(limit);
            Ok(candles[skip..].iter().rev().cloned().collect())
        })
    }

    async fn get_last_price(&self, symbol: &str) -> Result<Decimal> {
        self.with_state(|s| {
            s.prices.get(symbol).copied().ok_or_else(|| {
                MarketDataError::UnknownSymbol {
                    symbol: symbol.to_string(),
                }
                .into()
            })
        })
    }

    async fn get_tickers(&self) -> Result<Vec<PairTicker>> {
        self.with_state(|s| {
            if s.tickers_down {
                return Err(anyhow!("simulated ticker outage"));
            }
            Ok(s.tickers.clone())
        })
    }

    async fn get_tradable_symbols(&self) -> Result<Vec<String>> {
        self.with_state(|s| {
            if s.tickers_down {
                return Err(anyhow!("simulated instruments outage"));
            }
            Ok(s.tradable.clone())
        })
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }
}

/// Records outgoing messages and replays queued updates.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    updates: Arc<Mutex<VecDeque<ChatUpdate>>>,
    polled_offsets: Arc<Mutex<Vec<i64>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_update(&self, update_id: i64, chat_id: &str, text: &str) {
        let mut updates = self.updates.lock().unwrap_or_else(|p| p.into_inner());
        updates.push_back(ChatUpdate {
            update_id,
            chat_id: chat_id.to_string(),
            text: Some(text.to_string()),
        });
    }

    /// `(chat_id, text)` pairs in send order
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn polled_offsets(&self) -> Vec<i64> {
        self.polled_offsets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl SignalNotifier for MockNotifier {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        debug!("MockNotifier: -> {}: {}", chat_id, text);
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn poll_updates(&self, offset: i64, _timeout_secs: u64) -> Result<Vec<ChatUpdate>> {
        self.polled_offsets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(offset);

        let batch: Vec<ChatUpdate> = {
            let mut updates = self.updates.lock().unwrap_or_else(|p| p.into_inner());
            updates.retain(|u| u.update_id >= offset);
            updates.drain(..).collect()
        };

        if batch.is_empty() {
            // Behave like an idle long poll so callers do not spin.
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        Ok(batch)
    }
}
