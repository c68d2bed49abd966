//! Bybit v5 public market data
//!
//! Candles, tickers, instrument status and server time over REST. No API
//! key is needed for any of these endpoints.

use super::common::{
    Envelope, InstrumentsResult, KlineResult, TickerResult, TimeResult, parse_kline_row,
    parse_price,
};
use crate::config::ExchangeEnvConfig;
use crate::domain::errors::MarketDataError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::MarketDataService;
use crate::domain::trading::types::{Candle, PairTicker, sort_chronologically};
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info, warn};

const KLINE: &str = "/v5/market/kline";
const TICKERS: &str = "/v5/market/tickers";
const INSTRUMENTS: &str = "/v5/market/instruments-info";
const TIME: &str = "/v5/market/time";

/// Upper bound on instrument pages, in case the cursor never runs out
const MAX_INSTRUMENT_PAGES: usize = 20;

pub struct BybitMarketDataService {
    client: ClientWithMiddleware,
    base_url: String,
    category: String,
    kline_end_offset: Duration,
    metrics: Option<Metrics>,
}

impl BybitMarketDataService {
    pub fn new(config: &ExchangeEnvConfig) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: config.base_url.clone(),
            category: config.category.clone(),
            kline_end_offset: Duration::minutes(config.kline_end_offset_minutes),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, String)]) -> Result<T> {
        let url = build_url_with_query(&self.base_url, endpoint, params)?;
        debug!("Bybit GET {}", url);

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to call Bybit {}", endpoint))?;
        if let Some(metrics) = &self.metrics {
            metrics.observe_api_latency(endpoint, started.elapsed().as_secs_f64());
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Bybit {} returned HTTP {}: {}", endpoint, status, error_text);
        }

        let envelope: Envelope = response
            .json()
            .await
            .with_context(|| format!("Failed to parse Bybit {} response", endpoint))?;
        envelope.into_result(endpoint)
    }
}

#[async_trait]
impl MarketDataService for BybitMarketDataService {
    async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let mut params = vec![
            ("category", self.category.clone()),
            ("symbol", symbol.to_string()),
            ("interval", timeframe.to_bybit_interval().to_string()),
            ("limit", limit.to_string()),
        ];
        // Exclude the bar that is still forming
        if self.kline_end_offset > Duration::zero() {
            let end = Utc::now() - self.kline_end_offset;
            params.push(("end", end.timestamp_millis().to_string()));
        }

        let result: KlineResult = self.get(KLINE, &params).await?;
        if result.list.is_empty() {
            return Err(MarketDataError::EmptyCandles {
                symbol: symbol.to_string(),
            }
            .into());
        }

        let mut candles = result
            .list
            .iter()
            .map(|row| parse_kline_row(symbol, row))
            .collect::<Result<Vec<_>, _>>()?;
        // Bybit lists newest first
        sort_chronologically(&mut candles);

        debug!("Bybit: fetched {} {} bars for {}", candles.len(), timeframe, symbol);
        Ok(candles)
    }

    async fn get_last_price(&self, symbol: &str) -> Result<Decimal> {
        let result: TickerResult = self
            .get(
                TICKERS,
                &[
                    ("category", self.category.clone()),
                    ("symbol", symbol.to_string()),
                ],
            )
            .await?;

        let ticker = result
            .list
            .into_iter()
            .find(|t| t.symbol == symbol)
            .ok_or_else(|| MarketDataError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        Ok(parse_price(symbol, "lastPrice", &ticker.last_price)?)
    }

    async fn get_tickers(&self) -> Result<Vec<PairTicker>> {
        let result: TickerResult = self
            .get(TICKERS, &[("category", self.category.clone())])
            .await?;

        let tickers: Vec<PairTicker> = result
            .list
            .into_iter()
            .filter_map(|t| {
                let parsed = parse_price(&t.symbol, "lastPrice", &t.last_price).and_then(|last| {
                    parse_price(&t.symbol, "turnover24h", &t.turnover_24h).map(|to| (last, to))
                });
                match parsed {
                    Ok((last_price, turnover_24h)) => Some(PairTicker {
                        symbol: t.symbol,
                        last_price,
                        turnover_24h,
                    }),
                    Err(e) => {
                        warn!("Bybit: skipping ticker: {}", e);
                        None
                    }
                }
            })
            .collect();

        debug!("Bybit: {} tickers in {}", tickers.len(), self.category);
        Ok(tickers)
    }

    async fn get_tradable_symbols(&self) -> Result<Vec<String>> {
        let mut symbols = Vec::new();
        let mut cursor = String::new();

        for _ in 0..MAX_INSTRUMENT_PAGES {
            let mut params = vec![
                ("category", self.category.clone()),
                ("limit", "1000".to_string()),
            ];
            if !cursor.is_empty() {
                params.push(("cursor", decode_cursor(&cursor)));
            }

            let page: InstrumentsResult = self.get(INSTRUMENTS, &params).await?;
            symbols.extend(
                page.list
                    .into_iter()
                    .filter(|i| i.status == "Trading")
                    .map(|i| i.symbol),
            );

            if page.next_page_cursor.is_empty() || page.next_page_cursor == cursor {
                break;
            }
            cursor = page.next_page_cursor;
        }

        info!(
            "Bybit: {} instruments trading in {}",
            symbols.len(),
            self.category
        );
        Ok(symbols)
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>> {
        let result: TimeResult = self.get(TIME, &[]).await?;
        let secs = result
            .time_second
            .parse::<i64>()
            .with_context(|| format!("Invalid timeSecond '{}'", result.time_second))?;
        DateTime::from_timestamp(secs, 0)
            .with_context(|| format!("timeSecond {} out of range", secs))
    }
}

/// Cursors come back percent-encoded; they are re-encoded when sent.
fn decode_cursor(cursor: &str) -> String {
    url::form_urlencoded::parse(format!("c={}", cursor).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| cursor.to_string())
}
