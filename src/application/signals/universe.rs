use crate::config::ExchangeEnvConfig;
use crate::domain::ports::MarketDataService;
use crate::domain::trading::types::normalize_symbol;
use anyhow::{Result, bail};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Liquid USDT perpetuals used when the exchange cannot rank pairs
pub const FALLBACK_PAIRS: [&str; 20] = [
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "AVAXUSDT",
    "DOTUSDT", "MATICUSDT", "LTCUSDT", "TRXUSDT", "LINKUSDT", "BCHUSDT", "XLMUSDT", "ATOMUSDT",
    "ETCUSDT", "FILUSDT", "ICPUSDT", "HBARUSDT",
];

/// Decides which pairs a scan covers
pub struct PairUniverse {
    market: Arc<dyn MarketDataService>,
    fixed: Option<Vec<String>>,
    count: usize,
    quote_asset: String,
}

impl PairUniverse {
    pub fn new(market: Arc<dyn MarketDataService>, config: &ExchangeEnvConfig) -> Self {
        Self {
            market,
            fixed: config
                .symbols
                .as_ref()
                .map(|list| list.iter().map(|s| normalize_symbol(s)).collect()),
            count: config.top_pairs_count,
            quote_asset: normalize_symbol(&config.quote_asset),
        }
    }

    /// The configured `SYMBOLS`, or the top pairs by 24h turnover. Never
    /// fails: exchange errors fall back to [`FALLBACK_PAIRS`].
    pub async fn top_pairs(&self) -> Vec<String> {
        if let Some(fixed) = &self.fixed {
            return fixed.clone();
        }

        match self.rank_by_turnover().await {
            Ok(pairs) => {
                info!(
                    "PairUniverse: top {} {} pairs by turnover: {:?}",
                    pairs.len(),
                    self.quote_asset,
                    pairs
                );
                pairs
            }
            Err(e) => {
                warn!("PairUniverse: ranking failed ({:#}), using fallback list", e);
                FALLBACK_PAIRS
                    .iter()
                    .take(self.count)
                    .map(|s| s.to_string())
                    .collect()
            }
        }
    }

    async fn rank_by_turnover(&self) -> Result<Vec<String>> {
        let (tickers, tradable) = tokio::try_join!(
            self.market.get_tickers(),
            self.market.get_tradable_symbols()
        )?;
        let tradable: HashSet<String> = tradable.into_iter().collect();

        let mut candidates: Vec<_> = tickers
            .into_iter()
            .filter(|t| t.symbol.ends_with(&self.quote_asset) && tradable.contains(&t.symbol))
            // Pre-listing and halted pairs report no last price
            .filter(|t| t.last_price > Decimal::ZERO)
            .collect();
        // Stable sort keeps exchange order among equal turnovers
        candidates.sort_by(|a, b| b.turnover_24h.cmp(&a.turnover_24h));

        let pairs: Vec<String> = candidates
            .into_iter()
            .take(self.count)
            .map(|t| t.symbol)
            .collect();

        if pairs.is_empty() {
            bail!("no tradable {} pairs in ticker response", self.quote_asset);
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::PairTicker;
    use crate::infrastructure::mock::MockMarketDataService;

    fn ticker(symbol: &str, turnover: i64) -> PairTicker {
        PairTicker {
            symbol: symbol.to_string(),
            last_price: Decimal::ONE,
            turnover_24h: Decimal::from(turnover),
        }
    }

    fn config(count: usize) -> ExchangeEnvConfig {
        ExchangeEnvConfig {
            top_pairs_count: count,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ranks_tradable_quote_pairs_by_turnover() {
        let market = MockMarketDataService::new();
        market.set_tickers(vec![
            ticker("BTCUSDT", 500),
            ticker("ETHUSDT", 900),
            ticker("ETHBTC", 10_000),
            ticker("OLDUSDT", 5_000),
            ticker("SOLUSDT", 100),
        ]);
        market.set_tradable(vec![
            "BTCUSDT".to_string(),
            "ETHUSDT".to_string(),
            "ETHBTC".to_string(),
            "SOLUSDT".to_string(),
        ]);

        let universe = PairUniverse::new(Arc::new(market), &config(2));
        assert_eq!(universe.top_pairs().await, vec!["ETHUSDT", "BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_skips_pairs_without_last_price() {
        let market = MockMarketDataService::new();
        let mut unpriced = ticker("NEWUSDT", 10_000);
        unpriced.last_price = Decimal::ZERO;
        market.set_tickers(vec![unpriced, ticker("BTCUSDT", 500)]);
        market.set_tradable(vec!["NEWUSDT".to_string(), "BTCUSDT".to_string()]);

        let universe = PairUniverse::new(Arc::new(market), &config(5));
        assert_eq!(universe.top_pairs().await, vec!["BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_fixed_symbols_bypass_exchange() {
        let market = MockMarketDataService::new();
        market.set_tickers_down(true);
        let mut cfg = config(20);
        cfg.symbols = Some(vec!["eth/usdt".to_string(), "BTCUSDT".to_string()]);

        let universe = PairUniverse::new(Arc::new(market), &cfg);
        assert_eq!(universe.top_pairs().await, vec!["ETHUSDT", "BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_falls_back_on_outage() {
        let market = MockMarketDataService::new();
        market.set_tickers_down(true);

        let universe = PairUniverse::new(Arc::new(market), &config(20));
        let pairs = universe.top_pairs().await;
        assert_eq!(pairs.len(), 20);
        assert_eq!(pairs[0], "BTCUSDT");
    }

    #[tokio::test]
    async fn test_falls_back_on_empty_ranking() {
        let universe = PairUniverse::new(Arc::new(MockMarketDataService::new()), &config(5));
        assert_eq!(universe.top_pairs().await.len(), 5);
    }
}
