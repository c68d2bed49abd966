use super::analyzer::SignalAnalyzer;
use crate::domain::trading::types::TradeSignal;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of analyzing a batch of pairs
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Candidate signals, in input order
    pub signals: Vec<TradeSignal>,
    pub best: Option<TradeSignal>,
    /// `(symbol, error)` for every pair that could not be analyzed
    pub failed: Vec<(String, String)>,
    pub scanned: usize,
}

/// Highest confidence wins; on a tie the earlier signal is kept.
/// A NaN confidence is never selected.
pub fn select_best(signals: &[TradeSignal]) -> Option<&TradeSignal> {
    signals
        .iter()
        .filter(|s| !s.confidence.is_nan())
        .fold(None, |best: Option<&TradeSignal>, s| match best {
            Some(b) if s.confidence <= b.confidence => Some(b),
            _ => Some(s),
        })
}

pub struct SignalScanner {
    analyzer: Arc<SignalAnalyzer>,
    concurrency: usize,
}

impl SignalScanner {
    pub fn new(analyzer: Arc<SignalAnalyzer>, concurrency: usize) -> Self {
        Self {
            analyzer,
            concurrency: concurrency.max(1),
        }
    }

    /// Analyzes every pair with at most `concurrency` requests in flight.
    /// A failing pair is recorded in the report and never aborts the scan.
    pub async fn scan(&self, pairs: &[String]) -> ScanReport {
        let results: Vec<_> = stream::iter(pairs.iter().cloned())
            .map(|symbol| {
                let analyzer = self.analyzer.clone();
                async move {
                    let result = analyzer.analyze(&symbol).await;
                    (symbol, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = ScanReport {
            scanned: results.len(),
            ..Default::default()
        };
        for (symbol, result) in results {
            match result {
                Ok(Some(signal)) => report.signals.push(signal),
                Ok(None) => {}
                Err(e) => {
                    warn!("SignalScanner: {} skipped: {:#}", symbol, e);
                    report.failed.push((symbol, format!("{:#}", e)));
                }
            }
        }
        report.best = select_best(&report.signals).cloned();

        info!(
            "SignalScanner: {} pairs, {} candidates, {} failed, best: {}",
            report.scanned,
            report.signals.len(),
            report.failed.len(),
            report
                .best
                .as_ref()
                .map(|s| format!("{} {} ({:.1}%)", s.symbol, s.direction, s.confidence * 100.0))
                .unwrap_or_else(|| "none".to_string())
        );

        report
    }
}
