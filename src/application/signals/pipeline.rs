use super::scanner::{ScanReport, SignalScanner};
use super::universe::PairUniverse;
use crate::infrastructure::observability::Metrics;
use std::time::Instant;
use tracing::info;

/// Pair selection followed by a scan. Shared by the chat command, the
/// scheduler and the one-shot CLI.
pub struct SignalPipeline {
    universe: PairUniverse,
    scanner: SignalScanner,
    metrics: Option<Metrics>,
}

impl SignalPipeline {
    pub fn new(universe: PairUniverse, scanner: SignalScanner) -> Self {
        Self {
            universe,
            scanner,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// `trigger` labels the scan in metrics and logs.
    pub async fn run(&self, trigger: &str) -> ScanReport {
        let started = Instant::now();
        let pairs = self.universe.top_pairs().await;
        let report = self.scanner.scan(&pairs).await;

        if let Some(metrics) = &self.metrics {
            metrics.inc_scans(trigger);
            if let Some(best) = &report.best {
                metrics.last_best_confidence.set(best.confidence);
            }
        }
        info!(
            "SignalPipeline: {} scan finished in {:.1}s",
            trigger,
            started.elapsed().as_secs_f64()
        );
        report
    }
}
