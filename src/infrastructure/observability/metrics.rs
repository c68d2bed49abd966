//! Prometheus metrics for the signal bot
//!
//! All metrics use the `signalbot_` prefix and live in a private registry.

use prometheus::{
    CounterVec, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome label values for `signalbot_symbols_analyzed_total`
pub const OUTCOME_SIGNAL: &str = "signal";
pub const OUTCOME_NO_SIGNAL: &str = "no_signal";
pub const OUTCOME_FILTERED: &str = "filtered";
pub const OUTCOME_ERROR: &str = "error";
pub const OUTCOMES: &[&str] = &[
    OUTCOME_SIGNAL,
    OUTCOME_NO_SIGNAL,
    OUTCOME_FILTERED,
    OUTCOME_ERROR,
];

/// Trigger label values for scans and deliveries
pub const TRIGGER_COMMAND: &str = "command";
pub const TRIGGER_SCHEDULE: &str = "schedule";
pub const TRIGGER_CLI: &str = "cli";
pub const TRIGGERS: &[&str] = &[TRIGGER_COMMAND, TRIGGER_SCHEDULE, TRIGGER_CLI];

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Completed scans by trigger (`command`, `schedule`, `cli`)
    pub scans_total: CounterVec,
    /// Per-symbol analysis results by outcome
    pub symbols_analyzed_total: CounterVec,
    /// Signals delivered to a chat, by trigger
    pub signals_sent_total: CounterVec,
    /// Classifier evaluation time in seconds
    pub inference_latency_seconds: Histogram,
    /// Exchange request latency in seconds
    pub api_latency_seconds: HistogramVec,
    /// Confidence of the most recent best signal (0-1)
    pub last_best_confidence: Gauge,
    pub uptime_seconds: Gauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let scans_total = CounterVec::new(
            Opts::new("signalbot_scans_total", "Completed market scans by trigger"),
            &["trigger"],
        )?;
        registry.register(Box::new(scans_total.clone()))?;

        let symbols_analyzed_total = CounterVec::new(
            Opts::new(
                "signalbot_symbols_analyzed_total",
                "Symbols analyzed by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(symbols_analyzed_total.clone()))?;

        let signals_sent_total = CounterVec::new(
            Opts::new(
                "signalbot_signals_sent_total",
                "Signals delivered to chat by trigger",
            ),
            &["trigger"],
        )?;
        registry.register(Box::new(signals_sent_total.clone()))?;

        let inference_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "signalbot_inference_latency_seconds",
                "Classifier evaluation latency in seconds",
            )
            .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        )?;
        registry.register(Box::new(inference_latency_seconds.clone()))?;

        let api_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "signalbot_api_latency_seconds",
                "Exchange API request latency in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["endpoint"],
        )?;
        registry.register(Box::new(api_latency_seconds.clone()))?;

        let last_best_confidence = Gauge::with_opts(Opts::new(
            "signalbot_last_best_confidence",
            "Confidence of the most recent best signal (0-1)",
        ))?;
        registry.register(Box::new(last_best_confidence.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "signalbot_uptime_seconds",
            "Process uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            scans_total,
            symbols_analyzed_total,
            signals_sent_total,
            inference_latency_seconds,
            api_latency_seconds,
            last_best_confidence,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_scans(&self, trigger: &str) {
        self.scans_total.with_label_values(&[trigger]).inc();
    }

    pub fn inc_analyzed(&self, outcome: &str) {
        self.symbols_analyzed_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn inc_signals_sent(&self, trigger: &str) {
        self.signals_sent_total.with_label_values(&[trigger]).inc();
    }

    pub fn observe_api_latency(&self, endpoint: &str, latency: f64) {
        self.api_latency_seconds
            .with_label_values(&[endpoint])
            .observe(latency);
    }

    pub fn analyzed(&self, outcome: &str) -> u64 {
        self.symbols_analyzed_total
            .with_label_values(&[outcome])
            .get() as u64
    }

    /// Sum of a counter vector over the given label values
    pub fn total(counter: &CounterVec, labels: &[&str]) -> u64 {
        labels
            .iter()
            .map(|l| counter.with_label_values(&[*l]).get())
            .sum::<f64>() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_scans(TRIGGER_CLI);
        assert_eq!(Metrics::total(&metrics.scans_total, TRIGGERS), 1);
        assert_eq!(metrics.inference_latency_seconds.get_sample_count(), 0);
    }

    #[test]
    fn test_outcome_counters() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_analyzed(OUTCOME_SIGNAL);
        metrics.inc_analyzed(OUTCOME_SIGNAL);
        metrics.inc_analyzed(OUTCOME_ERROR);

        assert_eq!(metrics.analyzed(OUTCOME_SIGNAL), 2);
        assert_eq!(metrics.analyzed(OUTCOME_ERROR), 1);
        assert_eq!(Metrics::total(&metrics.symbols_analyzed_total, OUTCOMES), 3);

        let output = metrics.render();
        assert!(output.contains("signalbot_symbols_analyzed_total"));
        assert!(output.contains("outcome=\"signal\""));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = Metrics::new().expect("Failed to create metrics");
        let b = Metrics::new().expect("Failed to create metrics");
        a.inc_signals_sent(TRIGGER_SCHEDULE);
        assert_eq!(Metrics::total(&a.signals_sent_total, TRIGGERS), 1);
        assert_eq!(Metrics::total(&b.signals_sent_total, TRIGGERS), 0);
    }
}
