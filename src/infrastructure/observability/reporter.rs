//! Push-based metrics reporter
//!
//! Periodically writes a structured JSON snapshot of the counters to stdout.
//! Nothing listens for incoming connections.

use crate::infrastructure::observability::metrics::{
    Metrics, OUTCOME_ERROR, OUTCOME_FILTERED, OUTCOME_NO_SIGNAL, OUTCOME_SIGNAL, TRIGGERS,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub scans: u64,
    pub signals_sent: u64,
    pub analysis: AnalysisSnapshot,
    pub inference: InferenceSnapshot,
}

#[derive(Debug, Serialize)]
pub struct AnalysisSnapshot {
    pub signals: u64,
    pub no_signal: u64,
    pub filtered: u64,
    pub errors: u64,
}

#[derive(Debug, Serialize)]
pub struct InferenceSnapshot {
    pub count: u64,
    pub mean_latency_ms: f64,
}

pub struct MetricsReporter {
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics, interval_seconds: u64) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub async fn run(self) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            let snapshot = self.collect_snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    // Prefixed so log shippers can filter it
                    println!("METRICS_JSON:{}", json);
                    info!(
                        "Scans: {} | Signals sent: {} | Analysis errors: {} | Uptime: {}s",
                        snapshot.scans,
                        snapshot.signals_sent,
                        snapshot.analysis.errors,
                        snapshot.uptime_seconds
                    );
                }
                Err(e) => warn!("Failed to serialize metrics: {}", e),
            }
        }
    }

    fn collect_snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        let histogram = &self.metrics.inference_latency_seconds;
        let count = histogram.get_sample_count();
        let mean_latency_ms = if count > 0 {
            histogram.get_sample_sum() / count as f64 * 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            scans: Metrics::total(&self.metrics.scans_total, TRIGGERS),
            signals_sent: Metrics::total(&self.metrics.signals_sent_total, TRIGGERS),
            analysis: AnalysisSnapshot {
                signals: self.metrics.analyzed(OUTCOME_SIGNAL),
                no_signal: self.metrics.analyzed(OUTCOME_NO_SIGNAL),
                filtered: self.metrics.analyzed(OUTCOME_FILTERED),
                errors: self.metrics.analyzed(OUTCOME_ERROR),
            },
            inference: InferenceSnapshot {
                count,
                mean_latency_ms,
            },
        }
    }
}
