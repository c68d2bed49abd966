use crate::application::signals::SignalPipeline;
use crate::domain::ports::SignalNotifier;
use crate::domain::trading::types::TradeSignal;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::observability::metrics::TRIGGER_SCHEDULE;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{error, info};

/// Posts the best signal to the configured chat on a fixed interval.
pub struct SignalScheduler {
    notifier: Arc<dyn SignalNotifier>,
    pipeline: Arc<SignalPipeline>,
    chat_id: String,
    interval: Duration,
    metrics: Option<Metrics>,
}

impl SignalScheduler {
    pub fn new(
        notifier: Arc<dyn SignalNotifier>,
        pipeline: Arc<SignalPipeline>,
        chat_id: String,
        interval: Duration,
    ) -> Self {
        Self {
            notifier,
            pipeline,
            chat_id,
            interval,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run(self) {
        info!(
            "SignalScheduler started. Interval: {:?}, chat: {}",
            self.interval, self.chat_id
        );

        let mut interval = time::interval(self.interval);
        // A scan that overruns the period must not trigger a burst of catch-up scans
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                error!("SignalScheduler: {:#}", e);
            }
        }
    }

    /// Runs one scan and delivers its best signal, if any.
    pub async fn tick(&self) -> Result<Option<TradeSignal>> {
        let report = self.pipeline.run(TRIGGER_SCHEDULE).await;
        let Some(signal) = report.best else {
            info!("SignalScheduler: no signal this round");
            return Ok(None);
        };

        self.notifier
            .send_message(&self.chat_id, &signal.to_string())
            .await
            .with_context(|| format!("Failed to post {} signal", signal.symbol))?;

        if let Some(metrics) = &self.metrics {
            metrics.inc_signals_sent(TRIGGER_SCHEDULE);
        }
        info!(
            "SignalScheduler: posted {} {} ({:.1}%)",
            signal.symbol,
            signal.direction,
            signal.confidence * 100.0
        );
        Ok(Some(signal))
    }
}
