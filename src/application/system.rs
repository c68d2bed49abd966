use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::agents::{CommandListener, SignalScheduler};
use crate::application::ml::{SignalClassifier, XgboostClassifier};
use crate::application::signals::{
    AnalyzerSettings, PairUniverse, SignalAnalyzer, SignalPipeline, SignalScanner,
};
use crate::config::Config;
use crate::domain::ports::{MarketDataService, SignalNotifier};
use crate::infrastructure::observability::{Metrics, MetricsReporter};
use crate::infrastructure::{BybitMarketDataService, TelegramNotifier};

pub struct Application {
    pub config: Config,
    pub market_service: Arc<dyn MarketDataService>,
    pub notifier: Option<Arc<dyn SignalNotifier>>,
    pub pipeline: Arc<SignalPipeline>,
    pub metrics: Metrics,
}

/// Background tasks started by [`Application::start`]
pub struct SystemHandle {
    pub metrics: Metrics,
    tasks: Vec<JoinHandle<()>>,
}

impl SystemHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

impl Application {
    /// Wires the Bybit and Telegram adapters and loads the model from
    /// `MODEL_PATH`. The chat adapter is only created when a token is set.
    pub async fn build(config: Config) -> Result<Self> {
        info!(
            "Building signal bot (category: {}, interval: {}, schema: {})...",
            config.exchange.category, config.exchange.timeframe, config.strategy.feature_schema
        );

        let metrics = Metrics::new().context("Failed to create metrics registry")?;

        let market_service: Arc<dyn MarketDataService> = Arc::new(
            BybitMarketDataService::new(&config.exchange).with_metrics(metrics.clone()),
        );

        let classifier: Arc<dyn SignalClassifier> = Arc::new(
            XgboostClassifier::load(&config.strategy.model_path).with_context(|| {
                format!(
                    "Failed to load model from {}",
                    config.strategy.model_path.display()
                )
            })?,
        );

        let notifier: Option<Arc<dyn SignalNotifier>> = config
            .telegram
            .token
            .clone()
            .map(|token| {
                Arc::new(TelegramNotifier::new(&config.telegram, token)) as Arc<dyn SignalNotifier>
            });

        Self::build_with(config, market_service, classifier, notifier, metrics)
    }

    /// Wiring with caller-provided adapters. Fails when the configured
    /// feature schema does not match the model.
    pub fn build_with(
        config: Config,
        market_service: Arc<dyn MarketDataService>,
        classifier: Arc<dyn SignalClassifier>,
        notifier: Option<Arc<dyn SignalNotifier>>,
        metrics: Metrics,
    ) -> Result<Self> {
        info!(
            "Model: {} v{} ({} features)",
            classifier.name(),
            classifier.version(),
            classifier.num_features()
        );

        let analyzer = SignalAnalyzer::new(
            market_service.clone(),
            classifier,
            AnalyzerSettings::from_config(&config),
        )?
        .with_metrics(metrics.clone());

        let scanner = SignalScanner::new(Arc::new(analyzer), config.strategy.scan_concurrency);
        let universe = PairUniverse::new(market_service.clone(), &config.exchange);
        let pipeline =
            Arc::new(SignalPipeline::new(universe, scanner).with_metrics(metrics.clone()));

        Ok(Self {
            config,
            market_service,
            notifier,
            pipeline,
            metrics,
        })
    }

    /// Spawns the scheduler, the command listener and (when enabled) the
    /// metrics reporter. Requires `TELEGRAM_TOKEN` and `CHAT_ID`.
    pub async fn start(&self) -> Result<SystemHandle> {
        let notifier = self
            .notifier
            .clone()
            .context("TELEGRAM_TOKEN is not set; the bot cannot start")?;
        let chat_id = self
            .config
            .telegram
            .chat_id
            .clone()
            .context("CHAT_ID is not set; scheduled signals have no destination")?;

        let mut tasks = Vec::new();

        let scheduler = SignalScheduler::new(
            notifier.clone(),
            self.pipeline.clone(),
            chat_id.clone(),
            std::time::Duration::from_secs(self.config.strategy.signal_interval_minutes * 60),
        )
        .with_metrics(self.metrics.clone());
        tasks.push(tokio::spawn(scheduler.run()));

        let allowed_chat = self.config.telegram.restrict_to_chat.then_some(chat_id);
        let listener = CommandListener::new(
            notifier,
            self.pipeline.clone(),
            allowed_chat,
            self.config.telegram.poll_timeout_secs,
        )
        .with_metrics(self.metrics.clone());
        tasks.push(tokio::spawn(listener.run()));

        if self.config.observability.enabled {
            let reporter =
                MetricsReporter::new(self.metrics.clone(), self.config.observability.interval_secs);
            tasks.push(tokio::spawn(reporter.run()));
            info!(
                "Metrics reporter started (interval: {}s)",
                self.config.observability.interval_secs
            );
        } else {
            info!("Metrics reporting disabled.");
        }

        info!("Signal bot running with {} background tasks.", tasks.len());
        Ok(SystemHandle {
            metrics: self.metrics.clone(),
            tasks,
        })
    }
}
