use crate::application::signals::SignalPipeline;
use crate::domain::chat::{BotCommand, ChatUpdate};
use crate::domain::ports::SignalNotifier;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::observability::metrics::TRIGGER_COMMAND;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const NO_SIGNAL_MESSAGE: &str = "No suitable signals at the moment.";

pub const HELP_MESSAGE: &str = "Candle signal bot\n\
    /signal - scan the top pairs now and reply with the strongest signal\n\
    /help - show this message\n\
    Signals are also posted automatically on a schedule.";

/// Delay before polling again after a failed poll
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Answers chat commands by running on-demand scans.
pub struct CommandListener {
    notifier: Arc<dyn SignalNotifier>,
    pipeline: Arc<SignalPipeline>,
    /// When set, messages from other chats are ignored
    allowed_chat: Option<String>,
    poll_timeout_secs: u64,
    metrics: Option<Metrics>,
    offset: i64,
}

impl CommandListener {
    pub fn new(
        notifier: Arc<dyn SignalNotifier>,
        pipeline: Arc<SignalPipeline>,
        allowed_chat: Option<String>,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            notifier,
            pipeline,
            allowed_chat,
            poll_timeout_secs,
            metrics: None,
            offset: 0,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run(mut self) {
        info!(
            "CommandListener started (restricted to chat: {})",
            self.allowed_chat.as_deref().unwrap_or("no")
        );

        loop {
            if let Err(e) = self.poll_once().await {
                warn!("CommandListener: poll failed: {:#}", e);
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }

    /// Fetches one batch of updates and handles each in order. The offset
    /// advances past every update, including ones that failed to process.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .notifier
            .poll_updates(self.offset, self.poll_timeout_secs)
            .await
            .context("Failed to poll chat updates")?;

        for update in &updates {
            self.offset = self.offset.max(update.update_id + 1);
            if let Err(e) = self.handle_update(update).await {
                error!(
                    "CommandListener: failed to handle update {}: {:#}",
                    update.update_id, e
                );
            }
        }
        Ok(updates.len())
    }

    pub async fn handle_update(&self, update: &ChatUpdate) -> Result<()> {
        let Some(command) = update.text.as_deref().and_then(BotCommand::parse) else {
            return Ok(());
        };

        if let Some(allowed) = &self.allowed_chat
            && allowed != &update.chat_id
        {
            debug!(
                "CommandListener: ignoring {:?} from unauthorized chat {}",
                command, update.chat_id
            );
            return Ok(());
        }

        info!("CommandListener: {:?} from chat {}", command, update.chat_id);
        let (reply, is_signal) = match command {
            BotCommand::Help => (HELP_MESSAGE.to_string(), false),
            BotCommand::Signal => match self.pipeline.run(TRIGGER_COMMAND).await.best {
                Some(signal) => (signal.to_string(), true),
                None => (NO_SIGNAL_MESSAGE.to_string(), false),
            },
        };

        self.notifier
            .send_message(&update.chat_id, &reply)
            .await
            .with_context(|| format!("Failed to reply to chat {}", update.chat_id))?;

        if is_signal && let Some(metrics) = &self.metrics {
            metrics.inc_signals_sent(TRIGGER_COMMAND);
        }
        Ok(())
    }
}
