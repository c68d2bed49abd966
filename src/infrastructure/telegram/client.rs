//! Telegram Bot API client: plain-text `sendMessage` and long-polling
//! `getUpdates`.

use crate::config::TelegramEnvConfig;
use crate::domain::chat::ChatUpdate;
use crate::domain::errors::NotificationError;
use crate::domain::ports::SignalNotifier;
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Slack added to the HTTP timeout on top of the long-poll window
const POLL_GRACE: Duration = Duration::from_secs(15);

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// `{ok, result, description}` wrapper returned by every Bot API method
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, NotificationError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(NotificationError::Rejected {
                method: method.to_string(),
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl From<Update> for ChatUpdate {
    fn from(update: Update) -> Self {
        let (chat_id, text) = match update.message {
            Some(m) => (m.chat.id.to_string(), m.text),
            None => (String::new(), None),
        };
        ChatUpdate {
            update_id: update.update_id,
            chat_id,
            text,
        }
    }
}

pub struct TelegramNotifier {
    /// Retrying long-poll client for `getUpdates`
    poll_client: ClientWithMiddleware,
    /// `sendMessage` is not idempotent, so it is never retried
    send_client: ClientWithMiddleware,
    api_url: String,
    token: String,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_url", &self.api_url)
            .field("token", &"***")
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(config: &TelegramEnvConfig, token: String) -> Self {
        Self {
            poll_client: HttpClientFactory::create_client_with_timeout(
                Duration::from_secs(config.poll_timeout_secs) + POLL_GRACE,
            ),
            send_client: HttpClientFactory::create_client_without_retry(SEND_TIMEOUT),
            api_url: config.api_url.clone(),
            token,
        }
    }

    /// Request URLs contain the token, and so do errors that mention them.
    fn redact(&self, text: String) -> String {
        if self.token.is_empty() {
            text
        } else {
            text.replace(&self.token, "***")
        }
    }

    fn transport_error(&self, err: impl fmt::Display) -> NotificationError {
        NotificationError::Transport(self.redact(err.to_string()))
    }

    fn method_url(&self, method: &str, params: &[(&str, String)]) -> Result<Url, NotificationError> {
        let base = format!("{}/bot{}", self.api_url, self.token);
        build_url_with_query(&base, method, params).map_err(|e| self.transport_error(format!("{:#}", e)))
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        method: &str,
    ) -> Result<T> {
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let parsed: ApiResponse<T> = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse Telegram {} response", method))?;
        Ok(parsed.into_result(method)?)
    }
}

#[async_trait]
impl SignalNotifier for TelegramNotifier {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = self.method_url("sendMessage", &[])?;
        let response = self
            .send_client
            .post(url)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let _: serde_json::Value = self.decode(response, "sendMessage").await?;
        debug!("Telegram: message delivered to {}", chat_id);
        Ok(())
    }

    async fn poll_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<ChatUpdate>> {
        let url = self.method_url(
            "getUpdates",
            &[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ],
        )?;
        let response = self
            .poll_client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let updates: Vec<Update> = self.decode(response, "getUpdates").await?;
        Ok(updates.into_iter().map(ChatUpdate::from).collect())
    }
}
