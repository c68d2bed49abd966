//! Telegram configuration parsing from environment variables.

use super::Vars;
use anyhow::Result;

/// Telegram environment configuration
#[derive(Clone)]
pub struct TelegramEnvConfig {
    pub token: Option<String>,
    /// Chat that receives scheduled signals
    pub chat_id: Option<String>,
    pub api_url: String,
    /// Only answer commands coming from `chat_id`
    pub restrict_to_chat: bool,
    pub poll_timeout_secs: u64,
}

// Hand-written so the bot token never ends up in logs.
impl std::fmt::Debug for TelegramEnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramEnvConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .field("restrict_to_chat", &self.restrict_to_chat)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl TelegramEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&Vars::from_env())
    }

    pub fn from_vars(vars: &Vars) -> Result<Self> {
        Ok(Self {
            token: vars.get("TELEGRAM_TOKEN").map(str::to_string),
            chat_id: vars.get("CHAT_ID").map(str::to_string),
            api_url: vars
                .string("TELEGRAM_API_URL", "https://api.telegram.org")
                .trim_end_matches('/')
                .to_string(),
            restrict_to_chat: vars.parse_bool("TELEGRAM_RESTRICT_TO_CHAT", false)?,
            poll_timeout_secs: vars.parse("TELEGRAM_POLL_TIMEOUT", 30u64)?,
        })
    }

    /// Returns `(token, chat_id)`, failing if either is missing.
    pub fn credentials(&self) -> Result<(String, String)> {
        let token = self
            .token
            .clone()
            .ok_or_else(|| anyhow::anyhow!("TELEGRAM_TOKEN is not set"))?;
        let chat_id = self
            .chat_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("CHAT_ID is not set"))?;
        Ok((token, chat_id))
    }
}
