/// An incoming chat message, reduced to what the command listener needs
#[derive(Debug, Clone, PartialEq)]
pub struct ChatUpdate {
    pub update_id: i64,
    pub chat_id: String,
    pub text: Option<String>,
}

/// Commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Signal,
    Help,
}

impl BotCommand {
    /// Parses `/signal`, `/signal@MyBot`, `/start` and `/help`. Returns `None`
    /// for plain text and unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let word = body.split_whitespace().next()?;
        let cmd = word.split('@').next().unwrap_or(word);

        match cmd.to_lowercase().as_str() {
            "signal" => Some(BotCommand::Signal),
            "start" | "help" => Some(BotCommand::Help),
            _ => None,
        }
    }
}
