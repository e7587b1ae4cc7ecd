//! Fortune Bot
//!
//! Runs a shell pipeline that prints something whimsical, draws its output
//! onto a PNG (green monospace text on black) and posts the image to a
//! Telegram chat with a timestamped caption.
//!
//! # Components
//!
//! - [`source`]: runs the command and captures its output
//! - [`rendering`]: measures and draws the text, encodes the PNG
//! - [`publish`]: uploads the PNG through `sendPhoto`
//! - [`bot`]: wires the three together and maps outcomes to exit codes
//!
//! # Example
//!
//! ```no_run
//! use fortune_bot::{BotConfig, FortuneBot};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BotConfig::new("123456:ABC", "@my_channel");
//! let bot = FortuneBot::new(config)?;
//! let status = bot.run_once()?;
//! std::process::exit(status.code());
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod bot;
pub mod caption;
pub mod clock;
pub mod error;
pub mod publish;
pub mod rendering;
pub mod source;

pub use bot::{ExitStatus, FortuneBot};
pub use error::{Error, Result};
pub use publish::{HttpTransport, Publisher, UploadResult};
pub use rendering::{RenderConfig, Renderer};
pub use source::{CommandRunner, ShellRunner, TextSource};

/// Fortune, wrapped to 80 columns, said or thought by a random cow with a
/// random mood.
pub const DEFAULT_COMMAND: &str = "fortune -a | fmt -80 -s | $(shuf -n 1 -e cowsay cowthink) \
     -$(shuf -n 1 -e b d g p s t w y) \
     -f $(shuf -n 1 -e $(cowsay -l | tail -n +2)) -n";

pub const DEFAULT_SHELL: &str = "/bin/bash";

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable holding the destination chat id
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// Configuration for one bot run
///
/// `token` and `chat_id` have no usable defaults; everything else does:
///
/// ```
/// let cfg = fortune_bot::BotConfig::new("tok", "@chan");
/// assert_eq!(cfg.command_timeout.as_secs(), 30);
/// assert_eq!(cfg.render.padding, 12);
/// ```
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot authentication token
    pub token: String,
    /// Destination chat identifier (numeric id or `@channel`)
    pub chat_id: String,
    /// Command line whose stdout becomes the image
    pub command: String,
    /// Interpreter the command is run with (`<shell> -c <command>`)
    pub shell: PathBuf,
    pub command_timeout: Duration,
    pub upload_timeout: Duration,
    /// Scheme and host of the Bot API
    pub api_base: String,
    pub render: RenderConfig,
}

impl BotConfig {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            ..Default::default()
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            chat_id: String::new(),
            command: DEFAULT_COMMAND.to_string(),
            shell: PathBuf::from(DEFAULT_SHELL),
            command_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(15),
            api_base: DEFAULT_API_BASE.to_string(),
            render: RenderConfig::default(),
        }
    }
}

/// Both credentials, or [`Error::Config`] if either is absent or empty.
pub fn require_credentials(
    token: Option<String>,
    chat_id: Option<String>,
) -> Result<(String, String)> {
    let token = token.filter(|t| !t.is_empty());
    let chat_id = chat_id.filter(|c| !c.is_empty());
    match (token, chat_id) {
        (Some(token), Some(chat_id)) => Ok((token, chat_id)),
        _ => Err(Error::Config(format!("{} and {} must be set", TOKEN_ENV, CHAT_ID_ENV))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.command, DEFAULT_COMMAND);
        assert_eq!(config.upload_timeout, Duration::from_secs(15));
        assert_eq!(config.render.font_size, 16);
        assert_eq!(config.render.foreground, [0, 255, 0]);
        assert!(config.token.is_empty());
    }

    #[test]
    fn default_command_is_one_pipeline() {
        assert!(!DEFAULT_COMMAND.contains('\n'));
        assert!(DEFAULT_COMMAND.starts_with("fortune -a | fmt -80 -s | "));
        assert!(DEFAULT_COMMAND.ends_with(" -n"));
    }

    #[test]
    fn credentials_must_be_present_and_non_empty() {
        assert!(require_credentials(Some("t".into()), Some("c".into())).is_ok());
        assert!(matches!(require_credentials(None, Some("c".into())), Err(Error::Config(_))));
        assert!(matches!(require_credentials(Some("t".into()), None), Err(Error::Config(_))));
        assert!(matches!(
            require_credentials(Some(String::new()), Some("c".into())),
            Err(Error::Config(_))
        ));
    }
}
