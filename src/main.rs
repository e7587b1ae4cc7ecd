use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fortune_bot::{
    require_credentials, BotConfig, ExitStatus, FortuneBot, RenderConfig, CHAT_ID_ENV,
    DEFAULT_API_BASE, DEFAULT_COMMAND, DEFAULT_SHELL, TOKEN_ENV,
};
use tracing_subscriber::EnvFilter;

/// Post a rendered fortune to a Telegram chat
#[derive(Debug, Parser)]
#[command(name = "fortune-bot", version, about)]
struct Cli {
    /// Bot token
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    token: Option<String>,

    /// Destination chat id or @channel
    #[arg(long, env = CHAT_ID_ENV)]
    chat_id: Option<String>,

    /// Command whose output is rendered
    #[arg(long, env = "FORTUNE_BOT_COMMAND", default_value = DEFAULT_COMMAND)]
    command: String,

    /// Shell used to run the command
    #[arg(long, env = "FORTUNE_BOT_SHELL", default_value = DEFAULT_SHELL)]
    shell: PathBuf,

    /// Monospace font file (TTF/OTF)
    #[arg(long, env = "FORTUNE_BOT_FONT")]
    font: Option<PathBuf>,

    /// Font size in pixels
    #[arg(long, env = "FORTUNE_BOT_FONT_SIZE", default_value_t = 16)]
    font_size: u32,

    /// Margin around the text in pixels
    #[arg(long, env = "FORTUNE_BOT_PADDING", default_value_t = 12)]
    padding: u32,

    /// Command timeout in seconds
    #[arg(long, env = "FORTUNE_BOT_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Upload timeout in seconds
    #[arg(long, env = "FORTUNE_BOT_UPLOAD_TIMEOUT", default_value_t = 15)]
    upload_timeout: u64,

    /// Bot API base URL
    #[arg(long, env = "FORTUNE_BOT_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Write the PNG to this path instead of posting it
    #[arg(long, value_name = "PATH")]
    render_only: Option<PathBuf>,
}

impl Cli {
    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            font_path: self.font.clone(),
            font_size: self.font_size,
            padding: self.padding,
            ..Default::default()
        }
    }

    fn bot_config(&self, token: String, chat_id: String) -> BotConfig {
        BotConfig {
            token,
            chat_id,
            command: self.command.clone(),
            shell: self.shell.clone(),
            command_timeout: Duration::from_secs(self.timeout),
            upload_timeout: Duration::from_secs(self.upload_timeout),
            api_base: self.api_base.clone(),
            render: self.render_config(),
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    if let Some(path) = cli.render_only.as_deref() {
        let code = render_to_file(&cli, path)?;
        std::process::exit(code);
    }

    let (token, chat_id) = match require_credentials(cli.token.clone(), cli.chat_id.clone()) {
        Ok(credentials) => credentials,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(ExitStatus::MissingConfig.code());
        }
    };

    let bot = FortuneBot::new(cli.bot_config(token, chat_id))?;
    let status = bot.run_once()?;
    std::process::exit(status.code());
}

/// Run the command and write the image locally. No credentials needed.
fn render_to_file(cli: &Cli, path: &std::path::Path) -> anyhow::Result<i32> {
    let config = cli.bot_config(String::new(), String::new());
    let bot = FortuneBot::new(config)?;
    let text = bot.get_output()?;

    match bot.render_image(&text) {
        Ok(png) => {
            std::fs::write(path, png)?;
            log::info!("wrote {}", path.display());
            Ok(ExitStatus::Posted.code())
        }
        Err(e) if e.is_render_failure() => {
            log::error!("render failed: {}", e);
            Ok(ExitStatus::RenderFailed.code())
        }
        Err(e) => Err(e.into()),
    }
}
