//! One run of the bot: command output -> image -> upload -> exit status.

use crate::caption;
use crate::clock::{Clock, SystemClock};
use crate::publish::{HttpTransport, Publisher, UploadResult};
use crate::rendering::{Renderer, TextRenderer};
use crate::source::{CommandRunner, ShellRunner, TextSource};
use crate::{BotConfig, Result};

/// Process exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Photo posted
    Posted,
    /// Token or chat id not configured
    MissingConfig,
    /// The API answered `ok: false`
    Rejected,
    /// The image could not be rendered or encoded
    RenderFailed,
    /// The upload request failed (transport, HTTP status or unreadable body)
    UploadFailed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Posted => 0,
            ExitStatus::MissingConfig => 2,
            ExitStatus::Rejected => 3,
            ExitStatus::RenderFailed => 4,
            ExitStatus::UploadFailed => 5,
        }
    }
}

pub struct FortuneBot {
    config: BotConfig,
    source: TextSource,
    renderer: Box<dyn TextRenderer>,
    clock: Box<dyn Clock>,
    publisher: Publisher,
}

impl FortuneBot {
    /// Bot with the production collaborators: bash, the system clock and reqwest.
    #[cfg(feature = "http")]
    pub fn new(config: BotConfig) -> Result<Self> {
        let runner = ShellRunner::new(config.shell.clone());
        let transport = crate::publish::ReqwestTransport::new()?;
        Ok(Self::with_parts(config, Box::new(runner), Box::new(transport)))
    }

    /// Bot with a caller-supplied command runner and HTTP transport.
    pub fn with_parts(
        config: BotConfig,
        runner: Box<dyn CommandRunner>,
        transport: Box<dyn HttpTransport>,
    ) -> Self {
        let source = TextSource::new(config.command.clone(), runner);
        let publisher = Publisher::new(
            config.api_base.clone(),
            config.token.clone(),
            config.chat_id.clone(),
            transport,
        );
        let renderer = Renderer::new(config.render.clone());
        Self {
            config,
            source,
            renderer: Box::new(renderer),
            clock: Box::new(SystemClock),
            publisher,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TextRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn get_output(&self) -> Result<String> {
        self.source.get_output(self.config.command_timeout)
    }

    /// Caption for the current time. Independent of the command output.
    pub fn caption(&self) -> String {
        caption::build_caption(self.clock.as_ref())
    }

    pub fn render_image(&self, text: &str) -> Result<Vec<u8>> {
        self.renderer.render_image(text)
    }

    pub fn post_image(&self, image: &[u8], caption: Option<&str>) -> Result<UploadResult> {
        self.publisher
            .post_image(image, caption, self.config.upload_timeout)
    }

    /// Run once with the text produced by the configured command.
    ///
    /// Errors that are not render or upload failures (for example the shell
    /// failing to start) are returned as `Err` and are fatal to the process.
    pub fn run_once(&self) -> Result<ExitStatus> {
        let text = self.get_output()?;
        self.run_with_text(&text)
    }

    /// Render `text`, post it, and classify the outcome.
    pub fn run_with_text(&self, text: &str) -> Result<ExitStatus> {
        let caption = self.caption();

        let image = match self.render_image(text) {
            Ok(image) => image,
            Err(e) if e.is_render_failure() => {
                log::error!("render failed: {}", e);
                return Ok(ExitStatus::RenderFailed);
            }
            Err(e) => return Err(e),
        };

        let result = match self.post_image(&image, Some(&caption)) {
            Ok(result) => result,
            Err(e) if e.is_network_failure() => {
                log::error!("sendPhoto failed: {}", e);
                return Ok(ExitStatus::UploadFailed);
            }
            Err(e) => return Err(e),
        };

        if result.ok {
            match result.message_id() {
                Some(id) => log::info!("posted message_id={}", id),
                None => log::info!("posted (no message_id in response)"),
            }
            Ok(ExitStatus::Posted)
        } else {
            log::error!("telegram returned not ok: {}", result);
            Ok(ExitStatus::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::publish::{HttpResponse, UploadForm};
    use crate::source::{CommandOutput, RunError};
    use crate::Error;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    type Calls = Rc<RefCell<Vec<(String, UploadForm)>>>;

    enum Reply {
        Status(u16, &'static str),
        NetworkDown,
    }

    struct FakeTransport {
        calls: Calls,
        reply: Reply,
    }

    impl HttpTransport for FakeTransport {
        fn post(&self, url: &str, form: UploadForm, _: Duration) -> Result<HttpResponse> {
            self.calls.borrow_mut().push((url.to_string(), form));
            match self.reply {
                Reply::Status(status, body) => Ok(HttpResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
                Reply::NetworkDown => Err(Error::Network("network down".into())),
            }
        }
    }

    fn runner_ok() -> Box<dyn CommandRunner> {
        fn run(_: &str, _: Duration) -> std::result::Result<CommandOutput, RunError> {
            Ok(CommandOutput::new("hello\n", ""))
        }
        Box::new(run)
    }

    fn stub_png(_: &str) -> Result<Vec<u8>> {
        Ok(PNG_MAGIC.to_vec())
    }

    fn bot(reply: Reply) -> (FortuneBot, Calls) {
        let calls = Calls::default();
        let transport = FakeTransport {
            calls: calls.clone(),
            reply,
        };
        let config = BotConfig::new("tok", "@chan");
        let bot = FortuneBot::with_parts(config, runner_ok(), Box::new(transport))
            .with_clock(Box::new(FixedClock::from_epoch_secs_f64(1234567890.0)))
            .with_renderer(Box::new(stub_png));
        (bot, calls)
    }

    const OK: Reply = Reply::Status(200, r#"{"ok":true,"result":{"message_id":1}}"#);

    #[test]
    fn exit_codes_match_contract() {
        assert_eq!(ExitStatus::Posted.code(), 0);
        assert_eq!(ExitStatus::MissingConfig.code(), 2);
        assert_eq!(ExitStatus::Rejected.code(), 3);
        assert_eq!(ExitStatus::RenderFailed.code(), 4);
        assert_eq!(ExitStatus::UploadFailed.code(), 5);
    }

    #[test]
    fn successful_post_returns_zero() {
        let (bot, calls) = bot(OK);
        assert_eq!(bot.run_once().unwrap(), ExitStatus::Posted);
        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("sendPhoto"));
        assert_eq!(calls[0].1.file.data, PNG_MAGIC);
    }

    #[test]
    fn network_error_returns_five() {
        let (bot, _) = bot(Reply::NetworkDown);
        assert_eq!(bot.run_once().unwrap(), ExitStatus::UploadFailed);
    }

    // The upload's HTTP status error shares the transport error category,
    // so a 500 is reported the same way as a dropped connection.
    #[test]
    fn http_500_is_an_upload_failure() {
        let (bot, _) = bot(Reply::Status(500, "Internal Server Error"));
        let err = bot.post_image(PNG_MAGIC, Some("hi")).unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
        assert_eq!(bot.run_once().unwrap(), ExitStatus::UploadFailed);
    }

    #[test]
    fn ok_false_returns_three() {
        let (bot, _) = bot(Reply::Status(200, r#"{"ok":false,"description":"Forbidden"}"#));
        assert_eq!(bot.run_once().unwrap(), ExitStatus::Rejected);
    }

    #[test]
    fn render_failure_returns_four_without_upload() {
        let (bot, calls) = bot(OK);
        let bot = bot.with_renderer(Box::new(|_: &str| -> Result<Vec<u8>> {
            Err(Error::Encode("disk full".into()))
        }));
        assert_eq!(bot.run_once().unwrap(), ExitStatus::RenderFailed);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn command_spawn_failure_is_fatal() {
        let calls = Calls::default();
        let transport = FakeTransport { calls: calls.clone(), reply: OK };
        fn broken(_: &str, _: Duration) -> std::result::Result<CommandOutput, RunError> {
            Err(RunError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "bash")))
        }
        let config = BotConfig::new("t", "c");
        let bot = FortuneBot::with_parts(config, Box::new(broken), Box::new(transport));
        assert!(matches!(bot.run_once(), Err(Error::Command(_))));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn caption_is_epoch_message() {
        let (bot, calls) = bot(OK);
        assert_eq!(bot.run_with_text("COMMAND OUTPUT").unwrap(), ExitStatus::Posted);
        let calls = calls.borrow();
        let form = &calls[0].1;
        assert_eq!(
            form.field("caption"),
            Some("Your fortune cookie for the day. Epoch time: 1234567890")
        );
        assert_eq!(form.field("parse_mode"), Some("HTML"));
        assert_eq!(form.field("chat_id"), Some("@chan"));
    }

    #[test]
    fn command_output_never_reaches_the_caption() {
        for repeat in [1usize, 5, 50] {
            let (bot, calls) = bot(OK);
            let weird = format!("{}<b>&'\"\n\u{2603}\t", "lorem ".repeat(repeat * 1000));
            assert_eq!(bot.run_with_text(&weird).unwrap(), ExitStatus::Posted);
            assert_eq!(bot.run_with_text("X\n".repeat(200).as_str()).unwrap(), ExitStatus::Posted);

            let calls = calls.borrow();
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[0].1.field("caption"), calls[1].1.field("caption"));
            assert_eq!(calls[0].1.field("caption"), Some(bot.caption().as_str()));
        }
    }

    #[test]
    fn image_comes_from_command_output() {
        let calls = Calls::default();
        let transport = FakeTransport { calls: calls.clone(), reply: OK };
        let seen = Rc::new(RefCell::new(String::new()));
        let seen_by_renderer = seen.clone();
        let bot = FortuneBot::with_parts(BotConfig::new("t", "c"), runner_ok(), Box::new(transport))
            .with_renderer(Box::new(move |text: &str| -> Result<Vec<u8>> {
                *seen_by_renderer.borrow_mut() = text.to_string();
                Ok(text.as_bytes().to_vec())
            }));
        assert_eq!(bot.run_once().unwrap(), ExitStatus::Posted);
        assert_eq!(*seen.borrow(), "hello");
        assert_eq!(calls.borrow()[0].1.file.data, b"hello");
    }
}
