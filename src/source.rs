//! Text source: run the configured shell pipeline and capture what it prints.
//!
//! The process executor sits behind [`CommandRunner`] so tests can swap in a
//! deterministic fake instead of spawning a real shell.

use crate::{Error, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Returned in place of the command output when the command exceeds its timeout.
pub const TIMEOUT_PLACEHOLDER: &str = "(command timed out)";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            code: Some(0),
        }
    }
}

/// Why a runner produced no output
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to run command: {0}")]
    Io(#[from] std::io::Error),
}

/// Executes a command line and captures its output.
pub trait CommandRunner {
    fn run(&self, command: &str, timeout: Duration) -> std::result::Result<CommandOutput, RunError>;
}

impl<F> CommandRunner for F
where
    F: Fn(&str, Duration) -> std::result::Result<CommandOutput, RunError>,
{
    fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, RunError> {
        self(command, timeout)
    }
}

/// Runs commands through `<shell> -c <command>`, killing the child on timeout.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl ShellRunner {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self { shell: shell.into() }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SHELL)
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a pipe to reach EOF. `None` if the deadline passes first, which
/// happens when a background process keeps the pipe open after the shell exits.
fn collect(reader: Option<Receiver<Vec<u8>>>, deadline: Option<Instant>) -> Option<String> {
    let Some(rx) = reader else {
        return Some(String::new());
    };
    let bytes = match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(bytes) => bytes,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Vec::new(),
            }
        }
        None => rx.recv().unwrap_or_default(),
    };
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, RunError> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        // No deadline when the timeout is too large to represent
        let deadline = Instant::now().checked_add(timeout);
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::TimedOut(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout, deadline);
        let stderr = collect(stderr, deadline);
        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            return Err(RunError::TimedOut(timeout));
        };

        Ok(CommandOutput {
            stdout,
            stderr,
            code: status.code(),
        })
    }
}

/// Produces the text that ends up on the image.
pub struct TextSource {
    command: String,
    runner: Box<dyn CommandRunner>,
}

impl TextSource {
    pub fn new(command: impl Into<String>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            command: command.into(),
            runner,
        }
    }

    /// Run the command and return its output.
    ///
    /// A timeout is not an error: the placeholder [`TIMEOUT_PLACEHOLDER`] is
    /// returned instead. When stdout is empty the result is a diagnostic that
    /// carries stderr. Only a failure to start or wait on the process is
    /// reported as [`Error::Command`].
    pub fn get_output(&self, timeout: Duration) -> Result<String> {
        match self.runner.run(&self.command, timeout) {
            Ok(output) => Ok(describe_output(output)),
            Err(RunError::TimedOut(after)) => {
                log::error!("command timed out after {}s", after.as_secs_f64());
                Ok(TIMEOUT_PLACEHOLDER.to_string())
            }
            Err(RunError::Io(e)) => Err(Error::Command(e.to_string())),
        }
    }
}

fn describe_output(output: CommandOutput) -> String {
    if !output.stdout.is_empty() {
        return output.stdout.trim_end_matches('\n').to_string();
    }
    let stderr = if output.stderr.is_empty() {
        "<none>"
    } else {
        output.stderr.as_str()
    };
    format!("(no stdout)\n\nstderr:\n{}", stderr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake<F>(f: F) -> Box<dyn CommandRunner>
    where
        F: Fn(&str, Duration) -> std::result::Result<CommandOutput, RunError> + 'static,
    {
        Box::new(f)
    }

    fn source_with(stdout: &'static str, stderr: &'static str) -> TextSource {
        TextSource::new("ignored", fake(move |_, _| Ok(CommandOutput::new(stdout, stderr))))
    }

    #[test]
    fn stdout_has_trailing_newlines_stripped() {
        let src = source_with("hello\n", "");
        assert_eq!(src.get_output(Duration::from_secs(30)).unwrap(), "hello");

        let src = source_with("a\n\nb\n\n\n", "");
        assert_eq!(src.get_output(Duration::from_secs(30)).unwrap(), "a\n\nb");
    }

    #[test]
    fn empty_stdout_reports_stderr() {
        let src = source_with("", "oops\n");
        let out = src.get_output(Duration::from_secs(30)).unwrap();
        assert!(out.contains("oops"));
        assert!(out.contains("stderr"));
        assert_eq!(out, "(no stdout)\n\nstderr:\noops\n");
    }

    #[test]
    fn empty_stdout_and_stderr_uses_placeholder() {
        let src = source_with("", "");
        let out = src.get_output(Duration::from_secs(30)).unwrap();
        assert_eq!(out, "(no stdout)\n\nstderr:\n<none>");
    }

    #[test]
    fn timeout_is_replaced_by_placeholder() {
        let src = TextSource::new(
            "sleep 100",
            fake(|_, t| Err(RunError::TimedOut(t))),
        );
        assert_eq!(src.get_output(Duration::from_secs(1)).unwrap(), TIMEOUT_PLACEHOLDER);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let src = TextSource::new(
            "true",
            fake(|_, _| {
                Err(RunError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no shell")))
            }),
        );
        assert!(matches!(src.get_output(Duration::from_secs(1)), Err(Error::Command(_))));
    }

    #[test]
    fn runner_receives_command_and_timeout() {
        let src = TextSource::new(
            "echo hi",
            fake(|cmd, t| {
                assert_eq!(cmd, "echo hi");
                assert_eq!(t, Duration::from_secs(7));
                Ok(CommandOutput::new("ok", ""))
            }),
        );
        assert_eq!(src.get_output(Duration::from_secs(7)).unwrap(), "ok");
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_captures_both_streams() {
        let runner = ShellRunner::new("/bin/sh");
        let out = runner
            .run("echo out; echo err 1>&2", Duration::from_secs(10))
            .expect("run");
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.code, Some(0));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_times_out() {
        let runner = ShellRunner::new("/bin/sh");
        let res = runner.run("sleep 5", Duration::from_millis(200));
        assert!(matches!(res, Err(RunError::TimedOut(_))));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_deadline_covers_lingering_pipes() {
        // the background sleep keeps stdout open after the shell itself exits
        let runner = ShellRunner::new("/bin/sh");
        let started = Instant::now();
        let res = runner.run("echo hi; sleep 4 &", Duration::from_millis(500));
        assert!(matches!(res, Err(RunError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(3));

        let src = TextSource::new("echo hi; sleep 4 &", Box::new(ShellRunner::new("/bin/sh")));
        let started = Instant::now();
        assert_eq!(src.get_output(Duration::from_millis(500)).unwrap(), TIMEOUT_PLACEHOLDER);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_accepts_unrepresentable_timeout() {
        let runner = ShellRunner::new("/bin/sh");
        let out = runner.run("echo hi", Duration::MAX).expect("run");
        assert_eq!(out.stdout, "hi\n");
    }

    #[test]
    fn shell_runner_missing_shell_is_io_error() {
        let runner = ShellRunner::new("/definitely/not/a/shell");
        let res = runner.run("true", Duration::from_secs(1));
        assert!(matches!(res, Err(RunError::Io(_))));
    }
}
