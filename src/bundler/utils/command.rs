//! External command invocation.
//!
//! Commands are always built as an argument vector and spawned directly,
//! never through a shell, so configuration values cannot inject shell syntax.

use super::shell;
use crate::bundler::error::{Error, Result};
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Which output stream a line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Outcome of a streamed command.
#[derive(Debug)]
pub struct StreamedRun {
    /// Exit status
    pub status: ExitStatus,
    /// Both streams, interleaved in arrival order
    pub output: String,
}

/// An external command as program plus argument vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalCommand {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl ExternalCommand {
    /// Command running `program` with no arguments.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Sets the working directory of the child.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Program name.
    pub fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Arguments, lossily converted for inspection.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Copy-pasteable command line, with every argument shell-quoted.
    pub fn display(&self) -> String {
        let mut words = vec![self.program()];
        words.extend(self.args_lossy());
        shell::join(&words)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }

    fn spawn_error(&self, error: std::io::Error) -> Error {
        Error::CommandFailed {
            command: self.program(),
            error,
        }
    }

    /// Runs with inherited stdio and returns the exit status.
    pub async fn status(&self) -> Result<ExitStatus> {
        log::debug!("Running {}", self.display());
        self.command()
            .status()
            .await
            .map_err(|e| self.spawn_error(e))
    }

    /// Runs silently and reports whether the command succeeded.
    pub async fn succeeds(&self) -> Result<bool> {
        log::debug!("Running {}", self.display());
        let status = self
            .command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(status.success())
    }

    /// Blocking [`ExternalCommand::succeeds`], for callers already off the
    /// async executor.
    pub fn succeeds_blocking(&self) -> Result<bool> {
        log::debug!("Running {}", self.display());
        let mut command = std::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        let status = command.status().map_err(|e| self.spawn_error(e))?;
        Ok(status.success())
    }

    /// Runs and captures stdout; `None` when the command exits non-zero.
    pub async fn stdout(&self) -> Result<Option<String>> {
        log::debug!("Running {}", self.display());
        let output = self
            .command()
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    /// Runs with `stdin`, handing every output line to `on_line` as it arrives.
    ///
    /// Both streams are drained concurrently so a chatty stderr cannot block
    /// stdout; the lines are also collected into [`StreamedRun::output`].
    pub async fn run_streaming(
        &self,
        stdin: Stdio,
        on_line: &(dyn Fn(OutputStream, &str) + Sync),
    ) -> Result<StreamedRun> {
        log::debug!("Running {}", self.display());

        let mut child = self
            .command()
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let collected = std::sync::Mutex::new(Vec::new());
        let record = |stream: OutputStream, line: String| {
            on_line(stream, &line);
            if let Ok(mut lines) = collected.lock() {
                lines.push(line);
            }
        };

        tokio::join!(
            async {
                if let Some(stdout) = child.stdout.take() {
                    drain_lines(stdout, |line| record(OutputStream::Stdout, line)).await;
                }
            },
            async {
                if let Some(stderr) = child.stderr.take() {
                    drain_lines(stderr, |line| record(OutputStream::Stderr, line)).await;
                }
            }
        );

        let status = child.wait().await.map_err(|e| self.spawn_error(e))?;
        let output = collected
            .into_inner()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default();

        Ok(StreamedRun { status, output })
    }
}

/// Reads `reader` to EOF, one line at a time.
///
/// Lines are decoded lossily; a child writing non-UTF-8 bytes must still have
/// its pipe drained or it dies of SIGPIPE.
async fn drain_lines<R, F>(reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                on_line(String::from_utf8_lossy(&buf).into_owned());
            }
            Err(e) => {
                log::debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments() {
        let cmd = ExternalCommand::new("fpm")
            .args(["--description", "An app; with $(shell)"])
            .arg("-d")
            .arg("libpq5");
        assert_eq!(
            cmd.display(),
            "fpm --description 'An app; with $(shell)' -d libpq5"
        );
    }

    #[tokio::test]
    async fn streams_lines_and_reports_status() {
        let seen = std::sync::Mutex::new(Vec::new());
        let run = ExternalCommand::new("sh")
            .args(["-c", "echo one; echo two >&2; exit 3"])
            .run_streaming(Stdio::null(), &|stream, line| {
                seen.lock().unwrap().push((stream, line.to_string()));
            })
            .await
            .unwrap();

        assert_eq!(run.status.code(), Some(3));
        let seen = seen.into_inner().unwrap();
        assert!(seen.contains(&(OutputStream::Stdout, "one".to_string())));
        assert!(seen.contains(&(OutputStream::Stderr, "two".to_string())));
        assert!(run.output.contains("one") && run.output.contains("two"));
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_cut_the_stream() {
        let count = std::sync::atomic::AtomicUsize::new(0);
        let run = ExternalCommand::new("sh")
            .args([
                "-c",
                "printf 'before\\n\\377\\377\\n'; i=0; while [ $i -lt 20000 ]; do echo after-$i; i=$((i+1)); done",
            ])
            .run_streaming(Stdio::null(), &|_, _| {
                count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            })
            .await
            .unwrap();

        assert!(run.status.success());
        assert_eq!(count.into_inner(), 20002);
        assert!(run.output.contains("\u{FFFD}\u{FFFD}"));
        assert!(run.output.ends_with("after-19999"));
    }

    #[test]
    fn blocking_probe_reports_success() {
        assert!(ExternalCommand::new("true").succeeds_blocking().unwrap());
        assert!(!ExternalCommand::new("false").succeeds_blocking().unwrap());
        assert!(ExternalCommand::new("pkgr-definitely-missing-tool")
            .succeeds_blocking()
            .is_err());
    }

    #[tokio::test]
    async fn spawn_failure_names_the_program() {
        let err = ExternalCommand::new("pkgr-definitely-missing-tool")
            .status()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { ref command, .. } if command == "pkgr-definitely-missing-tool"));
    }
}
