//! Colored terminal output.

use crate::bundler::utils::OutputStream;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use std::io::{self, IsTerminal, Write};

/// User-facing output, separate from diagnostic logging.
///
/// Progress goes to stdout, warnings and errors to stderr. Colors are used
/// only when the target stream is a terminal.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Creates an output manager.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    fn stdout(&self) -> StandardStream {
        StandardStream::stdout(choice(io::stdout().is_terminal()))
    }

    fn stderr(&self) -> StandardStream {
        StandardStream::stderr(choice(io::stderr().is_terminal()))
    }

    fn tagged(
        mut stream: StandardStream,
        color: Color,
        tag: &str,
        message: &str,
    ) -> io::Result<()> {
        stream.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(stream, "{tag}")?;
        stream.reset()?;
        writeln!(stream, " {message}")
    }

    /// Progress step.
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        Self::tagged(self.stdout(), Color::Cyan, "==>", message)
    }

    /// Completed step.
    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        Self::tagged(self.stdout(), Color::Green, "✓", message)
    }

    /// Warning, printed even when quiet.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        Self::tagged(self.stderr(), Color::Yellow, "warning:", message)
    }

    /// Fatal error.
    pub fn error(&self, message: &str) -> io::Result<()> {
        Self::tagged(self.stderr(), Color::Red, "error:", message)
    }

    /// Detail shown with `--verbose` only.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }
        let mut stream = self.stdout();
        stream.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(stream, "    {message}")?;
        stream.reset()
    }

    /// One line of child process output, indented on its original stream.
    pub fn child_line(&self, source: OutputStream, line: &str) -> io::Result<()> {
        match source {
            OutputStream::Stdout if !self.quiet => writeln!(self.stdout(), "    {line}"),
            OutputStream::Stdout => Ok(()),
            OutputStream::Stderr => writeln!(self.stderr(), "    {line}"),
        }
    }
}

fn choice(is_terminal: bool) -> ColorChoice {
    if is_terminal {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}
