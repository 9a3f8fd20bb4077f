//! Procfile process definitions.
//!
//! A Procfile lists one `name: command` pair per line. Long-running entries
//! get service definitions in the package; one-off tasks such as a console do
//! not.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::path::Path;

/// Process names treated as one-off tasks rather than daemons.
pub const ONE_OFF_PROCESSES: &[&str] = &["console", "rake"];

/// A process definition from a Procfile.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ProcfileEntry {
    /// Process name, e.g. `web`
    pub name: String,
    /// Shell command starting the process
    pub command: String,
    /// Whether the process is long-running
    pub daemon: bool,
}

impl ProcfileEntry {
    /// Creates an entry.
    pub fn new(name: impl Into<String>, command: impl Into<String>, daemon: bool) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            daemon,
        }
    }

    /// Whether this process gets service definitions.
    pub fn is_daemon(&self) -> bool {
        self.daemon
    }
}

/// Parses Procfile contents.
///
/// Blank lines and `#` comments are skipped. Process names are restricted to
/// ASCII letters, digits, `_` and `-` since they end up in file names and
/// service definitions.
pub fn parse(contents: &str) -> Result<Vec<ProcfileEntry>> {
    let mut entries = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (name, command) = line.split_once(':').ok_or_else(|| {
            Error::InvalidConfig(format!(
                "Procfile line {} is not of the form `name: command`",
                number + 1
            ))
        })?;
        let name = name.trim();
        let command = command.trim();

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidConfig(format!(
                "Procfile line {}: invalid process name '{}'",
                number + 1,
                name
            )));
        }

        let daemon = !ONE_OFF_PROCESSES.contains(&name);
        entries.push(ProcfileEntry::new(name, command, daemon));
    }

    Ok(entries)
}

/// Loads `<app_dir>/Procfile`; a missing Procfile yields no entries.
pub async fn load(app_dir: &Path) -> Result<Vec<ProcfileEntry>> {
    let path = app_dir.join("Procfile");
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => parse(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No Procfile in {}", app_dir.display());
            Ok(Vec::new())
        }
        Err(e) => Err::<Vec<ProcfileEntry>, _>(e).fs_context("reading", &path),
    }
}
