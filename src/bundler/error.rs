//! Error types for packaging operations.
//!
//! Every external step (archiving, remote transport, dependency install,
//! package builder) has its own variant carrying the exit status of the
//! failing command, so the binary can propagate it unchanged.

use std::{fmt::Display, path::Path, process::ExitStatus};

/// Result type alias for packaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while normalizing input, dispatching or assembling a package.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The archiving command exited non-zero.
    #[error("failed to compress input directory {path} (exit status {status})")]
    InputNormalization {
        /// Directory that was being archived
        path: String,
        /// Exit status reported by `tar`
        status: i32,
    },

    /// The remote peer exited non-zero.
    #[error(
        "remote packaging command failed on {host} (exit status {status}). \
         Make sure the build host is bootstrapped by running: `{remediation}`"
    )]
    RemoteExecution {
        /// Host the build was delegated to
        host: String,
        /// Exit status of the remote invocation
        status: i32,
        /// Command the remote host needs to run before retrying
        remediation: String,
    },

    /// Installing missing build dependencies failed.
    #[error("failed to install build dependencies with `{command}` (exit status {status})")]
    DependencyCheck {
        /// The install command that was run
        command: String,
        /// Its exit status
        status: i32,
    },

    /// The package builder exited non-zero.
    #[error("package builder failed (exit status {status}):\n{output}")]
    BuilderInvocation {
        /// Exit status reported by the builder
        status: i32,
        /// Captured builder output
        output: String,
    },

    /// A hook or file template could not be rendered.
    #[error("failed to render template {template}: {reason}")]
    TemplateRender {
        /// Template source path or name
        template: String,
        /// Why rendering failed
        reason: String,
    },

    /// A buildpack stage exited non-zero.
    #[error("buildpack {buildpack} failed during {stage} (exit status {status})")]
    BuildpackFailed {
        /// Buildpack URI
        buildpack: String,
        /// `setup`, `detect` or `compile`
        stage: String,
        /// Exit status of the stage
        status: i32,
    },

    /// The build configuration is not usable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A command could not be spawned at all.
    #[error("failed to run `{command}`: {error}")]
    CommandFailed {
        /// Program name
        command: String,
        /// Spawn error
        #[source]
        error: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("{context} {path}: {error}")]
    Fs {
        /// What was being done
        context: &'static str,
        /// Path involved
        path: String,
        /// Underlying error
        #[source]
        error: std::io::Error,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    /// A static declarative document could not be parsed.
    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    /// Anything else.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Exit status of the external command behind this error, if any.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Error::InputNormalization { status, .. }
            | Error::RemoteExecution { status, .. }
            | Error::DependencyCheck { status, .. }
            | Error::BuilderInvocation { status, .. }
            | Error::BuildpackFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Exit code of a finished child, `-1` when it was killed by a signal.
pub fn status_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Convenient type alias of Result type for Context.
pub trait Context<T> {
    /// Converts `None` or an error into [`Error::GenericError`] carrying `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Like [`Context::context`] but evaluates the message lazily.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E: Display> Context<T> for std::result::Result<T, E> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::GenericError(format!("{context}: {e}")))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::GenericError(format!("{}: {e}", f())))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Attaches a path to I/O failures.
pub trait ErrorExt<T> {
    /// Wraps an I/O error into [`Error::Fs`] with a description and the path.
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.as_ref().display().to_string(),
            error,
        })
    }
}

/// Returns early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError(format!($msg)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_is_exposed_for_external_failures() {
        let err = Error::RemoteExecution {
            host: "build01".into(),
            status: 127,
            remediation: "sudo apt-get install -y rsync".into(),
        };
        assert_eq!(err.exit_status(), Some(127));
        assert!(err.to_string().contains("sudo apt-get install -y rsync"));

        let err = Error::InvalidConfig("name is missing".into());
        assert_eq!(err.exit_status(), None);
    }

    #[test]
    fn option_context_produces_generic_error() {
        let missing: Option<u8> = None;
        let err = missing.context("no staging directory").unwrap_err();
        assert_eq!(err.to_string(), "no staging directory");
    }
}
