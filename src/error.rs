//! Application-level errors.
//!
//! Wraps packaging failures together with command line problems and maps
//! each to the process exit code.

use thiserror::Error;

/// Result type alias for application operations
pub type Result<T> = std::result::Result<T, PackagerError>;

/// Main error type of the `pkgr` binary
#[derive(Error, Debug)]
pub enum PackagerError {
    /// CLI argument errors
    #[error("{0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Packaging errors
    #[error("{0}")]
    Packaging(#[from] crate::bundler::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Conflicting arguments
    #[error("Conflicting arguments {}: {hint}", arguments.join(" and "))]
    ConflictingArguments {
        /// Arguments that conflict
        arguments: Vec<String>,
        /// What to use instead
        hint: String,
    },
}

impl PackagerError {
    /// Exit code for this error.
    ///
    /// Failures of an external command exit with that command's status so
    /// callers see the same code a direct invocation would produce; anything
    /// else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackagerError::Packaging(e) => e
                .exit_status()
                .filter(|status| (1..=255).contains(status))
                .unwrap_or(1),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::Error;

    #[test]
    fn external_status_becomes_exit_code() {
        let err = PackagerError::from(Error::RemoteExecution {
            host: "build01".into(),
            status: 127,
            remediation: "sudo apt-get install -y rsync".into(),
        });
        assert_eq!(err.exit_code(), 127);

        let killed = PackagerError::from(Error::BuilderInvocation {
            status: -1,
            output: String::new(),
        });
        assert_eq!(killed.exit_code(), 1);

        let cli = PackagerError::from(CliError::InvalidArguments {
            reason: "bad".into(),
        });
        assert_eq!(cli.exit_code(), 1);
    }
}
