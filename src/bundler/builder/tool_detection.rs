//! External tool detection and availability checking.
//!
//! Tools are looked up on `PATH` before a stage spawns them, so a missing tool
//! is reported with an install hint instead of a bare spawn error.

use crate::bundler::error::{Error, Result};
use std::{path::PathBuf, sync::LazyLock};

/// Version reported by `fpm --version`, if fpm is installed and runs.
///
/// Cached result to avoid repeated subprocess calls during packaging.
pub static FPM_VERSION: LazyLock<Option<String>> = LazyLock::new(|| match which::which("fpm") {
    Ok(path) => {
        log::debug!("Found fpm at: {}", path.display());

        match std::process::Command::new(&path).arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                log::info!("✓ fpm available: {}", version);
                Some(version)
            }
            Ok(output) => {
                log::warn!(
                    "fpm found at {} but --version check failed (exit code: {:?}). Stderr: {}",
                    path.display(),
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                );
                None
            }
            Err(e) => {
                log::warn!(
                    "fpm found at {} but failed to execute: {}. Check file permissions.",
                    path.display(),
                    e
                );
                None
            }
        }
    }
    Err(e) => {
        log::debug!("fpm not found in PATH: {}", e);
        None
    }
});

/// Resolves `tool` on `PATH` or fails with an install hint.
pub fn require(tool: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|e| {
        Error::GenericError(format!(
            "required tool `{}` not found in PATH ({}). Install it with: {}",
            tool,
            e,
            install_hint(tool)
        ))
    })
}

fn install_hint(tool: &str) -> &'static str {
    match tool {
        "fpm" => "sudo apt-get install -y ruby-dev build-essential && sudo gem install fpm",
        "ssh" => "sudo apt-get install -y openssh-client",
        "rsync" => "sudo apt-get install -y rsync",
        "git" => "sudo apt-get install -y git",
        "tar" => "sudo apt-get install -y tar",
        _ => "your distribution's package manager",
    }
}
