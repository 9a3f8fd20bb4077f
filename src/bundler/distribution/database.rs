//! Installed-package queries against the host's package database.

use crate::bundler::utils::ExternalCommand;

/// Host package database.
///
/// Probes are blocking and run off the async executor.
pub trait PackageDatabase: Send + Sync {
    /// Whether `package` is installed on this host.
    fn is_installed(&self, package: &str) -> bool;

    /// Command that installs `packages` non-interactively.
    fn install_command(&self, packages: &[String]) -> ExternalCommand;
}

/// The dpkg/apt database of Debian-family hosts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dpkg;

impl Dpkg {
    /// Status query for one package.
    pub fn query_command(package: &str) -> ExternalCommand {
        ExternalCommand::new("dpkg").arg("-s").arg(package)
    }
}

impl PackageDatabase for Dpkg {
    fn is_installed(&self, package: &str) -> bool {
        Self::query_command(package)
            .succeeds_blocking()
            .unwrap_or_else(|e| {
                log::debug!("Treating {} as missing: {}", package, e);
                false
            })
    }

    fn install_command(&self, packages: &[String]) -> ExternalCommand {
        ExternalCommand::new("sudo")
            .args(["apt-get", "install", "-y"])
            .args(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_command_lists_every_package() {
        let cmd = Dpkg.install_command(&["libpq-dev".to_string(), "git".to_string()]);
        assert_eq!(cmd.display(), "sudo apt-get install -y libpq-dev git");
    }

    #[test]
    fn query_names_the_package() {
        assert_eq!(Dpkg::query_command("libpq-dev").display(), "dpkg -s libpq-dev");
    }
}
