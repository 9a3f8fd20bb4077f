//! Remote builds over ssh.
//!
//! The normalized archive is piped into `pkgr package -` on the build host,
//! whose output is forwarded line by line. Produced packages are then pulled
//! back from the remote home directory with rsync.

use crate::bundler::{
    Error, Result,
    builder::{LineSink, tool_detection},
    error::{ErrorExt, status_code},
    utils::{ExternalCommand, shell},
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
    time::SystemTime,
};

/// Program invoked on the build host.
pub const REMOTE_PROGRAM: &str = "pkgr";

/// Command that prepares a build host for remote packaging.
pub fn bootstrap_command() -> String {
    format!(
        "sudo apt-get install -y build-essential git rsync ruby-dev && sudo gem install fpm && cargo install pkgr --version {}",
        env!("CARGO_PKG_VERSION")
    )
}

/// A build host reachable over ssh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteHost {
    host: String,
}

impl RemoteHost {
    /// Validates `host` as an ssh destination (`[user@]hostname`).
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        let valid = !host.is_empty()
            && !host.starts_with('-')
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "@.-_:[]".contains(c));

        if !valid {
            return Err(Error::InvalidConfig(format!(
                "'{}' is not a valid remote host",
                host
            )));
        }
        Ok(Self { host })
    }

    /// Host name as given.
    pub fn as_str(&self) -> &str {
        &self.host
    }

    /// ssh invocation running the packaging peer with `peer_args`.
    ///
    /// ssh joins trailing arguments into one remote shell command line, so
    /// every word is quoted here.
    pub fn package_command(&self, peer_args: &[String]) -> ExternalCommand {
        let mut words = vec![REMOTE_PROGRAM.to_string(), "package".into(), "-".into()];
        words.extend(peer_args.iter().cloned());

        ExternalCommand::new("ssh")
            .arg("--")
            .arg(&self.host)
            .arg(shell::join(&words))
    }

    /// Streams `archive` to the peer and forwards its output to `on_line`.
    pub async fn package(
        &self,
        archive: &Path,
        peer_args: &[String],
        on_line: LineSink<'_>,
    ) -> Result<()> {
        tool_detection::require("ssh")?;

        let input = std::fs::File::open(archive).fs_context("opening archive", archive)?;
        let command = self.package_command(peer_args);
        log::info!("Packaging remotely on {}", self.host);

        let run = command.run_streaming(Stdio::from(input), on_line).await?;
        if run.status.success() {
            Ok(())
        } else {
            Err(Error::RemoteExecution {
                host: self.host.clone(),
                status: status_code(&run.status),
                remediation: bootstrap_command(),
            })
        }
    }

    /// Pulls every `.deb` from the remote home directory into `dest` and
    /// returns the packages that were added or rewritten by the transfer.
    pub async fn fetch_artifacts(&self, dest: &Path) -> Result<Vec<PathBuf>> {
        tool_detection::require("rsync")?;
        tokio::fs::create_dir_all(dest)
            .await
            .fs_context("creating output directory", dest)?;
        let before = PackageSnapshot::take(dest)?;

        let status = ExternalCommand::new("rsync")
            .arg(format!("{}:~/*.deb", self.host))
            .arg(dest)
            .status()
            .await?;

        if !status.success() {
            return Err(Error::RemoteExecution {
                host: self.host.clone(),
                status: status_code(&status),
                remediation: "sudo apt-get install -y rsync".into(),
            });
        }

        Ok(PackageSnapshot::take(dest)?.changed_since(&before))
    }
}

/// Modification times of the packages in a directory.
#[derive(Debug, Default)]
struct PackageSnapshot(BTreeMap<PathBuf, Option<SystemTime>>);

impl PackageSnapshot {
    fn take(dir: &Path) -> Result<Self> {
        Ok(Self(
            list_packages(dir)?
                .into_iter()
                .map(|path| {
                    let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
                    (path, modified)
                })
                .collect(),
        ))
    }

    /// Packages that are new or were rewritten since `earlier`.
    fn changed_since(&self, earlier: &Self) -> Vec<PathBuf> {
        self.0
            .iter()
            .filter(|(path, modified)| earlier.0.get(*path) != Some(*modified))
            .map(|(path, _)| path.clone())
            .collect()
    }
}

/// `.deb` files directly inside `dir`, sorted.
pub fn list_packages(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.deb");
    let pattern = pattern.to_string_lossy();
    let mut packages: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::GenericError(format!("invalid artifact pattern {pattern}: {e}")))?
        .filter_map(|entry| entry.ok())
        .collect();
    packages.sort();
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_option_like_hosts() {
        assert!(RemoteHost::new("-oProxyCommand=touch /tmp/x").is_err());
        assert!(RemoteHost::new("build host").is_err());
        assert!(RemoteHost::new("").is_err());
        assert!(RemoteHost::new("deploy@build-01.example.com").is_ok());
    }

    #[test]
    fn peer_arguments_are_quoted_into_one_remote_command() {
        let host = RemoteHost::new("build01").unwrap();
        let command = host.package_command(&[
            "--name".into(),
            "my-app".into(),
            "--description".into(),
            "My app; rm -rf ~".into(),
        ]);

        assert_eq!(command.program(), "ssh");
        assert_eq!(
            command.args_lossy(),
            [
                "--",
                "build01",
                "pkgr package - --name my-app --description 'My app; rm -rf ~'",
            ]
        );
    }

    #[test]
    fn bootstrap_names_the_peer_version() {
        assert!(bootstrap_command().contains(env!("CARGO_PKG_VERSION")));
        assert!(bootstrap_command().starts_with("sudo apt-get install -y"));
    }

    #[test]
    fn lists_only_packages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_1.0-1_amd64.deb"), "").unwrap();
        std::fs::write(dir.path().join("a_1.0-1_amd64.deb"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let packages = list_packages(dir.path()).unwrap();
        assert_eq!(
            packages,
            [dir.path().join("a_1.0-1_amd64.deb"), dir.path().join("b_1.0-1_amd64.deb")]
        );
    }

    #[test]
    fn only_transferred_packages_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("old_0.9-1_amd64.deb");
        let rewritten = dir.path().join("app_1.0-1_amd64.deb");
        std::fs::write(&stale, "").unwrap();
        std::fs::write(&rewritten, "").unwrap();
        let before = PackageSnapshot::take(dir.path()).unwrap();

        let fresh = dir.path().join("app-extra_1.0-1_amd64.deb");
        std::fs::write(&fresh, "").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&rewritten)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(86_400))
            .unwrap();

        let changed = PackageSnapshot::take(dir.path()).unwrap().changed_since(&before);
        assert_eq!(changed, [fresh, rewritten]);
    }
}
