//! Distribution profiles.
//!
//! A profile is the per-target-OS policy behind a build: which files and
//! directories make up the package image, which runtime and build
//! dependencies apply, which buildpacks to try, and how the external package
//! builder is invoked. [`Debian`] is the only profile shipped; other targets
//! would implement [`DistributionProfile`] alongside it.

mod database;
mod debian;
mod dependencies;
mod hooks;

pub use database::{Dpkg, PackageDatabase};
pub use debian::Debian;
pub use dependencies::{DependencyLists, union};
pub use hooks::{HookCache, HookKind};

use crate::bundler::{
    buildpack::Buildpack,
    error::{Error, Result},
    procfile::ProcfileEntry,
    settings::BuildConfig,
    template::{TemplateEntry, TemplateRenderer},
    utils::ExternalCommand,
};
use std::{
    future::Future,
    path::{Path, PathBuf},
};

/// Contract shared by every target distribution.
pub trait DistributionProfile: Send + Sync {
    /// Release codename this profile targets.
    fn codename(&self) -> &str;

    /// Renderer used for this profile's templates.
    fn renderer(&self) -> &TemplateRenderer;

    /// Directories and files making up the package image, directories first.
    fn templates(&self, app_name: &str) -> Vec<TemplateEntry>;

    /// Service definitions for every daemon process, two per daemon.
    fn initializers_for(
        &self,
        app_name: &str,
        processes: &[ProcfileEntry],
    ) -> Vec<(ProcfileEntry, TemplateEntry)>;

    /// Runtime dependencies: `extra`, then distribution and codename defaults.
    fn dependencies(&self, extra: &[String]) -> Result<Vec<String>>;

    /// Build dependencies: `extra`, then distribution and codename defaults.
    fn build_dependencies(&self, extra: &[String]) -> Result<Vec<String>>;

    /// Buildpacks to try, or only the custom one when given.
    fn buildpacks(&self, custom_uri: Option<&str>) -> Vec<Buildpack>;

    /// Verifies build dependencies, installing missing ones when `config.auto`.
    ///
    /// Returns the install command when missing dependencies were left in
    /// place, so the caller can surface it as a warning.
    fn check(
        &self,
        config: &BuildConfig,
    ) -> impl Future<Output = Result<Option<ExternalCommand>>> + Send;

    /// Path of the rendered pre-install hook, rendered at most once.
    fn preinstall_hook(&self, config: &BuildConfig)
    -> impl Future<Output = Result<PathBuf>> + Send;

    /// Path of the rendered post-install hook, rendered at most once.
    fn postinstall_hook(
        &self,
        config: &BuildConfig,
    ) -> impl Future<Output = Result<PathBuf>> + Send;

    /// Invocation of the external package builder for `staging_dir`.
    fn build_command(
        &self,
        staging_dir: &Path,
        config: &BuildConfig,
    ) -> impl Future<Output = Result<ExternalCommand>> + Send;
}

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PKGR_DATA_DIR";

/// Location of the static distribution assets (templates, dependency lists).
///
/// Resolved once at process start and passed to profile constructors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataDir(PathBuf);

impl DataDir {
    /// Uses `path` as the data directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Resolves the data directory.
    ///
    /// Order: `explicit`, then `$PKGR_DATA_DIR`, then `<exe>/../share/pkgr`,
    /// then the `data/` directory shipped with the crate sources.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let from_env = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        let next_to_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|bin| bin.join("../share/pkgr")));
        let bundled = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data"));

        if let Some(dir) = explicit.or(from_env) {
            return if dir.join("distributions").is_dir() {
                Ok(Self(dir))
            } else {
                Err(Error::InvalidConfig(format!(
                    "data directory {} has no distributions/ subdirectory",
                    dir.display()
                )))
            };
        }

        next_to_exe
            .into_iter()
            .chain(std::iter::once(bundled))
            .find(|dir| dir.join("distributions").is_dir())
            .map(Self)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "no data directory found; pass --data-dir or set {}",
                    DATA_DIR_ENV
                ))
            })
    }

    /// Root of the data directory.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Asset directory of one distribution.
    pub fn distribution(&self, name: &str) -> PathBuf {
        self.0.join("distributions").join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_must_contain_distributions() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DataDir::resolve(Some(dir.path().to_path_buf())).is_err());

        std::fs::create_dir_all(dir.path().join("distributions/debian")).unwrap();
        let data = DataDir::resolve(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(data.distribution("debian"), dir.path().join("distributions/debian"));
    }
}
