//! Builder for constructing BuildConfig.

use super::{Arch, BuildConfig};
use crate::bundler::error::Result;
use std::path::{Path, PathBuf};

/// Fallback release codename when the host does not report one.
pub const DEFAULT_CODENAME: &str = "wheezy";

/// Builder for constructing [`BuildConfig`].
///
/// # Examples
///
/// ```
/// use pkgr::bundler::BuildConfigBuilder;
///
/// # fn example() -> pkgr::bundler::Result<()> {
/// let config = BuildConfigBuilder::new()
///     .name("my-app")
///     .version("1.0.0")
///     .dependencies(vec!["libpq5".into()])
///     .codename("wheezy")
///     .build()?;
/// assert_eq!(config.architecture, pkgr::bundler::Arch::host());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct BuildConfigBuilder {
    name: Option<String>,
    version: Option<String>,
    iteration: Option<String>,
    architecture: Option<Arch>,
    homepage: Option<String>,
    description: Option<String>,
    maintainer: Option<String>,
    dependencies: Vec<String>,
    build_dependencies: Vec<String>,
    before_precompile: Option<PathBuf>,
    compile_cache_dir: Option<PathBuf>,
    buildpack: Option<String>,
    env: Vec<String>,
    codename: Option<String>,
    auto: bool,
}

impl BuildConfigBuilder {
    /// Creates a new config builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the package name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the package version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the package iteration.
    ///
    /// Default: current UTC time as `%Y%m%d%H%M%S`
    pub fn iteration(mut self, iteration: impl Into<String>) -> Self {
        self.iteration = Some(iteration.into());
        self
    }

    /// Sets the target architecture.
    ///
    /// Default: host architecture
    pub fn architecture(mut self, arch: Arch) -> Self {
        self.architecture = Some(arch);
        self
    }

    /// Sets the homepage URL.
    pub fn homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = Some(homepage.into());
        self
    }

    /// Sets the package description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the package maintainer.
    pub fn maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.maintainer = Some(maintainer.into());
        self
    }

    /// Sets extra runtime dependencies.
    pub fn dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Sets extra build dependencies.
    pub fn build_dependencies(mut self, deps: Vec<String>) -> Self {
        self.build_dependencies = deps;
        self
    }

    /// Sets the before-precompile script.
    pub fn before_precompile<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.before_precompile = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the compile cache directory.
    pub fn compile_cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.compile_cache_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets a custom buildpack URI.
    pub fn buildpack(mut self, uri: impl Into<String>) -> Self {
        self.buildpack = Some(uri.into());
        self
    }

    /// Sets `KEY=VALUE` environment entries.
    pub fn env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// Sets the release codename.
    ///
    /// Default: `VERSION_CODENAME` from `/etc/os-release`, else [`DEFAULT_CODENAME`]
    pub fn codename(mut self, codename: impl Into<String>) -> Self {
        self.codename = Some(codename.into());
        self
    }

    /// Enables non-interactive installation of missing build dependencies.
    pub fn auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    /// Builds the config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::bundler::Error::InvalidConfig) when the homepage or buildpack is not a
    /// URL, or an env entry is not `KEY=VALUE`.
    pub fn build(self) -> Result<BuildConfig> {
        let iteration = self
            .iteration
            .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d%H%M%S").to_string());

        let config = BuildConfig {
            name: self.name,
            version: self.version,
            iteration,
            architecture: self.architecture.unwrap_or_default(),
            homepage: self.homepage,
            description: self.description,
            maintainer: self.maintainer,
            dependencies: self.dependencies,
            build_dependencies: self.build_dependencies,
            before_precompile: self.before_precompile,
            compile_cache_dir: self.compile_cache_dir,
            buildpack: self.buildpack,
            env: self.env,
            codename: self.codename.unwrap_or_else(detect_codename),
            auto: self.auto,
        };
        config.check_fields()?;
        Ok(config)
    }
}

/// Reads the release codename of the host from `/etc/os-release`.
pub fn detect_codename() -> String {
    std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|contents| parse_os_release_codename(&contents))
        .unwrap_or_else(|| DEFAULT_CODENAME.to_string())
}

fn parse_os_release_codename(contents: &str) -> Option<String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "VERSION_CODENAME")
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_defaults_to_timestamp() {
        let config = BuildConfigBuilder::new().codename("wheezy").build().unwrap();
        assert_eq!(config.iteration.len(), 14);
        assert!(config.iteration.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn rejects_malformed_env_and_urls() {
        let err = BuildConfigBuilder::new()
            .env(vec!["=oops".into()])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("KEY=VALUE"));
        assert!(
            BuildConfigBuilder::new()
                .env(vec!["PATH;reboot=1".into()])
                .build()
                .is_err()
        );

        assert!(BuildConfigBuilder::new().homepage("not a url").build().is_err());
        assert!(
            BuildConfigBuilder::new()
                .buildpack("https://github.com/heroku/heroku-buildpack-ruby.git#v250")
                .codename("wheezy")
                .build()
                .is_ok()
        );
    }

    #[test]
    fn reads_codename_from_os_release() {
        let contents = "NAME=\"Debian GNU/Linux\"\nVERSION_CODENAME=bookworm\nID=debian\n";
        assert_eq!(parse_os_release_codename(contents).as_deref(), Some("bookworm"));
        assert_eq!(parse_os_release_codename("ID=alpine\n"), None);
    }
}
