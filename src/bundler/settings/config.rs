//! The build configuration shared by every stage of a packaging run.

use super::Arch;
use crate::bundler::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Build parameters for one packaging run.
///
/// Constructed once from user options via [`BuildConfigBuilder`], completed
/// during input normalization (derived name, version and cache directory),
/// and read-only once a build starts.
///
/// [`BuildConfigBuilder`]: super::BuildConfigBuilder
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildConfig {
    /// Package name. Derived from the input directory when unset.
    pub name: Option<String>,

    /// Package version. Derived from the latest git tag when unset.
    pub version: Option<String>,

    /// Package iteration (Debian revision).
    pub iteration: String,

    /// Target architecture.
    pub architecture: Arch,

    /// Homepage URL recorded in the package metadata.
    pub homepage: Option<String>,

    /// Package description.
    pub description: Option<String>,

    /// Package maintainer.
    pub maintainer: Option<String>,

    /// Runtime dependencies added on top of the distribution defaults.
    pub dependencies: Vec<String>,

    /// Build dependencies added on top of the distribution defaults.
    pub build_dependencies: Vec<String>,

    /// Script run inside the application directory before compilation.
    pub before_precompile: Option<PathBuf>,

    /// Cache directory handed to buildpacks between runs.
    pub compile_cache_dir: Option<PathBuf>,

    /// Custom buildpack URI, optionally suffixed with `#ref`.
    pub buildpack: Option<String>,

    /// `KEY=VALUE` pairs written to the environment defaults file.
    pub env: Vec<String>,

    /// Release codename of the target distribution (e.g. `wheezy`).
    pub codename: String,

    /// Install missing build dependencies without asking.
    pub auto: bool,
}

impl BuildConfig {
    /// Package name, failing if it has not been set or derived.
    pub fn name(&self) -> Result<&str> {
        non_empty(self.name.as_deref())
            .ok_or_else(|| Error::InvalidConfig("package name is missing".into()))
    }

    /// Package version, failing if it has not been set or derived.
    pub fn version(&self) -> Result<&str> {
        non_empty(self.version.as_deref()).ok_or_else(|| {
            Error::InvalidConfig(
                "package version is missing: no git tag found, pass --version explicitly".into(),
            )
        })
    }

    /// Package name, failing unless it is a valid Debian package name.
    ///
    /// Every template context goes through this check, so rendered scripts
    /// can interpolate the name unquoted.
    pub fn package_name(&self) -> Result<&str> {
        let name = self.name()?;
        if is_valid_package_name(name) {
            Ok(name)
        } else {
            Err(invalid_name(name))
        }
    }

    /// Installation directory of the application on the target host.
    pub fn home(&self) -> Result<String> {
        Ok(format!("/opt/{}", self.package_name()?))
    }

    /// Checks the invariants that must hold once a build starts.
    ///
    /// Name and version are non-empty, the name is a valid Debian package
    /// name, and the cache directory is absolute. A relative
    /// `before_precompile` names a script inside the application archive.
    pub fn validate(&self) -> Result<()> {
        self.package_name()?;
        self.version()?;

        if let Some(path) = self.compile_cache_dir.as_ref().filter(|p| !p.is_absolute()) {
            return Err(Error::InvalidConfig(format!(
                "path must be absolute once normalized: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Checks user-supplied fields: the name follows Debian policy, homepage
    /// and buildpack are URLs, env entries are `KEY=VALUE` with KEY a shell
    /// identifier.
    pub fn check_fields(&self) -> Result<()> {
        if let Some(name) =
            non_empty(self.name.as_deref()).filter(|name| !is_valid_package_name(name))
        {
            return Err(invalid_name(name));
        }

        if let Some(homepage) = &self.homepage {
            url::Url::parse(homepage).map_err(|e| {
                Error::InvalidConfig(format!("homepage '{}' is not a URL: {}", homepage, e))
            })?;
        }

        if let Some(buildpack) = &self.buildpack {
            let base = buildpack.split('#').next().unwrap_or(buildpack);
            url::Url::parse(base).map_err(|e| {
                Error::InvalidConfig(format!("buildpack '{}' is not a URI: {}", buildpack, e))
            })?;
        }

        if let Some(bad) = self
            .env
            .iter()
            .find(|entry| !matches!(entry.split_once('='), Some((key, _)) if is_env_key(key)))
        {
            return Err(Error::InvalidConfig(format!(
                "env entry '{}' must have the form KEY=VALUE with KEY a shell identifier",
                bad
            )));
        }

        Ok(())
    }

    /// Renders this configuration as the flag set understood by `pkgr package`.
    ///
    /// `auto` is deliberately not part of the forwarded set; the dispatcher
    /// appends it only when remote auto-install was requested separately.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        let mut push = |flag: &str, value: String| {
            args.push(format!("--{flag}"));
            args.push(value);
        };

        if let Some(name) = &self.name {
            push("name", name.clone());
        }
        if let Some(version) = &self.version {
            push("version", version.clone());
        }
        push("iteration", self.iteration.clone());
        push("arch", self.architecture.to_string());
        if let Some(homepage) = &self.homepage {
            push("homepage", homepage.clone());
        }
        if let Some(description) = &self.description {
            push("description", description.clone());
        }
        if let Some(maintainer) = &self.maintainer {
            push("maintainer", maintainer.clone());
        }
        if !self.dependencies.is_empty() {
            push("dependencies", self.dependencies.join(","));
        }
        if !self.build_dependencies.is_empty() {
            push("build-dependencies", self.build_dependencies.join(","));
        }
        if let Some(buildpack) = &self.buildpack {
            push("buildpack", buildpack.clone());
        }
        for entry in &self.env {
            push("env", entry.clone());
        }
        push("codename", self.codename.clone());

        args
    }

    /// Key/value context used to render templates.
    pub fn template_context(&self) -> Result<serde_json::Value> {
        let mut context = serde_json::to_value(self)
            .map_err(|e| Error::GenericError(format!("failed to serialize config: {e}")))?;

        if let serde_json::Value::Object(map) = &mut context {
            map.insert("home".into(), self.home()?.into());
            map.insert(
                "env_vars".into(),
                self.env
                    .iter()
                    .filter_map(|entry| entry.split_once('='))
                    .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
                    .collect::<Vec<_>>()
                    .into(),
            );
        }

        Ok(context)
    }

    /// Fills `name` from the basename of `dir` when unset.
    pub(crate) fn default_name_from(&mut self, dir: &Path) {
        if non_empty(self.name.as_deref()).is_none() {
            self.name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase().replace('_', "-"));
        }
    }
}

fn is_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid_name(name: &str) -> Error {
    Error::InvalidConfig(format!(
        "'{}' is not a valid package name (lowercase letters, digits, '+', '-' and '.', \
         at least two characters, starting with a letter or digit)",
        name
    ))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Debian policy: lowercase alphanumerics plus `+ - .`, starting alphanumeric.
pub fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() >= 2
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::BuildConfigBuilder;

    fn config() -> BuildConfig {
        BuildConfigBuilder::new()
            .name("my-app")
            .version("1.2.0")
            .iteration("20240101000000")
            .codename("wheezy")
            .build()
            .unwrap()
    }

    #[test]
    fn validate_rejects_missing_version() {
        let mut cfg = config();
        cfg.version = Some(String::new());
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_relative_cache_dir() {
        let mut cfg = config();
        cfg.compile_cache_dir = Some(PathBuf::from("relative/cache"));
        assert!(cfg.validate().is_err());

        cfg.compile_cache_dir = None;
        cfg.before_precompile = Some(PathBuf::from("script/prep"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unsafe_names_never_reach_a_template_context() {
        let mut cfg = config();
        cfg.name = Some("app;touch /tmp/owned".into());
        assert!(matches!(cfg.template_context(), Err(Error::InvalidConfig(_))));
        assert!(cfg.check_fields().is_err());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn package_names_follow_debian_policy() {
        assert!(is_valid_package_name("my-app"));
        assert!(is_valid_package_name("libfoo2.0+dfsg"));
        assert!(!is_valid_package_name("My App"));
        assert!(!is_valid_package_name("a"));
        assert!(!is_valid_package_name("-app"));
        assert!(!is_valid_package_name("app;rm"));
    }

    #[test]
    fn default_name_uses_directory_basename() {
        let mut cfg = config();
        cfg.name = None;
        cfg.default_name_from(Path::new("/srv/src/My_Service"));
        assert_eq!(cfg.name.as_deref(), Some("my-service"));

        cfg.default_name_from(Path::new("/srv/src/other"));
        assert_eq!(cfg.name.as_deref(), Some("my-service"));
    }

    #[test]
    fn to_args_never_forwards_auto() {
        let mut cfg = config();
        cfg.auto = true;
        cfg.dependencies = vec!["libpq5".into(), "curl".into()];
        let args = cfg.to_args();
        assert!(!args.iter().any(|a| a == "--auto"));
        let pos = args.iter().position(|a| a == "--dependencies").unwrap();
        assert_eq!(args[pos + 1], "libpq5,curl");
    }

    #[test]
    fn template_context_exposes_home_and_env() {
        let mut cfg = config();
        cfg.env = vec!["PORT=5000".into(), "RAILS_ENV=production".into()];
        let ctx = cfg.template_context().unwrap();
        assert_eq!(ctx["home"], "/opt/my-app");
        assert_eq!(ctx["env_vars"][0]["key"], "PORT");
        assert_eq!(ctx["env_vars"][1]["value"], "production");
    }
}
