//! Project-level defaults from `.pkgr.toml`.
//!
//! A source tree may carry a `.pkgr.toml` next to its Procfile:
//!
//! ```toml
//! name = "my-app"
//! description = "My application"
//! homepage = "https://example.com"
//! dependencies = ["libpq5"]
//! build_dependencies = ["libpq-dev"]
//! env = ["RAILS_ENV=production"]
//! before_precompile = "script/before_precompile"
//! ```
//!
//! Values only fill fields the command line left unset.

use crate::bundler::{BuildConfig, Error, Result, error::ErrorExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up at the root of a directory input.
pub const PROJECT_FILE: &str = ".pkgr.toml";

/// Contents of `.pkgr.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Package name
    pub name: Option<String>,
    /// Package description
    pub description: Option<String>,
    /// Homepage URL
    pub homepage: Option<String>,
    /// Package maintainer
    pub maintainer: Option<String>,
    /// Runtime dependencies
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Build dependencies
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    /// `KEY=VALUE` environment entries
    #[serde(default)]
    pub env: Vec<String>,
    /// Custom buildpack URI
    pub buildpack: Option<String>,
    /// Script run before compilation, relative to the project root
    pub before_precompile: Option<PathBuf>,
}

impl ProjectConfig {
    /// Loads `<dir>/.pkgr.toml`; `None` when the file does not exist.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(PROJECT_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err::<Option<Self>, _>(e).fs_context("reading", &path),
        };

        toml::from_str(&contents)
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Fills unset fields of `config`; relative paths resolve against `root`.
    pub fn apply(self, config: &mut BuildConfig, root: &Path) -> Result<()> {
        fill(&mut config.name, self.name);
        fill(&mut config.description, self.description);
        fill(&mut config.homepage, self.homepage);
        fill(&mut config.maintainer, self.maintainer);
        fill(&mut config.buildpack, self.buildpack);
        fill(
            &mut config.before_precompile,
            self.before_precompile.map(|script| root.join(script)),
        );

        if config.dependencies.is_empty() {
            config.dependencies = self.dependencies;
        }
        if config.build_dependencies.is_empty() {
            config.build_dependencies = self.build_dependencies;
        }
        if config.env.is_empty() {
            config.env = self.env;
        }

        config.check_fields()
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::BuildConfigBuilder;

    #[test]
    fn fills_only_unset_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            "name = \"from-file\"\ndescription = \"From file\"\ndependencies = [\"libpq5\"]\nbefore_precompile = \"script/prep\"\n",
        )
        .unwrap();

        let mut config = BuildConfigBuilder::new()
            .name("from-cli")
            .codename("wheezy")
            .build()
            .unwrap();
        ProjectConfig::load(dir.path())
            .unwrap()
            .unwrap()
            .apply(&mut config, dir.path())
            .unwrap();

        assert_eq!(config.name.as_deref(), Some("from-cli"));
        assert_eq!(config.description.as_deref(), Some("From file"));
        assert_eq!(config.dependencies, ["libpq5"]);
        assert_eq!(config.before_precompile, Some(dir.path().join("script/prep")));
    }

    #[test]
    fn missing_file_is_none_and_bad_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectConfig::load(dir.path()).unwrap(), None);

        std::fs::write(dir.path().join(PROJECT_FILE), "env = [\"1BAD=x\"]\n").unwrap();
        let mut config = BuildConfigBuilder::new().codename("wheezy").build().unwrap();
        let project = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert!(project.apply(&mut config, dir.path()).is_err());

        std::fs::write(dir.path().join(PROJECT_FILE), "unknown = 1\n").unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
