//! Buildpack identifiers and their execution stages.
//!
//! A distribution profile only resolves *which* buildpacks apply; cloning and
//! running their `bin/detect` and `bin/compile` scripts happens here, during
//! the local build.

use crate::bundler::{
    error::{Error, Result, status_code},
    utils::{ExternalCommand, OutputStream},
};
use sha1::{Digest, Sha1};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

/// How a buildpack was selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildpackKind {
    /// Part of the distribution's default list
    Builtin,
    /// Supplied by the user
    Custom,
}

/// A buildpack source location, optionally pinned to a git ref with `#ref`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Buildpack {
    uri: String,
    kind: BuildpackKind,
}

impl Buildpack {
    /// Creates a buildpack identifier.
    pub fn new(uri: impl Into<String>, kind: BuildpackKind) -> Self {
        Self {
            uri: uri.into(),
            kind,
        }
    }

    /// Full URI as given, including any `#ref`.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Repository URL without the ref suffix.
    pub fn url(&self) -> &str {
        self.uri.split_once('#').map_or(&self.uri, |(url, _)| url)
    }

    /// Git ref to check out, if pinned.
    pub fn git_ref(&self) -> Option<&str> {
        self.uri
            .split_once('#')
            .map(|(_, r)| r)
            .filter(|r| !r.is_empty())
    }

    /// How this buildpack was selected.
    pub fn kind(&self) -> BuildpackKind {
        self.kind
    }

    /// Checkout directory under `cache_root`, keyed by the SHA-1 of the URI.
    pub fn dir(&self, cache_root: &Path) -> PathBuf {
        cache_root.join(hex::encode(Sha1::digest(self.uri.as_bytes())))
    }

    /// Clones the buildpack into the cache unless already present.
    pub async fn setup(&self, cache_root: &Path) -> Result<PathBuf> {
        let dir = self.dir(cache_root);
        if dir.join("bin").is_dir() {
            log::debug!("Reusing buildpack checkout {}", dir.display());
            return Ok(dir);
        }

        tokio::fs::create_dir_all(cache_root).await?;

        let mut clone = ExternalCommand::new("git").args(["clone", "--depth", "1"]);
        if let Some(git_ref) = self.git_ref() {
            clone = clone.arg("--branch").arg(git_ref);
        }
        let status = clone.arg(self.url()).arg(&dir).status().await?;

        if !status.success() {
            return Err(self.stage_error("setup", status_code(&status)));
        }

        Ok(dir)
    }

    /// Runs `bin/detect`; a zero exit means the buildpack applies.
    pub async fn detect(&self, dir: &Path, app_dir: &Path) -> Result<bool> {
        ExternalCommand::new(dir.join("bin/detect"))
            .arg(app_dir)
            .succeeds()
            .await
    }

    /// Runs `bin/compile`, streaming its output line by line.
    pub async fn compile(
        &self,
        dir: &Path,
        app_dir: &Path,
        cache_dir: &Path,
        on_line: &(dyn Fn(OutputStream, &str) + Sync),
    ) -> Result<()> {
        tokio::fs::create_dir_all(cache_dir).await?;

        let run = ExternalCommand::new(dir.join("bin/compile"))
            .arg(app_dir)
            .arg(cache_dir)
            .current_dir(app_dir)
            .run_streaming(Stdio::null(), on_line)
            .await?;

        if run.status.success() {
            Ok(())
        } else {
            Err(self.stage_error("compile", status_code(&run.status)))
        }
    }

    fn stage_error(&self, stage: &str, status: i32) -> Error {
        Error::BuildpackFailed {
            buildpack: self.uri.clone(),
            stage: stage.to_string(),
            status,
        }
    }
}

/// Default cache root for buildpack checkouts.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pkgr")
        .join("buildpacks")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_url_and_ref() {
        let pinned = Buildpack::new(
            "https://github.com/heroku/heroku-buildpack-ruby.git#v250",
            BuildpackKind::Custom,
        );
        assert_eq!(pinned.url(), "https://github.com/heroku/heroku-buildpack-ruby.git");
        assert_eq!(pinned.git_ref(), Some("v250"));

        let plain = Buildpack::new("https://example.com/bp.git", BuildpackKind::Builtin);
        assert_eq!(plain.url(), "https://example.com/bp.git");
        assert_eq!(plain.git_ref(), None);
    }

    #[test]
    fn checkout_dir_is_stable_per_uri() {
        let root = Path::new("/var/cache/pkgr");
        let a = Buildpack::new("https://example.com/a.git", BuildpackKind::Builtin);
        let b = Buildpack::new("https://example.com/a.git#main", BuildpackKind::Builtin);
        assert_eq!(a.dir(root), a.dir(root));
        assert_ne!(a.dir(root), b.dir(root));
        assert_eq!(a.dir(root).file_name().unwrap().len(), 40);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn detect_and_compile_run_buildpack_scripts() {
        use std::os::unix::fs::PermissionsExt;

        let pack = tempfile::tempdir().unwrap();
        let app = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let bin = pack.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        for (script, body) in [
            ("detect", "#!/bin/sh\ntest -f \"$1/Gemfile\"\n"),
            ("compile", "#!/bin/sh\necho compiled > \"$1/.compiled\"\n"),
        ] {
            let path = bin.join(script);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let buildpack = Buildpack::new("https://example.com/ruby.git", BuildpackKind::Builtin);
        assert!(!buildpack.detect(pack.path(), app.path()).await.unwrap());

        std::fs::write(app.path().join("Gemfile"), "").unwrap();
        assert!(buildpack.detect(pack.path(), app.path()).await.unwrap());

        buildpack
            .compile(pack.path(), app.path(), &cache.path().join("ruby"), &|_, _| {})
            .await
            .unwrap();
        assert!(app.path().join(".compiled").exists());
    }
}
