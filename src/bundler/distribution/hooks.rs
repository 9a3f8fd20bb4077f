//! Package install hooks, rendered once per build.

use crate::bundler::{
    error::{ErrorExt, Result},
    utils::fs,
};
use std::{collections::HashMap, future::Future, path::PathBuf};
use tempfile::TempPath;
use tokio::sync::Mutex;

/// Which maintainer script a hook is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs before the package's files are unpacked
    Preinstall,
    /// Runs after the package's files are unpacked
    Postinstall,
}

impl HookKind {
    /// Template file name under the distribution's `hooks/` directory.
    pub fn file_name(self) -> &'static str {
        match self {
            HookKind::Preinstall => "preinstall.sh",
            HookKind::Postinstall => "postinstall.sh",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            HookKind::Preinstall => "pkgr-preinstall-",
            HookKind::Postinstall => "pkgr-postinstall-",
        }
    }
}

/// Rendered hook scripts, one temp file per kind.
///
/// The files live as long as the cache and are removed when it is dropped.
#[derive(Debug, Default)]
pub struct HookCache {
    rendered: Mutex<HashMap<HookKind, TempPath>>,
}

impl HookCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the hook file for `kind`, rendering it with `render` on first use.
    ///
    /// Later calls return the same path without invoking `render`.
    pub async fn get_or_render<F, Fut>(&self, kind: HookKind, render: F) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let mut rendered = self.rendered.lock().await;
        if let Some(path) = rendered.get(&kind) {
            return Ok(path.to_path_buf());
        }

        let script = render().await?;
        let temp = tempfile::Builder::new()
            .prefix(kind.prefix())
            .suffix(".sh")
            .tempfile()
            .fs_context("creating hook file", std::env::temp_dir())?
            .into_temp_path();
        fs::write_file(&temp, script.as_bytes(), 0o755).await?;

        log::debug!("Rendered {} to {}", kind.file_name(), temp.display());
        let path = temp.to_path_buf();
        rendered.insert(kind, temp);
        Ok(path)
    }
}
