//! Declarative package-image content.
//!
//! A [`TemplateEntry`] is either a directory or a file whose content comes
//! from a handlebars template evaluated against the build configuration.
//! Entries are materialized in order under a staging root; profiles list
//! directories before the files that live inside them.

mod renderer;

pub use renderer::TemplateRenderer;

use crate::bundler::{error::Result, utils::fs};
use std::path::{Path, PathBuf};

/// Default permission bits of staged files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Where a file entry's content comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    /// Template text held in memory.
    Inline(String),
    /// Template file on disk, usually under the data directory.
    File(PathBuf),
}

/// A unit of package-image content, relative to the staging root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateEntry {
    /// A directory to create.
    Directory {
        /// Path relative to the staging root
        path: PathBuf,
    },
    /// A file rendered from a template.
    File {
        /// Path relative to the staging root
        path: PathBuf,
        /// Template to render
        source: TemplateSource,
        /// Permission bits of the written file
        mode: u32,
    },
}

impl TemplateEntry {
    /// Directory entry.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        TemplateEntry::Directory { path: path.into() }
    }

    /// File entry with [`DEFAULT_FILE_MODE`].
    pub fn file(path: impl Into<PathBuf>, source: TemplateSource) -> Self {
        TemplateEntry::File {
            path: path.into(),
            source,
            mode: DEFAULT_FILE_MODE,
        }
    }

    /// Overrides the mode of a file entry; directories are returned unchanged.
    pub fn with_mode(self, new_mode: u32) -> Self {
        match self {
            TemplateEntry::File { path, source, .. } => TemplateEntry::File {
                path,
                source,
                mode: new_mode,
            },
            dir => dir,
        }
    }

    /// Path relative to the staging root.
    pub fn path(&self) -> &Path {
        match self {
            TemplateEntry::Directory { path } | TemplateEntry::File { path, .. } => path,
        }
    }

    /// Whether this is a directory entry.
    pub fn is_dir(&self) -> bool {
        matches!(self, TemplateEntry::Directory { .. })
    }

    /// Materializes the entry under `root` and returns the written path.
    pub async fn install(
        &self,
        root: &Path,
        renderer: &TemplateRenderer,
        context: &serde_json::Value,
    ) -> Result<PathBuf> {
        let target = root.join(self.path());

        match self {
            TemplateEntry::Directory { .. } => {
                fs::create_dir_all(&target, false).await?;
            }
            TemplateEntry::File { source, mode, .. } => {
                let rendered = renderer.render_source(source, context).await?;
                fs::write_file(&target, rendered.as_bytes(), *mode).await?;
            }
        }

        log::debug!("Staged {}", target.display());
        Ok(target)
    }
}

/// Checks that every directory entry precedes the files placed beneath it.
pub fn directories_precede_files(entries: &[TemplateEntry]) -> bool {
    entries.iter().enumerate().all(|(index, entry)| {
        entry.is_dir()
            || entries[index..]
                .iter()
                .filter(|later| later.is_dir())
                .all(|dir| !entry.path().starts_with(dir.path()))
    })
}

/// Materializes all `entries` under `root`, in order.
pub async fn install_all(
    entries: &[TemplateEntry],
    root: &Path,
    renderer: &TemplateRenderer,
    context: &serde_json::Value,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(entries.len());
    for entry in entries {
        written.push(entry.install(root, renderer, context).await?);
    }
    Ok(written)
}
