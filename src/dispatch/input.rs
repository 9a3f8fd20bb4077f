//! Build input resolution and normalization to a single archive.

use crate::bundler::{
    Error, Result,
    builder::tool_detection,
    error::{ErrorExt, status_code},
    utils::ExternalCommand,
};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Directories left out of archived inputs.
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".svn"];

/// Where the source to package comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildInput {
    /// An application source tree
    Directory(PathBuf),
    /// A gzipped tarball of the source tree
    Archive(PathBuf),
    /// A gzipped tarball read from standard input
    Stdin,
}

impl BuildInput {
    /// Classifies `raw`: `-` is stdin, otherwise an existing directory or file.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == "-" {
            return Ok(BuildInput::Stdin);
        }

        let path = Path::new(raw)
            .absolutize()
            .fs_context("resolving input path", raw)?
            .into_owned();

        if path.is_dir() {
            Ok(BuildInput::Directory(path))
        } else if path.is_file() {
            Ok(BuildInput::Archive(path))
        } else {
            Err(Error::InvalidConfig(format!(
                "input {} is neither a directory nor an archive",
                path.display()
            )))
        }
    }

    /// Filesystem path of the input, if it has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            BuildInput::Directory(path) | BuildInput::Archive(path) => Some(path),
            BuildInput::Stdin => None,
        }
    }

    /// Whether the input still needs archiving.
    pub fn is_directory(&self) -> bool {
        matches!(self, BuildInput::Directory(_))
    }
}

fn temp_archive() -> Result<TempPath> {
    Ok(tempfile::Builder::new()
        .prefix("pkgr-tarball-")
        .suffix(".tar.gz")
        .tempfile()
        .fs_context("creating temporary archive in", std::env::temp_dir())?
        .into_temp_path())
}

/// Compresses the contents of `dir` into a temporary `.tar.gz`.
///
/// Version-control metadata is excluded. The archive is deleted when the
/// returned path is dropped.
pub async fn tarify(dir: &Path) -> Result<TempPath> {
    tool_detection::require("tar")?;
    let archive = temp_archive()?;

    let mut tar = ExternalCommand::new("tar").arg("czf").arg(&*archive);
    for excluded in EXCLUDED_DIRS {
        tar = tar.arg("--exclude").arg(excluded);
    }
    let status = tar.arg("-C").arg(dir).arg(".").status().await?;

    if !status.success() {
        return Err(Error::InputNormalization {
            path: dir.display().to_string(),
            status: status_code(&status),
        });
    }

    log::debug!("Archived {} to {}", dir.display(), archive.display());
    Ok(archive)
}

/// Copies standard input into a temporary `.tar.gz`.
pub async fn read_stdin() -> Result<TempPath> {
    let archive = temp_archive()?;
    let mut file = tokio::fs::File::create(&archive)
        .await
        .fs_context("creating", &*archive)?;

    let copied = tokio::io::copy(&mut tokio::io::stdin(), &mut file)
        .await
        .fs_context("writing standard input to", &*archive)?;
    file.sync_all().await.fs_context("flushing", &*archive)?;

    if copied == 0 {
        return Err(Error::InvalidConfig(
            "no archive received on standard input".into(),
        ));
    }

    log::debug!("Received {} bytes of input on stdin", copied);
    Ok(archive)
}
