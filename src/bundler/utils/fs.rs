//! File system utilities for staging package images.
//!
//! Provides idempotent directory creation and file writes with explicit
//! permission modes.

use crate::bundler::error::{ErrorExt, Result};
use std::{io, path::Path};
use tokio::{fs, io::AsyncWriteExt};

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        // Try removal, ignore NotFound (idempotent)
        match fs::remove_dir_all(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err::<(), _>(e).fs_context("removing directory", path),
        }
    }

    // create_dir_all is already idempotent - succeeds even if dir exists
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Writes `contents` to `path`, creating parent directories, then applies `mode`.
pub async fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating parent directory", parent)?;
    }

    let mut file = fs::File::create(path)
        .await
        .fs_context("creating file", path)?;
    file.write_all(contents)
        .await
        .fs_context("writing file", path)?;
    file.flush().await.fs_context("flushing file", path)?;

    set_mode(path, mode).await
}

/// Sets Unix permission bits on `path`.
#[cfg(unix)]
pub async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .fs_context("setting permissions on", path)
}

/// Permission bits are not applicable on this platform.
#[cfg(not(unix))]
pub async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_file_creates_parents_and_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("usr/local/bin/app");

        write_file(&target, b"#!/bin/sh\n", 0o755).await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "#!/bin/sh\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn create_dir_all_erases_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        write_file(&staging.join("stale"), b"x", 0o644).await.unwrap();

        create_dir_all(&staging, true).await.unwrap();

        assert!(staging.is_dir());
        assert!(!staging.join("stale").exists());
    }
}
