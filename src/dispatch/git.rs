//! Version lookup from git tags.

use crate::bundler::{
    Error, Result,
    utils::ExternalCommand,
};
use regex::Regex;
use std::path::Path;

/// Most recent tag reachable from `HEAD` in `dir`, if any.
///
/// A directory outside a git checkout, a repository without tags, or a
/// missing `git` binary all yield `None`.
pub async fn latest_tag(dir: &Path) -> Result<Option<String>> {
    let describe = ExternalCommand::new("git")
        .args(["describe", "--tags", "--abbrev=0"])
        .current_dir(dir);

    match describe.stdout().await {
        Ok(stdout) => Ok(stdout
            .map(|out| out.trim().to_string())
            .filter(|tag| !tag.is_empty())),
        Err(Error::CommandFailed { error, .. }) => {
            log::debug!("git unavailable, skipping tag lookup: {}", error);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Strips a leading run of non-digit characters from `tag`.
///
/// `v2.3.1` becomes `2.3.1`; a tag with no digits at all is kept as is.
pub fn version_from_tag(tag: &str) -> Result<String> {
    let prefix = Regex::new(r"^\D+(\d.*)$")
        .map_err(|e| Error::GenericError(format!("invalid version pattern: {e}")))?;

    Ok(prefix
        .captures(tag)
        .and_then(|captures| captures.get(1))
        .map_or(tag, |version| version.as_str())
        .to_string())
}

/// Package version derived from the latest tag of `dir`.
pub async fn derived_version(dir: &Path) -> Result<Option<String>> {
    match latest_tag(dir).await? {
        Some(tag) => {
            let version = version_from_tag(&tag)?;
            log::info!("Using version {} from git tag {}", version, tag);
            Ok(Some(version))
        }
        None => Ok(None),
    }
}
