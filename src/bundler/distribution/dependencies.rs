//! Dependency lists keyed by `default` and release codename.

use crate::bundler::error::{ErrorExt, Result};
use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

/// A static dependency document, e.g. `dependencies.toml`:
///
/// ```toml
/// default = ["curl"]
/// wheezy = ["libssl1.0.0", "libpq5"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct DependencyLists(BTreeMap<String, Vec<String>>);

impl DependencyLists {
    /// Key holding the distribution-wide list.
    pub const DEFAULT_KEY: &'static str = "default";

    /// Loads a dependency document.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).fs_context("reading dependency list", path)?;
        Self::parse(&contents)
    }

    /// Parses a dependency document.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// List stored under `key`, empty when absent.
    pub fn get(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolves `extra`, then the default list, then the `codename` list.
    pub fn resolve(&self, codename: &str, extra: &[String]) -> Vec<String> {
        union(&[extra, self.get(Self::DEFAULT_KEY), self.get(codename)])
    }
}

/// Concatenates `lists`, keeping only the first occurrence of each entry.
pub fn union(lists: &[&[String]]) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .iter()
        .flat_map(|list| list.iter())
        .filter(|item| seen.insert(item.as_str()))
        .cloned()
        .collect()
}
