//! Debian package builder for application source trees.
//!
//! `pkgr` archives an application directory, compiles it with a buildpack,
//! renders service scripts for each Procfile daemon and hands the staged
//! tree to `fpm`. Builds run locally or on a remote host over ssh.
//!
//! The [`dispatch`] module is the entry point for library users; [`bundler`]
//! holds the build pipeline itself.

pub mod bundler;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod metadata;

pub use error::{CliError, PackagerError, Result};
