//! Package assembly.
//!
//! Everything needed to turn a normalized build archive into a `.deb` on the
//! local host:
//!
//! - [`settings`] - the [`BuildConfig`] model and its builder
//! - [`template`] - declarative package-image entries and their renderer
//! - [`distribution`] - per-target policy ([`Debian`])
//! - [`builder`] - the [`Builder`] pipeline driving a profile to a package
//! - [`procfile`], [`buildpack`] - process definitions and compilation stages
//! - [`utils`] - file system and external command helpers

pub mod builder;
pub mod buildpack;
pub mod distribution;
pub mod error;
pub mod procfile;
pub mod settings;
pub mod template;
pub mod utils;

pub use builder::{BuildState, Builder, PackagedArtifact};
pub use distribution::{DataDir, Debian, DistributionProfile};
pub use error::{Error, Result};
pub use settings::{Arch, BuildConfig, BuildConfigBuilder};
