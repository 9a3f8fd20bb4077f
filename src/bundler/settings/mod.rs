//! Configuration structures for packaging runs.
//!
//! [`BuildConfig`] is the single value object every stage reads from; it is
//! constructed through [`BuildConfigBuilder`] and completed during input
//! normalization.

mod arch;
mod builder;
mod config;

pub use arch::Arch;
pub use builder::{BuildConfigBuilder, DEFAULT_CODENAME, detect_codename};
pub use config::{BuildConfig, is_valid_package_name};
