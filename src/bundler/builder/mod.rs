//! Local package builds.
//!
//! - [`orchestrator`] - the [`Builder`] pipeline and its [`BuildState`]s
//! - [`checksum`] - SHA-256 of produced packages
//! - [`tool_detection`] - `PATH` lookup of external tools

mod checksum;
mod orchestrator;
pub mod tool_detection;

pub use checksum::calculate_sha256;
pub use orchestrator::{BuildState, Builder, LineSink, PackagedArtifact, SCALING_DIR};
