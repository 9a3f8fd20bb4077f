//! Shared helpers for staging files and running external commands.

pub mod command;
pub mod fs;
pub mod shell;

pub use command::{ExternalCommand, OutputStream, StreamedRun};
