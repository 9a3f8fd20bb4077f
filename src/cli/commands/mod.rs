//! Subcommand implementations.

mod package;

pub use package::execute as package;
