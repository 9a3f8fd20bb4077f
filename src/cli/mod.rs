//! Command line interface of `pkgr`.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, PackageArgs, RuntimeConfig};
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point; returns the process exit code.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(args.verbose, args.quiet);

    let runtime = RuntimeConfig::from(&args);
    match &args.command {
        Command::Package(package) => commands::package(package, &runtime).await,
    }
}

/// `RUST_LOG` wins over the default level picked by `--verbose`/`--quiet`.
fn init_logging(verbose: bool, quiet: bool) {
    let default_level = match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "info",
    };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .format_timestamp(None)
    .try_init();
}
