//! `pkgr` binary.

use pkgr::cli::{self, OutputManager};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            if OutputManager::new(false, false).error(&e.to_string()).is_err() {
                eprintln!("Error: {e}");
            }
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
