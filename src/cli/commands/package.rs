//! `pkgr package`: normalize the input, then build locally or remotely.

use crate::{
    bundler::DataDir,
    cli::{PackageArgs, RuntimeConfig},
    dispatch::{BuildInput, DispatchOptions, DispatchOutcome, Dispatcher, RemoteHost},
    error::{CliError, Result},
};
use anyhow::Context;
use std::io::IsTerminal;

/// Runs a packaging request and returns the process exit code.
pub async fn execute(args: &PackageArgs, runtime: &RuntimeConfig) -> Result<i32> {
    args.validate()?;

    let input = BuildInput::parse(&args.input)?;
    if input == BuildInput::Stdin && std::io::stdin().is_terminal() {
        return Err(CliError::InvalidArguments {
            reason: "input `-` expects a .tar.gz archive piped on standard input".into(),
        }
        .into());
    }

    let config = args.to_config()?;
    let host = args.host.as_deref().map(RemoteHost::new).transpose()?;

    let data_dir = match DataDir::resolve(args.data_dir.clone()) {
        Ok(dir) => Some(dir),
        Err(e) if host.is_some() => {
            log::debug!("No local data directory needed for a remote build: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let options = DispatchOptions {
        host,
        remote_auto: args.remote_auto,
        output_dir: args.output_dir.clone(),
        data_dir,
        buildpack_cache: args.buildpack_cache.clone(),
    };

    let mut dispatcher = Dispatcher::new(input, config, options);
    dispatcher.setup().await?;

    let target = match &args.host {
        Some(host) if dispatcher.is_remote() => format!("on {host}"),
        _ => "locally".to_string(),
    };
    let config = dispatcher.config();
    runtime
        .progress(&format!(
            "Packaging {} {} {}",
            config.name.as_deref().unwrap_or("<unnamed>"),
            config.version.as_deref().unwrap_or("<no version>"),
            target
        ))
        .context("failed to write progress")?;

    let output = runtime.output();
    let outcome = dispatcher
        .call(&|stream, line| {
            let _ = output.child_line(stream, line);
        })
        .await?;

    match &outcome {
        DispatchOutcome::Local(artifact) => {
            for warning in &artifact.warnings {
                runtime
                    .output()
                    .warn(warning)
                    .context("failed to write summary")?;
            }
            runtime
                .success(&format!(
                    "Created {} ({} bytes)",
                    artifact.path.display(),
                    artifact.size
                ))
                .context("failed to write summary")?;
            runtime
                .verbose_println(&format!("SHA256: {}", artifact.checksum))
                .context("failed to write summary")?;
        }
        DispatchOutcome::Remote(packages) => {
            if packages.is_empty() {
                runtime
                    .output()
                    .warn(&format!(
                        "no packages found in {}",
                        args.output_dir.display()
                    ))
                    .context("failed to write summary")?;
            }
            for package in outcome.packages() {
                runtime
                    .success(&format!("Fetched {}", package.display()))
                    .context("failed to write summary")?;
            }
        }
    }

    Ok(0)
}
