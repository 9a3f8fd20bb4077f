//! Command line argument parsing and validation.

use crate::{
    bundler::{Arch, BuildConfig, BuildConfigBuilder},
    error::CliError,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Debian package builder for application source trees
#[derive(Parser, Debug)]
#[command(
    name = "pkgr",
    version,
    about = "Builds Debian packages from application source trees",
    long_about = "Builds Debian packages from application source trees.

The input is archived, compiled with a buildpack and assembled into a .deb with
upstart services for every Procfile daemon. With --host the whole build runs on
a remote machine over ssh and the packages are copied back.

Usage:
  pkgr package ./my-app --version 1.2.0
  pkgr package ./my-app --host build@debian-wheezy
  cat my-app.tar.gz | pkgr package - --name my-app --version 1.2.0"
)]
pub struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Show debug logging and command lines
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a package from a directory, an archive, or `-` for stdin
    Package(PackageArgs),
}

/// Options of `pkgr package`.
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct PackageArgs {
    /// Application directory, `.tar.gz` archive, or `-` to read an archive from stdin
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Package name [default: input directory name]
    #[arg(long)]
    pub name: Option<String>,

    /// Package version [default: latest git tag]
    #[arg(long)]
    pub version: Option<String>,

    /// Package iteration [default: current UTC timestamp]
    #[arg(long)]
    pub iteration: Option<String>,

    /// Target architecture: amd64, i386, arm64, armhf [default: host]
    #[arg(long, value_name = "ARCH")]
    pub arch: Option<Arch>,

    /// Project homepage URL
    #[arg(long, value_name = "URL")]
    pub homepage: Option<String>,

    /// Package description
    #[arg(long)]
    pub description: Option<String>,

    /// Package maintainer
    #[arg(long)]
    pub maintainer: Option<String>,

    /// Extra runtime dependencies, comma separated
    #[arg(long, value_delimiter = ',', value_name = "PKG,...")]
    pub dependencies: Vec<String>,

    /// Extra build dependencies, comma separated
    #[arg(long, value_delimiter = ',', value_name = "PKG,...")]
    pub build_dependencies: Vec<String>,

    /// Script run in the application directory before compilation
    #[arg(long, value_name = "PATH")]
    pub before_precompile: Option<PathBuf>,

    /// Buildpack cache directory [default: <input>/.git/cache]
    #[arg(long, value_name = "PATH")]
    pub compile_cache_dir: Option<PathBuf>,

    /// Custom buildpack git URL, optionally suffixed with #ref
    #[arg(long, value_name = "URL")]
    pub buildpack: Option<String>,

    /// Environment entry for the installed application (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Target release codename [default: host's, else wheezy]
    #[arg(long)]
    pub codename: Option<String>,

    /// Install missing build dependencies without asking
    #[arg(long)]
    pub auto: bool,

    /// Build on this host over ssh instead of locally
    #[arg(long, value_name = "[USER@]HOST")]
    pub host: Option<String>,

    /// Let the remote host install missing build dependencies
    #[arg(long, requires = "host")]
    pub remote_auto: bool,

    /// Directory receiving the produced packages
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Directory holding distribution templates and dependency lists
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory caching buildpack checkouts
    #[arg(long, value_name = "DIR")]
    pub buildpack_cache: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl PackageArgs {
    /// Rejects flag combinations clap cannot express.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.auto && self.host.is_some() {
            return Err(CliError::ConflictingArguments {
                arguments: vec!["--auto".into(), "--host".into()],
                hint: "--auto applies to local builds; use --remote-auto to install build \
                       dependencies on the remote host"
                    .into(),
            });
        }
        Ok(())
    }

    /// Build configuration described by these flags.
    pub fn to_config(&self) -> crate::bundler::Result<BuildConfig> {
        let mut builder = BuildConfigBuilder::new()
            .dependencies(self.dependencies.clone())
            .build_dependencies(self.build_dependencies.clone())
            .env(self.env.clone())
            .auto(self.auto);

        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        if let Some(version) = &self.version {
            builder = builder.version(version);
        }
        if let Some(iteration) = &self.iteration {
            builder = builder.iteration(iteration);
        }
        if let Some(arch) = self.arch {
            builder = builder.architecture(arch);
        }
        if let Some(homepage) = &self.homepage {
            builder = builder.homepage(homepage);
        }
        if let Some(description) = &self.description {
            builder = builder.description(description);
        }
        if let Some(maintainer) = &self.maintainer {
            builder = builder.maintainer(maintainer);
        }
        if let Some(script) = &self.before_precompile {
            builder = builder.before_precompile(script);
        }
        if let Some(dir) = &self.compile_cache_dir {
            builder = builder.compile_cache_dir(dir);
        }
        if let Some(buildpack) = &self.buildpack {
            builder = builder.buildpack(buildpack);
        }
        if let Some(codename) = &self.codename {
            builder = builder.codename(codename);
        }

        builder.build()
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }
}
