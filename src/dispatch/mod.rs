//! Build dispatch.
//!
//! The [`Dispatcher`] normalizes a [`BuildInput`] into a single archive,
//! completes the [`BuildConfig`] with derived defaults, then either builds
//! locally through a [`Builder`] or delegates to a remote host over ssh.

pub mod git;
pub mod input;
pub mod remote;

pub use input::BuildInput;
pub use remote::{RemoteHost, bootstrap_command};

use crate::{
    bundler::{
        BuildConfig, Builder, DataDir, Debian, Error, PackagedArtifact, Result,
        builder::LineSink,
        error::{Context, ErrorExt},
    },
    metadata::ProjectConfig,
};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Where and how a build is carried out.
#[derive(Clone, Debug)]
pub struct DispatchOptions {
    /// Build host; local build when unset
    pub host: Option<RemoteHost>,
    /// Let the remote peer install missing build dependencies
    pub remote_auto: bool,
    /// Directory receiving the packages
    pub output_dir: PathBuf,
    /// Static distribution assets; required for local builds
    pub data_dir: Option<DataDir>,
    /// Buildpack checkout cache; the user cache directory when unset
    pub buildpack_cache: Option<PathBuf>,
}

/// Packages produced by a dispatch.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Built on this host
    Local(PackagedArtifact),
    /// Built remotely and copied into the output directory
    Remote(Vec<PathBuf>),
}

impl DispatchOutcome {
    /// Paths of every produced package.
    pub fn packages(&self) -> Vec<&Path> {
        match self {
            DispatchOutcome::Local(artifact) => vec![artifact.path.as_path()],
            DispatchOutcome::Remote(paths) => paths.iter().map(PathBuf::as_path).collect(),
        }
    }
}

/// Normalized archive, owned when this process created it.
#[derive(Debug)]
enum Archive {
    Owned(TempPath),
    Borrowed(PathBuf),
}

impl Archive {
    fn path(&self) -> &Path {
        match self {
            Archive::Owned(temp) => temp,
            Archive::Borrowed(path) => path,
        }
    }
}

/// Runs one packaging request from input normalization to finished package.
///
/// The temporary archive created for directory or stdin inputs lives exactly
/// as long as the dispatcher.
#[derive(Debug)]
pub struct Dispatcher {
    input: BuildInput,
    config: BuildConfig,
    options: DispatchOptions,
    archive: Option<Archive>,
}

impl Dispatcher {
    /// Creates a dispatcher; nothing runs until [`Dispatcher::call`].
    pub fn new(input: BuildInput, config: BuildConfig, options: DispatchOptions) -> Self {
        Self {
            input,
            config,
            options,
            archive: None,
        }
    }

    /// Build configuration, complete once [`Dispatcher::setup`] has run.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Normalized archive, once [`Dispatcher::setup`] has run.
    pub fn archive_path(&self) -> Option<&Path> {
        self.archive.as_ref().map(Archive::path)
    }

    /// Whether the build is delegated to another host.
    pub fn is_remote(&self) -> bool {
        self.options.host.is_some()
    }

    /// Normalizes the input into an archive and makes configured paths
    /// absolute. Calling it again is a no-op.
    ///
    /// For archive and stdin inputs a relative before-precompile script is
    /// left relative: it names a file inside the archive.
    pub async fn setup(&mut self) -> Result<()> {
        if self.archive.is_some() {
            return Ok(());
        }

        let archive = match self.input.clone() {
            BuildInput::Directory(dir) => Archive::Owned(self.tarify(&dir).await?),
            BuildInput::Archive(path) => Archive::Borrowed(path),
            BuildInput::Stdin => Archive::Owned(input::read_stdin().await?),
        };

        let script = match self.input {
            BuildInput::Directory(_) => self.config.before_precompile.as_mut(),
            BuildInput::Archive(_) | BuildInput::Stdin => None,
        };
        for path in [script, self.config.compile_cache_dir.as_mut()]
            .into_iter()
            .flatten()
        {
            *path = path
                .absolutize()
                .fs_context("resolving path", &*path)?
                .into_owned();
        }

        self.archive = Some(archive);
        Ok(())
    }

    /// Archives `dir` and derives version, cache directory and name from it.
    pub async fn tarify(&mut self, dir: &Path) -> Result<TempPath> {
        if let Some(project) = ProjectConfig::load(dir)? {
            log::debug!("Applying project settings from {}", dir.display());
            project.apply(&mut self.config, dir)?;
        }

        let archive = input::tarify(dir).await?;

        if self.config.version.is_none() {
            self.config.version = git::derived_version(dir).await?;
        }
        if self.config.compile_cache_dir.is_none() {
            self.config.compile_cache_dir = Some(dir.join(".git").join("cache"));
        }
        self.config.default_name_from(dir);

        Ok(archive)
    }

    /// Sets up, then builds locally or on the remote host.
    pub async fn call(&mut self, on_line: LineSink<'_>) -> Result<DispatchOutcome> {
        self.setup().await?;
        let archive = self
            .archive_path()
            .map(Path::to_path_buf)
            .context("input was not normalized")?;

        match &self.options.host {
            Some(host) => {
                let peer_args = self.peer_args()?;
                host.package(&archive, &peer_args, on_line).await?;
                let packages = host.fetch_artifacts(&self.options.output_dir).await?;
                Ok(DispatchOutcome::Remote(packages))
            }
            None => {
                let data_dir = self.options.data_dir.as_ref().ok_or_else(|| {
                    Error::InvalidConfig(
                        "no data directory found; pass --data-dir or set PKGR_DATA_DIR".into(),
                    )
                })?;
                let profile = Debian::new(self.config.codename.clone(), data_dir);
                let mut builder = Builder::new(
                    profile,
                    self.config.clone(),
                    archive,
                    &self.options.output_dir,
                )?;
                if let Some(cache) = &self.options.buildpack_cache {
                    builder = builder.with_buildpack_cache(cache);
                }
                Ok(DispatchOutcome::Local(builder.call(on_line).await?))
            }
        }
    }

    /// Flags for the remote peer.
    ///
    /// The peer reads the archive from stdin, so a before-precompile script
    /// is forwarded as a path relative to the archive root.
    fn peer_args(&self) -> Result<Vec<String>> {
        let mut args = self.config.to_args();

        if let Some(script) = &self.config.before_precompile {
            let relative = match &self.input {
                BuildInput::Directory(dir) => script.strip_prefix(dir).ok(),
                BuildInput::Archive(_) | BuildInput::Stdin => {
                    script.is_relative().then_some(script.as_path())
                }
            }
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "before-precompile script {} is outside the application archive, \
                     so the remote host cannot run it",
                    script.display()
                ))
            })?;
            args.push("--before-precompile".into());
            args.push(relative.to_string_lossy().into_owned());
        }

        if self.options.remote_auto {
            args.push("--auto".into());
        }
        Ok(args)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::bundler::BuildConfigBuilder;

    fn options(host: Option<RemoteHost>) -> DispatchOptions {
        DispatchOptions {
            host,
            remote_auto: false,
            output_dir: std::env::temp_dir(),
            data_dir: Some(DataDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))),
            buildpack_cache: None,
        }
    }

    fn app_dir() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let app = root.path().join("My_App");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("Procfile"), "web: ./web\n").unwrap();
        root
    }

    #[tokio::test]
    async fn setup_derives_defaults_once() {
        let root = app_dir();
        let app = root.path().join("My_App");
        let config = BuildConfigBuilder::new()
            .compile_cache_dir("relative/cache")
            .codename("wheezy")
            .build()
            .unwrap();

        let mut dispatcher =
            Dispatcher::new(BuildInput::Directory(app.clone()), config, options(None));
        dispatcher.setup().await.unwrap();

        let archive = dispatcher.archive_path().unwrap().to_path_buf();
        assert!(archive.is_file());
        assert_eq!(dispatcher.config().name.as_deref(), Some("my-app"));
        assert_eq!(dispatcher.config().version, None);
        assert!(dispatcher.config().compile_cache_dir.as_ref().unwrap().is_absolute());

        dispatcher.setup().await.unwrap();
        assert_eq!(dispatcher.archive_path(), Some(archive.as_path()));

        drop(dispatcher);
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn cache_dir_defaults_inside_the_input() {
        let root = app_dir();
        let app = root.path().join("My_App");
        let config = BuildConfigBuilder::new().codename("wheezy").build().unwrap();

        let mut dispatcher =
            Dispatcher::new(BuildInput::Directory(app.clone()), config, options(None));
        dispatcher.setup().await.unwrap();

        assert_eq!(
            dispatcher.config().compile_cache_dir,
            Some(app.join(".git/cache"))
        );
    }

    #[tokio::test]
    async fn peer_receives_before_precompile_relative_to_the_archive() {
        let root = app_dir();
        let app = root.path().join("My_App");
        std::fs::create_dir_all(app.join("script")).unwrap();
        std::fs::write(app.join("script/prep"), "#!/bin/sh\n").unwrap();
        std::fs::write(
            app.join(crate::metadata::PROJECT_FILE),
            "before_precompile = \"script/prep\"\n",
        )
        .unwrap();

        let config = BuildConfigBuilder::new()
            .version("1.0.0")
            .codename("wheezy")
            .build()
            .unwrap();
        let mut remote = options(Some(RemoteHost::new("build01").unwrap()));
        remote.remote_auto = true;

        let mut dispatcher = Dispatcher::new(BuildInput::Directory(app), config, remote);
        dispatcher.setup().await.unwrap();
        let args = dispatcher.peer_args().unwrap();

        let pos = args.iter().position(|a| a == "--before-precompile").unwrap();
        assert_eq!(args[pos + 1], "script/prep");
        assert_eq!(args.last().map(String::as_str), Some("--auto"));
    }

    #[tokio::test]
    async fn script_outside_the_input_cannot_be_forwarded() {
        let root = app_dir();
        let config = BuildConfigBuilder::new()
            .version("1.0.0")
            .before_precompile(root.path().join("elsewhere.sh"))
            .codename("wheezy")
            .build()
            .unwrap();

        let mut dispatcher = Dispatcher::new(
            BuildInput::Directory(root.path().join("My_App")),
            config,
            options(Some(RemoteHost::new("build01").unwrap())),
        );
        dispatcher.setup().await.unwrap();
        assert!(matches!(dispatcher.peer_args(), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn stdin_keeps_relative_scripts_relative() {
        let config = BuildConfigBuilder::new()
            .version("1.0.0")
            .before_precompile("script/prep")
            .codename("wheezy")
            .build()
            .unwrap();
        let mut dispatcher = Dispatcher::new(
            BuildInput::Archive(PathBuf::from("/nonexistent/app.tar.gz")),
            config,
            options(Some(RemoteHost::new("build01").unwrap())),
        );
        dispatcher.setup().await.unwrap();

        assert_eq!(
            dispatcher.config().before_precompile,
            Some(PathBuf::from("script/prep"))
        );
        let args = dispatcher.peer_args().unwrap();
        assert!(args.windows(2).any(|w| w == ["--before-precompile", "script/prep"]));
    }

    #[tokio::test]
    async fn local_build_without_version_fails_before_packaging() {
        let root = app_dir();
        let config = BuildConfigBuilder::new().codename("wheezy").build().unwrap();

        let mut dispatcher = Dispatcher::new(
            BuildInput::Directory(root.path().join("My_App")),
            config,
            options(None),
        );
        let err = dispatcher.call(&|_, _| {}).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("version")));
    }
}
