//! Local build pipeline.
//!
//! The [`Builder`] drives one [`DistributionProfile`] from a normalized input
//! archive to a finished package, in a private staging tree.

use crate::{
    bail,
    bundler::{
        Result,
        buildpack::{self, Buildpack, BuildpackKind},
        distribution::DistributionProfile,
        error::{Context, Error, ErrorExt, status_code},
        procfile,
        settings::BuildConfig,
        template::{self, directories_precede_files},
        utils::{ExternalCommand, OutputStream, fs},
    },
};
use std::{
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
};

use super::{
    checksum::calculate_sha256,
    tool_detection::{self, FPM_VERSION},
};

/// Directory under the application home holding per-process service templates.
pub const SCALING_DIR: &str = "vendor/pkgr/scaling";

/// Line sink for streamed child output.
pub type LineSink<'a> = &'a (dyn Fn(OutputStream, &str) + Sync);

/// Progress of one build. Stages are entered strictly in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
    /// Nothing done yet
    Uninitialized,
    /// Package image materialized from the template set
    TemplatesResolved,
    /// Build dependencies verified or installed
    DependenciesChecked,
    /// Install hooks rendered
    HooksRendered,
    /// Package builder exited zero
    BuilderInvoked,
    /// Package located and measured
    Packaged,
    /// A stage failed
    Failed,
}

impl BuildState {
    /// The state that must follow this one, if any.
    pub fn next(self) -> Option<BuildState> {
        match self {
            BuildState::Uninitialized => Some(BuildState::TemplatesResolved),
            BuildState::TemplatesResolved => Some(BuildState::DependenciesChecked),
            BuildState::DependenciesChecked => Some(BuildState::HooksRendered),
            BuildState::HooksRendered => Some(BuildState::BuilderInvoked),
            BuildState::BuilderInvoked => Some(BuildState::Packaged),
            BuildState::Packaged | BuildState::Failed => None,
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A package produced by a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackagedArtifact {
    /// Path of the package file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Hex SHA-256 of the file
    pub checksum: String,
    /// Problems that did not stop the build, such as uninstalled build
    /// dependencies
    pub warnings: Vec<String>,
}

/// Builds one package from an input archive.
///
/// # Examples
///
/// ```no_run
/// use pkgr::bundler::{BuildConfigBuilder, Builder, DataDir, Debian};
///
/// # async fn example() -> pkgr::bundler::Result<()> {
/// let config = BuildConfigBuilder::new()
///     .name("my-app")
///     .version("1.0.0")
///     .codename("wheezy")
///     .build()?;
/// let data = DataDir::resolve(None)?;
/// let profile = Debian::new(config.codename.clone(), &data);
///
/// let mut builder = Builder::new(profile, config, "my-app.tar.gz", ".")?;
/// let artifact = builder.call(&|_, line| println!("{line}")).await?;
/// println!("{} ({} bytes)", artifact.path.display(), artifact.size);
/// # Ok(())
/// # }
/// ```
pub struct Builder<D> {
    profile: D,
    config: BuildConfig,
    archive: PathBuf,
    output_dir: PathBuf,
    buildpack_cache: PathBuf,
    build_root: tempfile::TempDir,
    state: BuildState,
    warnings: Vec<String>,
}

impl<D> fmt::Debug for Builder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("archive", &self.archive)
            .field("output_dir", &self.output_dir)
            .field("build_root", &self.build_root.path())
            .field("state", &self.state)
            .finish()
    }
}

impl<D: DistributionProfile> Builder<D> {
    /// Prepares a build of `archive` whose package lands in `output_dir`.
    pub fn new(
        profile: D,
        config: BuildConfig,
        archive: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let build_root = tempfile::Builder::new()
            .prefix("pkgr-build-")
            .tempdir()
            .fs_context("creating build directory in", std::env::temp_dir())?;

        Ok(Self {
            profile,
            config,
            archive: archive.into(),
            output_dir: output_dir.into(),
            buildpack_cache: buildpack::default_cache_root(),
            build_root,
            state: BuildState::Uninitialized,
            warnings: Vec::new(),
        })
    }

    /// Overrides where buildpack checkouts are cached.
    pub fn with_buildpack_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.buildpack_cache = dir.into();
        self
    }

    /// Current pipeline state.
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Root of the package image.
    pub fn staging_dir(&self) -> PathBuf {
        self.build_root.path().join("staging")
    }

    /// Runs the whole pipeline. Any failure leaves the builder in
    /// [`BuildState::Failed`].
    pub async fn call(&mut self, on_line: LineSink<'_>) -> Result<PackagedArtifact> {
        let result = async {
            let command = self.prepare(on_line).await?;
            self.invoke(&command, on_line).await?;
            self.locate_package().await
        }
        .await;

        if result.is_err() {
            self.state = BuildState::Failed;
        }
        result
    }

    fn advance(&mut self, next: BuildState) -> Result<()> {
        if self.state.next() != Some(next) {
            return Err(Error::GenericError(format!(
                "build cannot move from {} to {}",
                self.state, next
            )));
        }
        log::debug!("Build state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Stages the image and returns the package builder invocation.
    async fn prepare(&mut self, on_line: LineSink<'_>) -> Result<ExternalCommand> {
        self.config.validate()?;
        let name = self.config.package_name()?.to_string();
        let staging = self.staging_dir();
        let app_dir = staging.join("opt").join(&name);
        let context = self.config.template_context()?;

        fs::create_dir_all(&staging, true).await?;

        let templates = self.profile.templates(&name);
        if !directories_precede_files(&templates) {
            bail!("template set for {} lists a file before its directory", name);
        }
        template::install_all(&templates, &staging, self.profile.renderer(), &context).await?;
        self.extract_archive(&app_dir).await?;
        self.advance(BuildState::TemplatesResolved)?;

        if let Some(install) = self.profile.check(&self.config).await? {
            self.warnings.push(format!(
                "missing build dependencies; run the following to fix: {}",
                install.display()
            ));
        }
        self.advance(BuildState::DependenciesChecked)?;

        self.run_before_precompile(&app_dir, on_line).await?;
        self.compile(&app_dir, on_line).await?;
        self.write_initializers(&name, &app_dir, &context).await?;

        self.profile.preinstall_hook(&self.config).await?;
        self.profile.postinstall_hook(&self.config).await?;
        self.advance(BuildState::HooksRendered)?;

        self.profile.build_command(&staging, &self.config).await
    }

    async fn extract_archive(&self, app_dir: &Path) -> Result<()> {
        let archive = self.archive.clone();
        let target = app_dir.to_path_buf();
        log::info!("Extracting {} into {}", archive.display(), target.display());

        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::open(&archive).fs_context("opening archive", &archive)?;
            tar::Archive::new(flate2::read::GzDecoder::new(file))
                .unpack(&target)
                .fs_context("extracting archive into", &target)
        })
        .await
        .context("archive extraction panicked")?
    }

    async fn run_before_precompile(&self, app_dir: &Path, on_line: LineSink<'_>) -> Result<()> {
        let Some(script) = &self.config.before_precompile else {
            return Ok(());
        };
        let script = app_dir.join(script);

        log::info!("Running before-precompile script {}", script.display());
        let run = ExternalCommand::new(&script)
            .current_dir(app_dir)
            .run_streaming(Stdio::null(), on_line)
            .await?;

        if !run.status.success() {
            bail!(
                "before-precompile script {} failed (exit status {})",
                script.display(),
                status_code(&run.status)
            );
        }
        Ok(())
    }

    async fn compile(&self, app_dir: &Path, on_line: LineSink<'_>) -> Result<()> {
        let (buildpack, dir) = self.select_buildpack(app_dir).await?;
        let cache_dir = self
            .config
            .compile_cache_dir
            .clone()
            .unwrap_or_else(|| self.build_root.path().join("cache"));

        log::info!("Compiling with buildpack {}", buildpack.uri());
        buildpack.compile(&dir, app_dir, &cache_dir, on_line).await
    }

    async fn select_buildpack(&self, app_dir: &Path) -> Result<(Buildpack, PathBuf)> {
        for buildpack in self.profile.buildpacks(self.config.buildpack.as_deref()) {
            let dir = buildpack.setup(&self.buildpack_cache).await?;
            if buildpack.kind() == BuildpackKind::Custom
                || buildpack.detect(&dir, app_dir).await?
            {
                return Ok((buildpack, dir));
            }
            log::debug!("Buildpack {} does not apply", buildpack.uri());
        }

        Err(Error::InvalidConfig(
            "no buildpack recognized the application; pass --buildpack".into(),
        ))
    }

    async fn write_initializers(
        &self,
        name: &str,
        app_dir: &Path,
        context: &serde_json::Value,
    ) -> Result<()> {
        let processes = procfile::load(app_dir).await?;
        let scaling_dir = app_dir.join(SCALING_DIR);

        for (process, entry) in self.profile.initializers_for(name, &processes) {
            let mut context = context.clone();
            if let serde_json::Value::Object(map) = &mut context {
                map.insert("process_name".into(), process.name.clone().into());
                map.insert("process_command".into(), process.command.clone().into());
            }
            entry
                .install(&scaling_dir, self.profile.renderer(), &context)
                .await?;
        }
        Ok(())
    }

    async fn invoke(&mut self, command: &ExternalCommand, on_line: LineSink<'_>) -> Result<()> {
        tool_detection::require(&command.program())?;
        if command.program() == "fpm"
            && let Some(version) = FPM_VERSION.as_deref()
        {
            log::debug!("Using fpm {}", version);
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .fs_context("creating output directory", &self.output_dir)?;

        log::info!("Building package with {}", command.program());
        let run = command
            .clone()
            .current_dir(&self.output_dir)
            .run_streaming(Stdio::null(), on_line)
            .await?;

        if !run.status.success() {
            return Err(Error::BuilderInvocation {
                status: status_code(&run.status),
                output: run.output,
            });
        }

        self.advance(BuildState::BuilderInvoked)
    }

    async fn locate_package(&mut self) -> Result<PackagedArtifact> {
        let path = self.output_dir.join(format!(
            "{}_{}-{}_{}.deb",
            self.config.name()?,
            self.config.version()?,
            self.config.iteration,
            self.config.architecture
        ));

        let size = tokio::fs::metadata(&path)
            .await
            .fs_context("reading package metadata", &path)?
            .len();
        let checksum = calculate_sha256(&path).await?;

        self.advance(BuildState::Packaged)?;
        log::info!("Packaged {} ({} bytes)", path.display(), size);

        Ok(PackagedArtifact {
            path,
            size,
            checksum,
            warnings: self.warnings.clone(),
        })
    }
}
