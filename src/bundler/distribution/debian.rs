//! Debian profile: upstart services, dpkg dependency checks and fpm.

use super::{
    DataDir, DependencyLists, DistributionProfile, Dpkg, HookCache, HookKind, PackageDatabase,
};
use crate::bundler::{
    buildpack::{Buildpack, BuildpackKind},
    error::{Context, Error, Result, status_code},
    procfile::ProcfileEntry,
    settings::BuildConfig,
    template::{TemplateEntry, TemplateRenderer, TemplateSource},
    utils::ExternalCommand,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Buildpacks tried in order when no custom buildpack is given.
pub const DEFAULT_BUILDPACKS: &[&str] = &[
    "https://github.com/heroku/heroku-buildpack-ruby.git",
    "https://github.com/heroku/heroku-buildpack-nodejs.git",
    "https://github.com/heroku/heroku-buildpack-java.git",
    "https://github.com/heroku/heroku-buildpack-play.git",
    "https://github.com/heroku/heroku-buildpack-python.git",
    "https://github.com/heroku/heroku-buildpack-php.git",
    "https://github.com/heroku/heroku-buildpack-clojure.git",
    "https://github.com/kr/heroku-buildpack-go.git",
    "https://github.com/miyagawa/heroku-buildpack-perl.git",
    "https://github.com/heroku/heroku-buildpack-scala",
    "https://github.com/igrigorik/heroku-buildpack-dart.git",
    "https://github.com/rhy-jot/buildpack-nginx.git",
    "https://github.com/Kloadut/heroku-buildpack-static-apache.git",
];

/// Placeholder upstart substitutes with the instance number.
pub const PROCESS_NUM: &str = "PROCESS_NUM";

/// Debian-family target, e.g. `wheezy`.
pub struct Debian {
    codename: String,
    assets: PathBuf,
    database: Arc<dyn PackageDatabase>,
    renderer: TemplateRenderer,
    hooks: HookCache,
}

impl Debian {
    /// Profile for `codename` reading assets from `data_dir`, probing dpkg.
    pub fn new(codename: impl Into<String>, data_dir: &DataDir) -> Self {
        Self::with_database(codename, data_dir, Arc::new(Dpkg))
    }

    /// Profile with a custom package database.
    pub fn with_database(
        codename: impl Into<String>,
        data_dir: &DataDir,
        database: Arc<dyn PackageDatabase>,
    ) -> Self {
        Self {
            codename: codename.into(),
            assets: data_dir.distribution("debian"),
            database,
            renderer: TemplateRenderer::new(),
            hooks: HookCache::new(),
        }
    }

    fn asset(&self, name: &str) -> TemplateSource {
        TemplateSource::File(self.assets.join(name))
    }

    fn resolve(&self, document: &str, extra: &[String]) -> Result<Vec<String>> {
        let lists = DependencyLists::load(&self.assets.join(document))?;
        Ok(lists.resolve(&self.codename, extra))
    }

    async fn render_hook(&self, kind: HookKind, config: &BuildConfig) -> Result<PathBuf> {
        config.package_name()?;
        let source = self.assets.join("hooks").join(kind.file_name());
        self.hooks
            .get_or_render(kind, move || async move {
                let context = config.template_context()?;
                self.renderer.render_file(&source, &context).await
            })
            .await
    }
}

impl DistributionProfile for Debian {
    fn codename(&self) -> &str {
        &self.codename
    }

    fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    fn templates(&self, app_name: &str) -> Vec<TemplateEntry> {
        let mut list: Vec<TemplateEntry> = [
            "usr/local/bin".to_string(),
            format!("opt/{app_name}"),
            format!("etc/{app_name}/conf.d"),
            "etc/default".to_string(),
            "etc/init".to_string(),
            format!("var/log/{app_name}"),
        ]
        .into_iter()
        .map(TemplateEntry::dir)
        .collect();

        // conf.d files are installed by the postinstall hook so existing
        // configuration is never overwritten on upgrade.
        list.extend([
            TemplateEntry::file(format!("etc/default/{app_name}"), self.asset("default.hbs")),
            TemplateEntry::file(
                format!("etc/init/{app_name}.conf"),
                self.asset("upstart/master.conf.hbs"),
            ),
            TemplateEntry::file(format!("usr/local/bin/{app_name}"), self.asset("runner.hbs"))
                .with_mode(0o755),
            TemplateEntry::file(
                format!("etc/logrotate.d/{app_name}"),
                self.asset("logrotate.hbs"),
            ),
        ]);

        list
    }

    fn initializers_for(
        &self,
        app_name: &str,
        processes: &[ProcfileEntry],
    ) -> Vec<(ProcfileEntry, TemplateEntry)> {
        processes
            .iter()
            .filter(|process| process.is_daemon())
            .flat_map(|process| {
                log::debug!("Adding {} to initialization scripts", process.name);
                [
                    (
                        process.clone(),
                        TemplateEntry::file(
                            format!("{app_name}-{}.conf", process.name),
                            self.asset("upstart/process_master.conf.hbs"),
                        ),
                    ),
                    (
                        process.clone(),
                        TemplateEntry::file(
                            format!("{app_name}-{}-{PROCESS_NUM}.conf", process.name),
                            self.asset("upstart/process.conf.hbs"),
                        ),
                    ),
                ]
            })
            .collect()
    }

    fn dependencies(&self, extra: &[String]) -> Result<Vec<String>> {
        self.resolve("dependencies.toml", extra)
    }

    fn build_dependencies(&self, extra: &[String]) -> Result<Vec<String>> {
        self.resolve("build_dependencies.toml", extra)
    }

    fn buildpacks(&self, custom_uri: Option<&str>) -> Vec<Buildpack> {
        match custom_uri {
            Some(uri) => vec![Buildpack::new(uri, BuildpackKind::Custom)],
            None => DEFAULT_BUILDPACKS
                .iter()
                .map(|url| Buildpack::new(*url, BuildpackKind::Builtin))
                .collect(),
        }
    }

    async fn check(&self, config: &BuildConfig) -> Result<Option<ExternalCommand>> {
        let wanted = self.build_dependencies(&config.build_dependencies)?;
        let database = Arc::clone(&self.database);

        let missing = tokio::task::spawn_blocking(move || {
            wanted
                .into_iter()
                .filter(|package| {
                    log::debug!("Probing installed package {}", package);
                    !database.is_installed(package)
                })
                .collect::<Vec<_>>()
        })
        .await
        .context("dependency probe panicked")?;

        if missing.is_empty() {
            return Ok(None);
        }

        let install = self.database.install_command(&missing);
        if !config.auto {
            log::debug!("Leaving build dependencies uninstalled: {}", missing.join(", "));
            return Ok(Some(install));
        }

        log::info!("Installing missing build dependencies: {}", missing.join(", "));
        let status = install.status().await?;
        if status.success() {
            Ok(None)
        } else {
            Err(Error::DependencyCheck {
                command: install.display(),
                status: status_code(&status),
            })
        }
    }

    async fn preinstall_hook(&self, config: &BuildConfig) -> Result<PathBuf> {
        self.render_hook(HookKind::Preinstall, config).await
    }

    async fn postinstall_hook(&self, config: &BuildConfig) -> Result<PathBuf> {
        self.render_hook(HookKind::Postinstall, config).await
    }

    async fn build_command(&self, staging_dir: &Path, config: &BuildConfig) -> Result<ExternalCommand> {
        let name = config.package_name()?;
        let preinstall = self.preinstall_hook(config).await?;
        let postinstall = self.postinstall_hook(config).await?;

        let mut fpm = ExternalCommand::new("fpm")
            .args(["-t", "deb", "-s", "dir", "--verbose", "--force"])
            .arg("-C")
            .arg(staging_dir)
            .args(["-n", name])
            .args(["--version", config.version()?])
            .args(["--iteration", &config.iteration]);

        if let Some(homepage) = &config.homepage {
            fpm = fpm.arg("--url").arg(homepage);
        }
        if let Some(description) = &config.description {
            fpm = fpm.arg("--description").arg(description);
        }
        if let Some(maintainer) = &config.maintainer {
            fpm = fpm.arg("--maintainer").arg(maintainer);
        }

        fpm = fpm
            .args(["--provides", name])
            .args(["--deb-user", "root", "--deb-group", "root"])
            .args(["-a", config.architecture.as_str()])
            .arg("--before-install")
            .arg(&preinstall)
            .arg("--after-install")
            .arg(&postinstall);

        for dependency in self.dependencies(&config.dependencies)? {
            fpm = fpm.arg("-d").arg(dependency);
        }

        Ok(fpm.arg("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{settings::BuildConfigBuilder, template::directories_precede_files};
    use std::sync::Mutex;

    fn bundled_data() -> DataDir {
        DataDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
    }

    fn config() -> BuildConfig {
        BuildConfigBuilder::new()
            .name("my-app")
            .version("1.2.0")
            .iteration("20240101000000")
            .description("My app; \"quoted\" $(whoami)")
            .dependencies(vec!["libpq5".into()])
            .codename("wheezy")
            .build()
            .unwrap()
    }

    /// Package database that knows a fixed set of installed packages.
    struct FakeDatabase {
        installed: Vec<&'static str>,
        install: ExternalCommand,
        probes: Mutex<Vec<String>>,
    }

    impl PackageDatabase for FakeDatabase {
        fn is_installed(&self, package: &str) -> bool {
            self.probes.lock().unwrap().push(package.to_string());
            self.installed.contains(&package)
        }

        fn install_command(&self, _packages: &[String]) -> ExternalCommand {
            self.install.clone()
        }
    }

    fn profile_with(installed: Vec<&'static str>, install: ExternalCommand) -> (Debian, Arc<FakeDatabase>) {
        let database = Arc::new(FakeDatabase {
            installed,
            install,
            probes: Mutex::new(Vec::new()),
        });
        let profile = Debian::with_database("wheezy", &bundled_data(), database.clone());
        (profile, database)
    }

    #[test]
    fn templates_list_directories_before_files() {
        let debian = Debian::new("wheezy", &bundled_data());
        let templates = debian.templates("my-app");

        assert_eq!(templates.len(), 10);
        assert_eq!(templates.iter().filter(|t| t.is_dir()).count(), 6);
        assert!(directories_precede_files(&templates));

        let runner = templates
            .iter()
            .find(|t| t.path() == Path::new("usr/local/bin/my-app"))
            .unwrap();
        assert!(matches!(runner, TemplateEntry::File { mode: 0o755, .. }));
    }

    #[test]
    fn only_daemons_get_initializers() {
        let debian = Debian::new("wheezy", &bundled_data());
        let processes = vec![
            ProcfileEntry::new("web", "bin/web", true),
            ProcfileEntry::new("worker", "bin/worker", true),
            ProcfileEntry::new("console", "bin/console", false),
            ProcfileEntry::new("rake", "rake", false),
            ProcfileEntry::new("migrate", "bin/migrate", false),
        ];

        let initializers = debian.initializers_for("my-app", &processes);
        assert_eq!(initializers.len(), 4);
        assert!(initializers.iter().all(|(process, _)| process.daemon));

        let names: Vec<_> = initializers
            .iter()
            .map(|(_, entry)| entry.path().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "my-app-web.conf",
                "my-app-web-PROCESS_NUM.conf",
                "my-app-worker.conf",
                "my-app-worker-PROCESS_NUM.conf",
            ]
        );
    }

    #[test]
    fn custom_buildpack_replaces_defaults() {
        let debian = Debian::new("wheezy", &bundled_data());
        assert_eq!(debian.buildpacks(None).len(), DEFAULT_BUILDPACKS.len());

        let custom = debian.buildpacks(Some("https://example.com/bp.git#main"));
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].kind(), BuildpackKind::Custom);
    }

    #[test]
    fn overrides_come_first_in_dependencies() {
        let debian = Debian::new("wheezy", &bundled_data());
        let deps = debian.dependencies(&["zzz-first".to_string()]).unwrap();
        assert_eq!(deps[0], "zzz-first");
        assert_eq!(deps, debian.dependencies(&["zzz-first".to_string()]).unwrap());
    }

    #[tokio::test]
    async fn check_probes_each_package_once_and_only_warns_without_auto() {
        let (debian, database) = profile_with(vec![], ExternalCommand::new("false"));
        let mut cfg = config();
        cfg.build_dependencies = vec!["git".into()];

        let install = debian.check(&cfg).await.unwrap();
        assert_eq!(install.map(|cmd| cmd.program()).as_deref(), Some("false"));

        let probes = database.probes.lock().unwrap().clone();
        let wanted = debian.build_dependencies(&cfg.build_dependencies).unwrap();
        assert_eq!(probes, wanted);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn check_with_auto_fails_on_install_error() {
        let (debian, _) = profile_with(
            vec![],
            ExternalCommand::new("sh").args(["-c", "exit 3"]),
        );
        let mut cfg = config();
        cfg.auto = true;
        cfg.build_dependencies = vec!["git".into()];

        let err = debian.check(&cfg).await.unwrap_err();
        assert!(matches!(err, Error::DependencyCheck { status: 3, .. }));

        let (debian, _) = profile_with(vec![], ExternalCommand::new("true"));
        assert!(debian.check(&cfg).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hooks_render_once_with_quoted_values() {
        let debian = Debian::new("wheezy", &bundled_data());
        let cfg = config();

        let first = debian.preinstall_hook(&cfg).await.unwrap();
        let second = debian.preinstall_hook(&cfg).await.unwrap();
        assert_eq!(first, second);

        let post = debian.postinstall_hook(&cfg).await.unwrap();
        let script = std::fs::read_to_string(&post).unwrap();
        assert!(script.contains("APP_NAME=my-app"));
        assert!(!script.contains("{{"));
    }

    #[tokio::test]
    async fn hooks_refuse_names_that_are_not_package_names() {
        let debian = Debian::new("wheezy", &bundled_data());
        let mut cfg = config();
        cfg.name = Some("app;touch /tmp/owned".into());

        assert!(matches!(
            debian.preinstall_hook(&cfg).await,
            Err(Error::InvalidConfig(_))
        ));
        assert!(debian.postinstall_hook(&cfg).await.is_err());
        assert!(debian.build_command(Path::new("/tmp/staging"), &cfg).await.is_err());
    }

    #[tokio::test]
    async fn build_command_passes_metadata_as_separate_arguments() {
        let debian = Debian::new("wheezy", &bundled_data());
        let cfg = config();

        let fpm = debian
            .build_command(Path::new("/tmp/staging"), &cfg)
            .await
            .unwrap();
        let args = fpm.args_lossy();

        assert_eq!(fpm.program(), "fpm");
        assert_eq!(&args[..6], ["-t", "deb", "-s", "dir", "--verbose", "--force"]);
        let description = args.iter().position(|a| a == "--description").unwrap();
        assert_eq!(args[description + 1], "My app; \"quoted\" $(whoami)");
        let first_dep = args.iter().position(|a| a == "-d").unwrap();
        assert_eq!(args[first_dep + 1], "libpq5");
        assert_eq!(args.last().map(String::as_str), Some("."));
        assert!(!args.iter().any(|a| a == "--template-scripts"));
    }
}
