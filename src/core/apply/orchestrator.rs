// ─── Apply Orchestrator ───
// confirm → warn → stop → backup → stage → apply platform/mods/datapacks
// → commit state → start. Any failure once a backup completed restores it.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::confirm::Confirm;
use super::fs;
use crate::core::config::{StateRecord, UpdaterConfig};
use crate::core::downloader::Downloader;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::inventory::{infer_package_id, InventoryResult, MOD_ARCHIVE_EXTENSION};
use crate::core::loaders::{InstallContext, LoaderInstaller, PlatformArtifacts};
use crate::core::resolver::{ResolutionResult, ResolvedPackage};
use crate::core::server::{BackupOutcome, ServerController};
use crate::core::staging::StagingTransaction;
use crate::core::state::StateStore;

pub const STAGING_PLATFORM_DIR: &str = "platform";
pub const STAGING_MODS_DIR: &str = "mods";
pub const STAGING_DATAPACKS_DIR: &str = "datapacks";
pub const DATAPACK_ARCHIVE_EXTENSION: &str = "zip";

const WARN_TITLE: &str = "Server restarting for updates";

/// Live installation layout and toggles the orchestrator acts on.
#[derive(Debug, Clone)]
pub struct ApplySettings {
    pub server_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub datapacks_dir: PathBuf,
    /// Absolute path of the primary server jar.
    pub server_jar: PathBuf,
    pub java_cmd: String,
    pub warn_players: bool,
    pub warn_delay: Duration,
    pub auto_backup: bool,
}

impl ApplySettings {
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self {
            server_dir: config.server_dir().to_path_buf(),
            mods_dir: config.mods_dir().to_path_buf(),
            datapacks_dir: config.datapacks_dir(),
            server_jar: config.server_jar_path(),
            java_cmd: config.environment.java_cmd.clone(),
            warn_players: config.options.warn_players,
            warn_delay: config.warn_delay(),
            auto_backup: config.options.auto_backup,
        }
    }

    /// Staging lives beside the installation, never inside it, so a restore
    /// that clears the installation cannot take the staging area with it.
    fn staging_parent(&self) -> PathBuf {
        self.server_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.server_dir.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub record: StateRecord,
    pub backup_completed: bool,
    pub platform_updated: bool,
    pub mods_installed: usize,
    pub datapacks_installed: usize,
}

pub struct ApplyOrchestrator {
    settings: ApplySettings,
    controller: ServerController,
    installer: Arc<dyn LoaderInstaller>,
    downloader: Arc<Downloader>,
    state: StateStore,
    confirm: Arc<dyn Confirm>,
}

impl ApplyOrchestrator {
    pub fn new(
        settings: ApplySettings,
        controller: ServerController,
        installer: Arc<dyn LoaderInstaller>,
        downloader: Arc<Downloader>,
        state: StateStore,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            settings,
            controller,
            installer,
            downloader,
            state,
            confirm,
        }
    }

    pub fn controller(&self) -> &ServerController {
        &self.controller
    }

    /// Bring the live installation to `resolution`, or leave it as it was.
    ///
    /// `inventory` must come from scanning the live mods directory for this run.
    pub async fn apply(
        &mut self,
        resolution: &ResolutionResult,
        inventory: &InventoryResult,
    ) -> UpdaterResult<ApplyReport> {
        self.confirm_incompatible(resolution)?;
        let previous_state = self.state.load()?;

        if self.settings.warn_players {
            let subtitle = format!("Restarting in {}s", self.settings.warn_delay.as_secs());
            self.controller
                .warn(WARN_TITLE, &subtitle, self.settings.warn_delay)
                .await;
        }
        self.controller.stop().await;

        let backup_completed = self.run_backup().await?;

        let downloader = Arc::clone(&self.downloader);
        let mut staging =
            match StagingTransaction::open(&self.settings.staging_parent(), &downloader).await {
                Ok(tx) => tx,
                Err(e) => return Err(self.roll_back(e, backup_completed, None).await),
            };

        let mut committed = false;
        let outcome = tokio::select! {
            result = self.run_transaction(&mut staging, resolution, inventory, &mut committed) => result,
            _ = interrupted() => Err(UpdaterError::ApplyAborted("interrupted by operator".into())),
        };
        staging.close().await;

        match outcome {
            Ok(mut report) => {
                report.backup_completed = backup_completed;
                info!("Apply completed successfully.");
                Ok(report)
            }
            Err(e) => {
                let committed_over = committed.then_some(previous_state);
                Err(self.roll_back(e, backup_completed, committed_over).await)
            }
        }
    }

    fn confirm_incompatible(&self, resolution: &ResolutionResult) -> UpdaterResult<()> {
        let names: Vec<&str> = resolution
            .incompatible()
            .map(|m| m.descriptor.display_name.as_str())
            .collect();
        if names.is_empty() {
            return Ok(());
        }

        let prompt = format!(
            "Packages not matching target game version {} ({}). Continue?",
            resolution.platform.target_game_version,
            names.join(", ")
        );
        if self.confirm.confirm(&prompt)? {
            Ok(())
        } else {
            Err(UpdaterError::ApplyAborted(
                "operator declined incompatible packages".into(),
            ))
        }
    }

    /// `true` only when a restorable snapshot now exists.
    async fn run_backup(&mut self) -> UpdaterResult<bool> {
        if !self.settings.auto_backup {
            info!("auto_backup disabled; continuing without a backup.");
            return Ok(false);
        }

        match self.controller.backup().await {
            Ok(BackupOutcome::Completed) => Ok(true),
            Ok(BackupOutcome::Skipped) => Ok(false),
            Err(e) => {
                warn!("{}", e);
                let prompt = format!("Backup failed: {e}. Continue without backup?");
                if self.confirm.confirm(&prompt)? {
                    Ok(false)
                } else {
                    Err(UpdaterError::ApplyAborted(
                        "backup failed and operator declined to continue".into(),
                    ))
                }
            }
        }
    }

    async fn run_transaction(
        &mut self,
        staging: &mut StagingTransaction<'_>,
        resolution: &ResolutionResult,
        inventory: &InventoryResult,
        committed: &mut bool,
    ) -> UpdaterResult<ApplyReport> {
        self.controller.mark_applying();
        let platform = &resolution.platform;

        // Stage everything first; the live tree is untouched until all downloads verified.
        let platform_artifacts = if platform.needs_update {
            let work_dir = staging.area().join(STAGING_PLATFORM_DIR);
            let ctx = InstallContext {
                game_version: &platform.target_game_version,
                loader_version: &platform.target_loader_version,
                work_dir: &work_dir,
                java_cmd: &self.settings.java_cmd,
                downloader: &self.downloader,
            };
            Some(self.installer.install(ctx).await?)
        } else {
            None
        };

        let staged_mods =
            stage_packages(staging, STAGING_MODS_DIR, &resolution.mods, MOD_ARCHIVE_EXTENSION).await?;
        let staged_datapacks = stage_packages(
            staging,
            STAGING_DATAPACKS_DIR,
            &resolution.datapacks,
            DATAPACK_ARCHIVE_EXTENSION,
        )
        .await?;

        if let Some(artifacts) = &platform_artifacts {
            self.apply_platform(artifacts)?;
        }
        let mods_installed = self.apply_mods(&staged_mods, resolution, inventory)?;
        let datapacks_installed = self.apply_datapacks(&staged_datapacks, resolution)?;

        let record = applied_state(resolution);
        self.state.commit(&record)?;
        *committed = true;

        self.controller.start().await?;

        Ok(ApplyReport {
            record,
            backup_completed: false,
            platform_updated: platform_artifacts.is_some(),
            mods_installed,
            datapacks_installed,
        })
    }

    fn apply_platform(&self, artifacts: &PlatformArtifacts) -> UpdaterResult<()> {
        let server_dir = &self.settings.server_dir;

        if let Some(libraries) = &artifacts.libraries_dir {
            if let Some(name) = libraries.file_name() {
                fs::replace_dir(libraries, &server_dir.join(name))?;
                info!("Updated libraries from staging.");
            }
        }
        for file in artifacts.runtime_jar.iter().chain(&artifacts.launch_config) {
            if let Some(name) = file.file_name() {
                let dest = server_dir.join(name);
                std::fs::copy(file, &dest).map_err(|e| UpdaterError::io(&dest, e))?;
                debug!("Copied {:?} -> {:?}", file, dest);
            }
        }

        let target = &self.settings.server_jar;
        if target.exists() {
            std::fs::remove_file(target).map_err(|e| UpdaterError::io(target, e))?;
        }
        fs::move_file(&artifacts.launch_jar, target)?;
        info!("Applied new server jar to {:?}", target);
        Ok(())
    }

    fn apply_mods(
        &self,
        staged: &[PathBuf],
        resolution: &ResolutionResult,
        inventory: &InventoryResult,
    ) -> UpdaterResult<usize> {
        for entry in &inventory.unexpected {
            if let Some(id) = infer_package_id(&entry.filename, resolution.resolved_ids()) {
                debug!("Keeping {} (matches resolved {})", entry.filename, id);
                continue;
            }
            if fs::remove_logged(&entry.path, "unexpected mod") {
                info!("Removed unexpected mod: {}", entry.filename);
            }
        }

        for entry in inventory.matched.values() {
            if fs::remove_logged(&entry.path, "old mod") {
                debug!("Removed superseded mod: {}", entry.filename);
            }
        }

        install_into(staged, &self.settings.mods_dir, "mod")
    }

    fn apply_datapacks(&self, staged: &[PathBuf], resolution: &ResolutionResult) -> UpdaterResult<usize> {
        let dir = &self.settings.datapacks_dir;
        std::fs::create_dir_all(dir).map_err(|e| UpdaterError::io(dir, e))?;

        let incoming: HashSet<OsString> = staged
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect();
        let entries = std::fs::read_dir(dir).map_err(|e| UpdaterError::io(dir, e))?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if incoming.contains(&name) {
                continue;
            }
            let name = name.to_string_lossy();
            if !name.ends_with(&format!(".{DATAPACK_ARCHIVE_EXTENSION}")) {
                continue;
            }
            let ids = resolution.datapacks.iter().map(ResolvedPackage::package_id);
            if infer_package_id(&name, ids).is_some() && fs::remove_logged(&entry.path(), "old datapack") {
                info!("Removed superseded datapack: {}", name);
            }
        }

        install_into(staged, dir, "datapack")
    }

    async fn roll_back(
        &mut self,
        error: UpdaterError,
        backup_completed: bool,
        committed_over: Option<StateRecord>,
    ) -> UpdaterError {
        error!("Apply failed: {}", error);
        self.controller.mark_apply_failed();

        if !backup_completed {
            warn!("No backup was taken during this run; nothing to restore.");
            return error;
        }

        match self.controller.restore_latest_backup(None).await {
            Ok(archive) => {
                info!("Restored from latest backup {:?} after failure.", archive);
                if let Some(previous) = committed_over {
                    if let Err(e) = self.state.commit(&previous) {
                        warn!("Failed to roll back recorded state: {}", e);
                    }
                }
            }
            Err(restore_error) => error!("Failed to restore from backup: {}", restore_error),
        }
        error
    }
}

/// Download every distinct artifact into `subdir` once.
///
/// A project reached both by its declared slug and by a dependency's project
/// id resolves twice to the same file; only the first occurrence is staged.
async fn stage_packages(
    staging: &mut StagingTransaction<'_>,
    subdir: &str,
    packages: &[ResolvedPackage],
    extension: &str,
) -> UpdaterResult<Vec<PathBuf>> {
    let mut staged: Vec<PathBuf> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for package in packages {
        if !seen.insert(artifact_key(package)) {
            debug!(
                "Skipping {} ({}): same artifact already staged",
                package.descriptor.display_name,
                package.package_id()
            );
            continue;
        }
        info!(
            "Staging {} ({}) version {}",
            package.descriptor.display_name,
            package.package_id(),
            package.candidate.version_label
        );
        let relative = Path::new(subdir).join(package.artifact_file_name(extension));
        let artifact = staging.download(&relative, &package.candidate).await?;
        if !staged.contains(&artifact.path) {
            staged.push(artifact.path);
        }
    }
    Ok(staged)
}

fn artifact_key(package: &ResolvedPackage) -> String {
    let hash = package.candidate.content_hash.trim();
    if hash.is_empty() {
        package.candidate.download_url.clone()
    } else {
        hash.to_ascii_lowercase()
    }
}

fn install_into(staged: &[PathBuf], dir: &Path, what: &str) -> UpdaterResult<usize> {
    std::fs::create_dir_all(dir).map_err(|e| UpdaterError::io(dir, e))?;
    let mut installed = 0;
    for path in staged {
        let Some(name) = path.file_name() else {
            continue;
        };
        let dest = dir.join(name);
        fs::move_file(path, &dest)?;
        info!("Installed {}: {:?}", what, dest);
        installed += 1;
    }
    Ok(installed)
}

/// Platform target plus the versions of declared mods; dependencies pulled in
/// automatically are re-derived on every run and never recorded.
fn applied_state(resolution: &ResolutionResult) -> StateRecord {
    StateRecord {
        game_version: resolution.platform.target_game_version.clone(),
        loader_version: resolution.platform.target_loader_version.clone(),
        applied_at: Some(Utc::now()),
        mods: resolution
            .mods
            .iter()
            .filter(|m| !m.is_auto_added())
            .map(|m| (m.package_id().to_string(), m.candidate.version_label.clone()))
            .collect(),
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::core::downloader::sha1_hex;
    use crate::core::error::{DownloadError, ServerControlError};
    use crate::core::inventory;
    use crate::core::resolver::{PackageDescriptor, PlatformTarget, VersionCandidate, VersionStability};
    use crate::core::server::backup::test_support::write_archive;
    use crate::core::server::lifecycle::fakes::FakeChannel;
    use crate::core::server::{ControlChannel, LifecycleSettings};

    struct RecordingConfirm {
        answer: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingConfirm {
        fn answering(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl Confirm for RecordingConfirm {
        fn confirm(&self, prompt: &str) -> UpdaterResult<bool> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer)
        }
    }

    #[derive(Default)]
    struct FakeInstaller {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LoaderInstaller for FakeInstaller {
        async fn install(&self, ctx: InstallContext<'_>) -> UpdaterResult<PlatformArtifacts> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let libraries = ctx.work_dir.join("libraries");
            std::fs::create_dir_all(libraries.join("net")).unwrap();
            std::fs::write(libraries.join("net/loader.jar"), "lib").unwrap();
            let launch_jar = ctx.work_dir.join("fabric-server-launch.jar");
            std::fs::write(&launch_jar, "launch-new").unwrap();
            let runtime_jar = ctx.work_dir.join("server.jar");
            std::fs::write(&runtime_jar, "vanilla").unwrap();
            let properties = ctx.work_dir.join("server-launcher.properties");
            std::fs::write(&properties, "serverJar=server.jar").unwrap();
            Ok(PlatformArtifacts {
                launch_jar,
                libraries_dir: Some(libraries),
                runtime_jar: Some(runtime_jar),
                launch_config: vec![properties],
            })
        }
    }

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
        server_dir: PathBuf,
        backups: PathBuf,
        config: PathBuf,
        registry: MockServer,
    }

    impl Fixture {
        async fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().to_path_buf();
            let server_dir = root.join("survival");
            std::fs::create_dir_all(server_dir.join("mods")).unwrap();
            std::fs::create_dir_all(server_dir.join("libraries/org/old")).unwrap();
            std::fs::create_dir_all(server_dir.join("world")).unwrap();
            std::fs::write(server_dir.join("fabric-server-launch.jar"), "launch-old").unwrap();
            std::fs::write(server_dir.join("libraries/org/old/lib.jar"), "old").unwrap();
            std::fs::write(server_dir.join("mods/lithium-0.17.0.jar"), "lithium-old").unwrap();
            std::fs::write(server_dir.join("mods/random.jar"), "random").unwrap();

            let backups = root.join("backups");
            std::fs::create_dir(&backups).unwrap();

            let config = root.join("config.toml");
            std::fs::write(
                &config,
                "[mods]\nlithium = \"Lithium\"\n\n[state]\nmc_version = \"1.21.7\"\nserver_version = \"0.16.14\"\n",
            )
            .unwrap();

            let registry = MockServer::start().await;
            for (file, body) in [
                ("lithium.jar", "lithium-new"),
                ("fabric-api.jar", "fabric-api-new"),
                ("terralith.zip", "terralith"),
            ] {
                Mock::given(method("GET"))
                    .and(path(format!("/{file}")))
                    .respond_with(ResponseTemplate::new(200).set_body_bytes(body.as_bytes().to_vec()))
                    .mount(&registry)
                    .await;
            }

            Self {
                _tmp: tmp,
                root,
                server_dir,
                backups,
                config,
                registry,
            }
        }

        fn package(&self, id: &str, name: &str, declared: bool, version: &str, file: &str, body: &str) -> ResolvedPackage {
            ResolvedPackage {
                descriptor: PackageDescriptor {
                    package_id: id.into(),
                    display_name: name.into(),
                    declared,
                },
                candidate: VersionCandidate {
                    package_id: id.into(),
                    version_label: version.into(),
                    stability: VersionStability::Release,
                    supported_game_versions: vec!["1.21.8".into()],
                    download_url: format!("{}/{}", self.registry.uri(), file),
                    content_hash: sha1_hex(body.as_bytes()),
                    required_dependencies: vec![],
                },
                compatible: true,
                current_version: None,
            }
        }

        fn resolution(&self) -> ResolutionResult {
            ResolutionResult {
                platform: PlatformTarget {
                    target_game_version: "1.21.8".into(),
                    target_loader_version: "0.17.2".into(),
                    current_game_version: "1.21.7".into(),
                    current_loader_version: "0.16.14".into(),
                    needs_update: true,
                },
                mods: vec![
                    self.package("lithium", "Lithium", true, "0.18.0", "lithium.jar", "lithium-new"),
                    self.package("fabric-api", "Fabric API", false, "0.129.0", "fabric-api.jar", "fabric-api-new"),
                ],
                datapacks: vec![self.package("terralith", "Terralith", true, "2.5", "terralith.zip", "terralith")],
            }
        }

        fn inventory(&self, resolution: &ResolutionResult) -> InventoryResult {
            inventory::scan(&self.server_dir.join("mods"), resolution.resolved_ids()).unwrap()
        }

        fn settings(&self) -> ApplySettings {
            ApplySettings {
                server_dir: self.server_dir.clone(),
                mods_dir: self.server_dir.join("mods"),
                datapacks_dir: self.server_dir.join("world/datapacks"),
                server_jar: self.server_dir.join("fabric-server-launch.jar"),
                java_cmd: "java".into(),
                warn_players: false,
                warn_delay: Duration::ZERO,
                auto_backup: true,
            }
        }

        fn orchestrator(
            &self,
            settings: ApplySettings,
            channel: Option<Arc<dyn ControlChannel>>,
            backup_script: Option<&str>,
            start_script: Option<&str>,
            confirm: Arc<RecordingConfirm>,
        ) -> ApplyOrchestrator {
            let mut lifecycle = LifecycleSettings::new(self.server_dir.clone());
            lifecycle.backup_dir = Some(self.backups.to_string_lossy().to_string());
            lifecycle.backup_script = backup_script.map(str::to_owned);
            lifecycle.start_script = start_script.map(str::to_owned);
            lifecycle.stop_poll_interval = Duration::from_millis(1);

            ApplyOrchestrator::new(
                settings,
                ServerController::new(channel, lifecycle),
                Arc::new(FakeInstaller::default()),
                Arc::new(Downloader::new(reqwest::Client::new())),
                StateStore::new(&self.config),
                confirm,
            )
        }

        fn read(&self, relative: &str) -> String {
            std::fs::read_to_string(self.server_dir.join(relative)).unwrap()
        }

        fn staging_dirs_left(&self) -> usize {
            std::fs::read_dir(&self.root)
                .unwrap()
                .flatten()
                .filter(|e| e.file_name().to_string_lossy().starts_with("staging_"))
                .count()
        }
    }

    #[tokio::test]
    async fn incompatible_mod_is_confirmed_before_any_downtime() {
        let fx = Fixture::new().await;
        let mut resolution = fx.resolution();
        let mut b = fx.package("b-mod", "B Mod", true, "1.0", "b.jar", "b");
        b.candidate.supported_game_versions = vec!["1.21.5".into()];
        b.compatible = false;
        resolution.mods.push(b);

        let channel = Arc::new(FakeChannel::new(5));
        let confirm = RecordingConfirm::answering(false);
        let mut settings = fx.settings();
        settings.warn_players = true;
        let mut orchestrator = fx.orchestrator(
            settings,
            Some(channel.clone()),
            Some("true"),
            Some("true"),
            confirm.clone(),
        );

        let inventory = fx.inventory(&resolution);
        let err = orchestrator.apply(&resolution, &inventory).await.unwrap_err();

        assert!(matches!(err, UpdaterError::ApplyAborted(_)));
        assert!(channel.sent().is_empty(), "nothing may reach the server before confirmation");
        let prompts = confirm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("B Mod"));
        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-old");
    }

    #[tokio::test]
    async fn successful_apply_replaces_live_files_and_records_declared_mods() {
        let fx = Fixture::new().await;
        let resolution = fx.resolution();
        let inventory = fx.inventory(&resolution);
        let mut orchestrator =
            fx.orchestrator(fx.settings(), None, Some("true"), Some("true"), RecordingConfirm::answering(true));

        let report = orchestrator.apply(&resolution, &inventory).await.unwrap();

        assert!(report.backup_completed);
        assert!(report.platform_updated);
        assert_eq!(report.mods_installed, 2);
        assert_eq!(report.datapacks_installed, 1);

        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-new");
        assert_eq!(fx.read("server.jar"), "vanilla");
        assert!(fx.server_dir.join("server-launcher.properties").is_file());
        assert!(fx.server_dir.join("libraries/net/loader.jar").is_file());
        assert!(!fx.server_dir.join("libraries/org").exists());

        assert_eq!(fx.read("mods/Lithium_0.18.0.jar"), "lithium-new");
        assert_eq!(fx.read("mods/fabric-api_Fabric_API_0.129.0.jar"), "fabric-api-new");
        assert!(!fx.server_dir.join("mods/lithium-0.17.0.jar").exists());
        assert!(!fx.server_dir.join("mods/random.jar").exists());
        assert_eq!(fx.read("world/datapacks/Terralith_2.5.zip"), "terralith");

        let state = StateStore::new(&fx.config).load().unwrap();
        assert_eq!(state.game_version, "1.21.8");
        assert_eq!(state.loader_version, "0.17.2");
        assert_eq!(state.mods.len(), 1);
        assert_eq!(state.mods.get("lithium").unwrap(), "0.18.0");
        assert!(state.applied_at.is_some());

        assert_eq!(fx.staging_dirs_left(), 0);

        // A second run sees the applied files as the canonical copies.
        let rerun = fx.inventory(&resolution);
        assert_eq!(rerun.matched.len(), 2);
        assert!(rerun.unexpected.is_empty());
        assert!(rerun.missing.is_empty());
    }

    #[tokio::test]
    async fn failure_after_backup_restores_the_snapshot() {
        let fx = Fixture::new().await;
        write_archive(&fx.server_dir, &fx.backups.join("survival-1.tar.gz"));
        let resolution = fx.resolution();
        let inventory = fx.inventory(&resolution);
        let mut orchestrator =
            fx.orchestrator(fx.settings(), None, Some("true"), Some("exit 1"), RecordingConfirm::answering(true));

        let err = orchestrator.apply(&resolution, &inventory).await.unwrap_err();

        assert!(matches!(
            err,
            UpdaterError::ServerControl(ServerControlError::StartFailed { .. })
        ));
        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-old");
        assert_eq!(fx.read("mods/lithium-0.17.0.jar"), "lithium-old");
        assert!(fx.server_dir.join("mods/random.jar").exists());
        assert!(!fx.server_dir.join("mods/Lithium_0.18.0.jar").exists());
        assert!(!fx.server_dir.join("world/datapacks").exists());
        assert!(fx.server_dir.join("libraries/org/old/lib.jar").exists());

        let state = StateStore::new(&fx.config).load().unwrap();
        assert_eq!(state.game_version, "1.21.7");
        assert_eq!(fx.staging_dirs_left(), 0);
    }

    #[tokio::test]
    async fn declined_backup_failure_aborts_without_restore() {
        let fx = Fixture::new().await;
        write_archive(&fx.server_dir, &fx.backups.join("survival-1.tar.gz"));
        std::fs::write(fx.server_dir.join("marker.txt"), "after snapshot").unwrap();
        let resolution = fx.resolution();
        let inventory = fx.inventory(&resolution);
        let confirm = RecordingConfirm::answering(false);
        let mut orchestrator =
            fx.orchestrator(fx.settings(), None, Some("exit 2"), Some("true"), confirm.clone());

        let err = orchestrator.apply(&resolution, &inventory).await.unwrap_err();

        assert!(matches!(err, UpdaterError::ApplyAborted(_)));
        assert!(confirm.prompts()[0].starts_with("Backup failed"));
        assert_eq!(fx.read("marker.txt"), "after snapshot");
        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-old");
    }

    #[tokio::test]
    async fn failure_without_backup_never_restores() {
        let fx = Fixture::new().await;
        write_archive(&fx.server_dir, &fx.backups.join("survival-1.tar.gz"));
        std::fs::write(fx.server_dir.join("marker.txt"), "after snapshot").unwrap();
        let resolution = fx.resolution();
        let inventory = fx.inventory(&resolution);
        let mut settings = fx.settings();
        settings.auto_backup = false;
        let mut orchestrator =
            fx.orchestrator(settings, None, Some("true"), Some("exit 1"), RecordingConfirm::answering(true));

        let err = orchestrator.apply(&resolution, &inventory).await.unwrap_err();

        assert!(matches!(
            err,
            UpdaterError::ServerControl(ServerControlError::StartFailed { .. })
        ));
        assert_eq!(fx.read("marker.txt"), "after snapshot");
        assert_eq!(fx.read("mods/Lithium_0.18.0.jar"), "lithium-new");
    }

    #[tokio::test]
    async fn bad_download_leaves_platform_untouched() {
        let fx = Fixture::new().await;
        let mut resolution = fx.resolution();
        resolution.mods[0].candidate.content_hash = "0".repeat(40);
        let inventory = fx.inventory(&resolution);
        let mut settings = fx.settings();
        settings.auto_backup = false;
        let mut orchestrator =
            fx.orchestrator(settings, None, None, Some("true"), RecordingConfirm::answering(true));

        let err = orchestrator.apply(&resolution, &inventory).await.unwrap_err();

        assert!(matches!(
            err,
            UpdaterError::Download(DownloadError::IntegrityMismatch { .. })
        ));
        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-old");
        assert!(fx.server_dir.join("libraries/org/old/lib.jar").exists());
        assert_eq!(fx.read("mods/lithium-0.17.0.jar"), "lithium-old");
        assert_eq!(fx.staging_dirs_left(), 0);
    }

    #[tokio::test]
    async fn unexpected_file_matching_a_resolved_id_is_kept() {
        let fx = Fixture::new().await;
        let mut resolution = fx.resolution();
        resolution.platform.needs_update = false;
        resolution.datapacks.clear();
        // Scanned against declared ids only, so the dependency's jar is unexpected.
        std::fs::write(fx.server_dir.join("mods/fabric-api-0.128.0.jar"), "fapi-old").unwrap();
        let inventory = inventory::scan(&fx.server_dir.join("mods"), ["lithium"]).unwrap();
        let mut orchestrator =
            fx.orchestrator(fx.settings(), None, None, Some("true"), RecordingConfirm::answering(true));

        let report = orchestrator.apply(&resolution, &inventory).await.unwrap();

        assert!(!report.platform_updated);
        assert!(!report.backup_completed);
        assert!(fx.server_dir.join("mods/fabric-api-0.128.0.jar").exists());
        assert!(!fx.server_dir.join("mods/random.jar").exists());
        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-old");
    }

    #[tokio::test]
    async fn project_reached_by_slug_and_project_id_is_installed_once() {
        let fx = Fixture::new().await;
        let mut resolution = fx.resolution();
        resolution.platform.needs_update = false;
        resolution.datapacks.clear();
        resolution.mods = vec![
            fx.package("fabric-api", "Fabric API", true, "0.129.0", "fabric-api.jar", "fabric-api-new"),
            fx.package("lithium", "Lithium", true, "0.18.0", "lithium.jar", "lithium-new"),
            fx.package("P7dR8mSH", "Fabric API", false, "0.129.0", "fabric-api.jar", "fabric-api-new"),
        ];
        let inventory = fx.inventory(&resolution);
        let mut settings = fx.settings();
        settings.auto_backup = false;
        let mut orchestrator =
            fx.orchestrator(settings, None, None, Some("true"), RecordingConfirm::answering(true));

        let report = orchestrator.apply(&resolution, &inventory).await.unwrap();

        assert_eq!(report.mods_installed, 2);
        let mut names: Vec<String> = std::fs::read_dir(fx.server_dir.join("mods"))
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Lithium_0.18.0.jar", "fabric-api_Fabric_API_0.129.0.jar"]);
    }

    #[tokio::test]
    async fn incompatible_datapack_requires_confirmation() {
        let fx = Fixture::new().await;
        let mut resolution = fx.resolution();
        resolution.datapacks[0].candidate.supported_game_versions = vec!["1.20.1".into()];
        resolution.datapacks[0].compatible = false;
        let inventory = fx.inventory(&resolution);
        let confirm = RecordingConfirm::answering(false);
        let mut settings = fx.settings();
        settings.auto_backup = false;
        let mut orchestrator = fx.orchestrator(settings, None, None, Some("true"), confirm.clone());

        let err = orchestrator.apply(&resolution, &inventory).await.unwrap_err();

        assert!(matches!(err, UpdaterError::ApplyAborted(_)));
        let prompts = confirm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Terralith"));
        assert!(!fx.server_dir.join("world/datapacks").exists());
        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-old");
    }

    #[tokio::test]
    async fn unreadable_state_aborts_before_downtime() {
        let fx = Fixture::new().await;
        let broken = "state = \"broken\"\n\n[mods]\nlithium = \"Lithium\"\n";
        std::fs::write(&fx.config, broken).unwrap();
        let resolution = fx.resolution();
        let inventory = fx.inventory(&resolution);
        let channel = Arc::new(FakeChannel::new(5));
        let mut settings = fx.settings();
        settings.warn_players = true;
        let mut orchestrator = fx.orchestrator(
            settings,
            Some(channel.clone()),
            Some("true"),
            Some("exit 1"),
            RecordingConfirm::answering(true),
        );

        assert!(orchestrator.apply(&resolution, &inventory).await.is_err());

        assert!(channel.sent().is_empty());
        assert_eq!(std::fs::read_to_string(&fx.config).unwrap(), broken);
        assert_eq!(fx.read("fabric-server-launch.jar"), "launch-old");
    }
}
