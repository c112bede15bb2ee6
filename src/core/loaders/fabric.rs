use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::context::InstallContext;
use super::installer::{LoaderInstaller, PlatformArtifacts};
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::registry::VersionSource;
use crate::core::resolver::pick_stable_first;

pub const FABRIC_MAVEN: &str = "https://maven.fabricmc.net";

/// Conventional outputs of `fabric-installer server`.
pub const LAUNCH_JAR: &str = "fabric-server-launch.jar";
pub const LIBRARIES_DIR: &str = "libraries";
pub const RUNTIME_JAR: &str = "server.jar";
pub const LAUNCHER_PROPERTIES: &str = "server-launcher.properties";

/// Runs the Fabric installer CLI headless to produce a server launch jar.
pub struct FabricServerInstaller {
    source: Arc<dyn VersionSource>,
    maven_base: String,
}

impl FabricServerInstaller {
    pub fn new(source: Arc<dyn VersionSource>) -> Self {
        Self {
            source,
            maven_base: FABRIC_MAVEN.to_string(),
        }
    }

    pub fn with_maven_base(mut self, base: &str) -> Self {
        self.maven_base = base.trim_end_matches('/').to_string();
        self
    }

    async fn latest_installer_version(&self) -> UpdaterResult<String> {
        let entries = self.source.installer_versions().await?;
        pick_stable_first(&entries)
            .map(str::to_owned)
            .ok_or_else(|| UpdaterError::Installer("No installer versions returned by Fabric meta".into()))
    }

    fn installer_url(&self, version: &str) -> String {
        format!(
            "{}/net/fabricmc/fabric-installer/{}/fabric-installer-{}.jar",
            self.maven_base, version, version
        )
    }

    fn installer_args(installer: &Path, ctx: &InstallContext<'_>) -> Vec<String> {
        vec![
            "-jar".into(),
            installer.to_string_lossy().to_string(),
            "server".into(),
            "-mcversion".into(),
            ctx.game_version.to_string(),
            "-loader".into(),
            ctx.loader_version.to_string(),
            "-downloadMinecraft".into(),
            "-dir".into(),
            ctx.work_dir.to_string_lossy().to_string(),
        ]
    }

    /// Collect what the installer left behind in `work_dir`.
    fn collect_outputs(work_dir: &Path) -> UpdaterResult<PlatformArtifacts> {
        let launch_jar = work_dir.join(LAUNCH_JAR);
        if !launch_jar.is_file() {
            return Err(UpdaterError::Installer(format!(
                "Installer did not produce {}",
                LAUNCH_JAR
            )));
        }

        let existing = |name: &str| -> Option<PathBuf> {
            let path = work_dir.join(name);
            path.exists().then_some(path)
        };

        Ok(PlatformArtifacts {
            launch_jar,
            libraries_dir: existing(LIBRARIES_DIR).filter(|p| p.is_dir()),
            runtime_jar: existing(RUNTIME_JAR),
            launch_config: existing(LAUNCHER_PROPERTIES).into_iter().collect(),
        })
    }
}

#[async_trait]
impl LoaderInstaller for FabricServerInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> UpdaterResult<PlatformArtifacts> {
        info!(
            "Installing Fabric {} server for Minecraft {}",
            ctx.loader_version, ctx.game_version
        );

        tokio::fs::create_dir_all(ctx.work_dir)
            .await
            .map_err(|e| UpdaterError::io(ctx.work_dir, e))?;

        let version = self.latest_installer_version().await?;
        let installer_path = ctx
            .work_dir
            .join(format!("fabric-installer-{}.jar", version));
        ctx.downloader
            .download_file(&self.installer_url(&version), &installer_path, None)
            .await?;

        let args = Self::installer_args(&installer_path, &ctx);
        debug!("Running {} {:?}", ctx.java_cmd, args);

        let output = Command::new(ctx.java_cmd)
            .args(&args)
            .current_dir(ctx.work_dir)
            .output()
            .await
            .map_err(|e| UpdaterError::Installer(format!("Cannot run {}: {}", ctx.java_cmd, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(UpdaterError::Installer(format!(
                "Fabric installer failed (code {:?})\nSTDOUT:\n{}\nSTDERR:\n{}",
                output.status.code(),
                stdout,
                stderr
            )));
        }

        remove_installer(&installer_path).await;

        let artifacts = Self::collect_outputs(ctx.work_dir)?;
        info!("Fabric server staged at {:?}", artifacts.launch_jar);
        Ok(artifacts)
    }
}

/// `true` when the installer jar was found and deleted.
async fn remove_installer(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed installer {:?}", path);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove installer {:?}: {}", path, e);
            false
        }
    }
}
