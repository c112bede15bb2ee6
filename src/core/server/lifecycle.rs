// ─── Server Lifecycle ───
// warn → stop → backup → (apply) → start, plus restore-from-backup.
//
//   Running → Warned → Stopped → BackedUp → Applying → Starting → Running
//                                              └→ ApplyFailed → Restoring → Stopped

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::backup;
use super::control::{ControlChannel, ServerCommand};
use crate::core::error::{ServerControlError, UpdaterError, UpdaterResult};

pub const STOP_POLL_TICKS: u32 = 60;
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Warned,
    Stopped,
    BackedUp,
    Applying,
    Starting,
    ApplyFailed,
    Restoring,
}

/// Whether `backup()` actually produced a restorable snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    Completed,
    /// No backup procedure configured.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub server_dir: PathBuf,
    pub backup_dir: Option<String>,
    pub backup_script: Option<String>,
    pub start_script: Option<String>,
    pub stop_poll_ticks: u32,
    pub stop_poll_interval: Duration,
}

impl LifecycleSettings {
    pub fn new(server_dir: PathBuf) -> Self {
        Self {
            server_dir,
            backup_dir: None,
            backup_script: None,
            start_script: None,
            stop_poll_ticks: STOP_POLL_TICKS,
            stop_poll_interval: STOP_POLL_INTERVAL,
        }
    }

    fn server_name(&self) -> String {
        self.server_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "server".to_string())
    }
}

/// Captured result of an external script.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn diagnostics(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Run `script` through `sh -c`, capturing output.
pub async fn run_script(script: &str) -> UpdaterResult<ScriptOutput> {
    debug!("Running shell command: {}", script);
    let output = Command::new("sh")
        .arg("-c")
        .arg(script)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| UpdaterError::io(PathBuf::from(script), e))?;

    Ok(ScriptOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

pub struct ServerController {
    channel: Option<Arc<dyn ControlChannel>>,
    settings: LifecycleSettings,
    state: LifecycleState,
}

impl ServerController {
    pub fn new(channel: Option<Arc<dyn ControlChannel>>, settings: LifecycleSettings) -> Self {
        Self {
            channel,
            settings,
            state: LifecycleState::Running,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn server_dir(&self) -> &Path {
        &self.settings.server_dir
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!("Server lifecycle {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Broadcast a restart notice and wait `delay` so players can log off.
    /// Does nothing without a live session; only waits if the title went out.
    pub async fn warn(&mut self, title: &str, subtitle: &str, delay: Duration) {
        let Some(channel) = self.channel.clone() else {
            info!("No server session configured; skipping warn/wait.");
            return;
        };
        if !channel.session_exists().await {
            info!("No active session {} for warnings; skipping warn/wait.", channel.session());
            return;
        }

        let sent_title = channel
            .send(&ServerCommand::BroadcastTitle(title.to_string()))
            .await;
        if !subtitle.is_empty() {
            channel
                .send(&ServerCommand::BroadcastSubtitle(subtitle.to_string()))
                .await;
        }
        channel
            .send(&ServerCommand::BroadcastChat(format!("{title} - {subtitle}")))
            .await;

        self.transition(LifecycleState::Warned);
        if sent_title && !delay.is_zero() {
            info!("Warned players; waiting {:?} before stop", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Ask the server to stop and wait (bounded) for its session to disappear.
    /// Outliving the wait is logged, not fatal.
    pub async fn stop(&mut self) {
        let Some(channel) = self.channel.clone() else {
            info!("No server session configured; assuming server is already stopped.");
            self.transition(LifecycleState::Stopped);
            return;
        };

        if !channel.send(&ServerCommand::Stop).await {
            warn!("Stop command not sent; server may already be down.");
            self.transition(LifecycleState::Stopped);
            return;
        }

        for _ in 0..self.settings.stop_poll_ticks {
            if !channel.session_exists().await {
                info!("Server session {} stopped.", channel.session());
                self.transition(LifecycleState::Stopped);
                return;
            }
            tokio::time::sleep(self.settings.stop_poll_interval).await;
        }

        warn!(
            "Server session {} still running after {} polls.",
            channel.session(),
            self.settings.stop_poll_ticks
        );
        self.transition(LifecycleState::Stopped);
    }

    pub async fn backup(&mut self) -> UpdaterResult<BackupOutcome> {
        let Some(script) = self.settings.backup_script.clone() else {
            info!("No backup_script configured; skipping backup.");
            return Ok(BackupOutcome::Skipped);
        };

        info!("Starting backup via: {}", script);
        let output = run_script(&script).await?;
        if !output.success() {
            return Err(ServerControlError::BackupFailed {
                code: output.code,
                output: output.diagnostics(),
            }
            .into());
        }

        info!("Backup script completed.");
        self.transition(LifecycleState::BackedUp);
        Ok(BackupOutcome::Completed)
    }

    pub fn mark_applying(&mut self) {
        self.transition(LifecycleState::Applying);
    }

    pub fn mark_apply_failed(&mut self) {
        self.transition(LifecycleState::ApplyFailed);
    }

    /// Run the start script. A failure is always returned to the caller.
    pub async fn start(&mut self) -> UpdaterResult<()> {
        let script = self
            .settings
            .start_script
            .clone()
            .ok_or(ServerControlError::StartNotConfigured)?;

        self.transition(LifecycleState::Starting);
        let output = run_script(&script).await?;
        if !output.stdout.trim().is_empty() {
            info!("Start script stdout: {}", output.stdout.trim());
        }
        if !output.stderr.trim().is_empty() {
            info!("Start script stderr: {}", output.stderr.trim());
        }
        if !output.success() {
            return Err(ServerControlError::StartFailed {
                code: output.code,
                output: output.diagnostics(),
            }
            .into());
        }

        self.transition(LifecycleState::Running);
        Ok(())
    }

    pub fn backup_dir(&self, override_dir: Option<&Path>) -> PathBuf {
        backup::resolve_backup_dir(
            override_dir,
            self.settings.backup_dir.as_deref(),
            &self.settings.server_name(),
        )
    }

    /// Clear the installation directory and unpack the newest backup archive into it.
    pub async fn restore_latest_backup(&mut self, override_dir: Option<&Path>) -> UpdaterResult<PathBuf> {
        self.transition(LifecycleState::Restoring);
        let backup_dir = self.backup_dir(override_dir);
        let server_dir = self.settings.server_dir.clone();

        let restored = tokio::task::spawn_blocking(move || backup::restore_latest(&backup_dir, &server_dir))
            .await
            .map_err(|e| ServerControlError::RestoreFailed {
                archive: PathBuf::new(),
                reason: e.to_string(),
            })??;

        self.transition(LifecycleState::Stopped);
        Ok(restored)
    }
}
