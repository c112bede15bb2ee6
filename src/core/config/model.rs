use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Server/environment settings (`[environment]`, legacy `[server]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    pub server_dir: PathBuf,
    #[serde(default = "default_mods_dir")]
    pub mods_dir: PathBuf,
    pub server_jar: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    #[serde(default)]
    pub screen_session: String,
    #[serde(default)]
    pub backup_script: String,
    #[serde(default)]
    pub start_script: String,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_java_cmd")]
    pub java_cmd: String,
    #[serde(default = "default_world_dir")]
    pub world_dir: PathBuf,
}

/// Behavior toggles (`[options]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsSettings {
    #[serde(default)]
    pub assume_yes: bool,
    #[serde(default = "default_true")]
    pub auto_backup: bool,
    #[serde(default)]
    pub warn_players: bool,
    #[serde(default = "default_warn_delay")]
    pub warn_delay_seconds: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

impl Default for OptionsSettings {
    fn default() -> Self {
        Self {
            assume_yes: false,
            auto_backup: true,
            warn_players: false,
            warn_delay_seconds: default_warn_delay(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

/// Last applied platform + declared package versions (`[state]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(default, rename = "mc_version")]
    pub game_version: String,
    #[serde(default, alias = "server_version")]
    pub loader_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    /// package_id → applied version. Auto-added dependencies are never recorded.
    #[serde(default)]
    pub mods: IndexMap<String, String>,
}

/// The whole configuration document.
///
/// Paths are absolute after [`UpdaterConfig::load`]; relative `mods_dir` and
/// `world_dir` are anchored at `server_dir`.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub environment: EnvironmentSettings,
    pub options: OptionsSettings,
    pub mods: IndexMap<String, String>,
    pub datapacks: IndexMap<String, String>,
    pub state: StateRecord,
    pub config_path: PathBuf,
}

impl UpdaterConfig {
    pub fn server_dir(&self) -> &Path {
        &self.environment.server_dir
    }

    pub fn mods_dir(&self) -> &Path {
        &self.environment.mods_dir
    }

    pub fn datapacks_dir(&self) -> PathBuf {
        self.environment.world_dir.join("datapacks")
    }

    pub fn server_jar_path(&self) -> PathBuf {
        self.environment.server_dir.join(&self.environment.server_jar)
    }

    pub fn warn_delay(&self) -> Duration {
        Duration::from_secs(self.options.warn_delay_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.options.http_timeout_seconds)
    }

    /// Name used for the conventional per-installation backup fallback.
    pub fn server_name(&self) -> String {
        self.environment
            .server_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "server".to_string())
    }
}

fn default_mods_dir() -> PathBuf {
    PathBuf::from("mods")
}

fn default_backup_dir() -> String {
    "~/mc_backups".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("server-update.log")
}

fn default_java_cmd() -> String {
    "java".to_string()
}

fn default_world_dir() -> PathBuf {
    PathBuf::from("world")
}

fn default_true() -> bool {
    true
}

fn default_warn_delay() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    20
}
