// ─── Config Loader ───
// Reads the TOML document, anchors relative paths and validates the
// environment before any network or filesystem work starts.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use super::model::{EnvironmentSettings, OptionsSettings, StateRecord, UpdaterConfig};
use crate::core::error::{UpdaterError, UpdaterResult};

#[derive(Debug, Deserialize)]
struct RawDocument {
    environment: Option<EnvironmentSettings>,
    /// Legacy name of `[environment]`.
    server: Option<EnvironmentSettings>,
    #[serde(default)]
    options: OptionsSettings,
    #[serde(default)]
    mods: IndexMap<String, String>,
    #[serde(default)]
    datapacks: IndexMap<String, String>,
    #[serde(default)]
    state: StateRecord,
}

impl UpdaterConfig {
    /// Load the configuration document at `path`.
    ///
    /// `cli_assume_yes` ORs into `[options].assume_yes`.
    pub fn load(path: &Path, cli_assume_yes: bool) -> UpdaterResult<Self> {
        if !path.is_file() {
            return Err(UpdaterError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| UpdaterError::io(path, e))?;
        Self::parse(&raw, path, cli_assume_yes)
    }

    pub fn parse(raw: &str, path: &Path, cli_assume_yes: bool) -> UpdaterResult<Self> {
        let doc: RawDocument = toml::from_str(raw)?;

        let mut environment = doc.environment.or(doc.server).ok_or_else(|| {
            UpdaterError::Config("Missing [environment] (or legacy [server]) section".into())
        })?;

        if environment.server_dir.as_os_str().is_empty() {
            return Err(UpdaterError::Config(
                "server_dir is required in [environment]".into(),
            ));
        }
        if environment.server_jar.trim().is_empty() {
            return Err(UpdaterError::Config(
                "server_jar is required in [environment]".into(),
            ));
        }

        environment.server_dir = expand_home(&environment.server_dir.to_string_lossy());
        if environment.mods_dir.is_relative() {
            environment.mods_dir = environment.server_dir.join(&environment.mods_dir);
        }
        if environment.world_dir.is_relative() {
            environment.world_dir = environment.server_dir.join(&environment.world_dir);
        }

        let mut options = doc.options;
        options.assume_yes |= cli_assume_yes;

        let mods = clean_ids(doc.mods);
        let datapacks = clean_ids(doc.datapacks);

        debug!(
            "Loaded config {:?}: {} mods, {} datapacks",
            path,
            mods.len(),
            datapacks.len()
        );

        Ok(Self {
            environment,
            options,
            mods,
            datapacks,
            state: doc.state,
            config_path: path.to_path_buf(),
        })
    }

    /// Check that the installation and the external tools the run depends on exist.
    /// Every problem is reported at once.
    pub fn validate(&self) -> UpdaterResult<()> {
        let mut errors = Vec::new();
        let env = &self.environment;

        if !env.server_dir.is_dir() {
            errors.push(format!("server_dir does not exist: {}", env.server_dir.display()));
        }
        if !env.mods_dir.is_dir() {
            errors.push(format!("mods_dir does not exist: {}", env.mods_dir.display()));
        }
        for (key, script) in [
            ("backup_script", &env.backup_script),
            ("start_script", &env.start_script),
        ] {
            if let Some(program) = script_program(script) {
                if !Path::new(program).exists() && find_on_path(program).is_none() {
                    errors.push(format!("{key} not found: {program}"));
                }
            }
        }
        if find_on_path(&env.java_cmd).is_none() && !Path::new(&env.java_cmd).is_file() {
            errors.push(format!(
                "{} not found on PATH (required for the Fabric installer)",
                env.java_cmd
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(UpdaterError::Config(format!(
                "Config validation failed:\n- {}",
                errors.join("\n- ")
            )))
        }
    }
}

fn clean_ids(map: IndexMap<String, String>) -> IndexMap<String, String> {
    map.into_iter()
        .filter_map(|(id, name)| {
            let id = id.trim().to_string();
            if id.is_empty() {
                None
            } else {
                Some((id, name.trim().to_string()))
            }
        })
        .collect()
}

fn script_program(script: &str) -> Option<&str> {
    script.split_whitespace().next()
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Locate an executable by name on `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        return path.is_file().then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
