// ─── State Store ───
// The `[state]` section lives inside the operator's config document.
// Commits rewrite only that section and leave everything else in place.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::config::StateRecord;
use crate::core::error::{UpdaterError, UpdaterResult};

const STATE_KEY: &str = "state";

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current record. A document without `[state]` yields the empty record.
    pub fn load(&self) -> UpdaterResult<StateRecord> {
        let doc = self.read_document()?;
        match doc.get(STATE_KEY) {
            Some(value) => Ok(value.clone().try_into::<StateRecord>()?),
            None => Ok(StateRecord::default()),
        }
    }

    /// Replace the persisted record with `record`.
    ///
    /// The document is rewritten through a sibling temp file and a rename, so a
    /// crash leaves either the old or the new document on disk.
    pub fn commit(&self, record: &StateRecord) -> UpdaterResult<()> {
        let mut doc = if self.path.exists() {
            self.read_document()?
        } else {
            toml::Table::new()
        };

        doc.insert(STATE_KEY.to_string(), toml::Value::try_from(record)?);
        let rendered = toml::to_string_pretty(&doc)?;

        let tmp = self.temp_path();
        std::fs::write(&tmp, rendered).map_err(|e| UpdaterError::io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(UpdaterError::io(&self.path, e));
        }

        info!(
            "Recorded state: game {} / loader {} / {} mods",
            record.game_version,
            record.loader_version,
            record.mods.len()
        );
        Ok(())
    }

    fn read_document(&self) -> UpdaterResult<toml::Table> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| UpdaterError::io(&self.path, e))?;
        debug!("Read state document {:?} ({} bytes)", self.path, raw.len());
        Ok(raw.parse::<toml::Table>()?)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "config.toml".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}
