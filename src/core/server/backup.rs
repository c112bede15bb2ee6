// ─── Backup Restore ───
// Archives are `*.tar.gz` snapshots of the installation directory written
// by the operator's backup script. "Latest" means newest mtime.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::core::config::expand_home;
use crate::core::error::{ServerControlError, UpdaterError, UpdaterResult};

pub const ARCHIVE_SUFFIX: &str = ".tar.gz";
const FALLBACK_BACKUP_ROOT: &str = "~/mc_backups";

/// Explicit override, else the configured directory, else `~/mc_backups/<server name>`.
pub fn resolve_backup_dir(
    override_dir: Option<&Path>,
    configured: Option<&str>,
    server_name: &str,
) -> PathBuf {
    if let Some(dir) = override_dir {
        return expand_home(&dir.to_string_lossy());
    }
    match configured.map(str::trim).filter(|c| !c.is_empty()) {
        Some(dir) => expand_home(dir),
        None => expand_home(FALLBACK_BACKUP_ROOT).join(server_name),
    }
}

/// Most recently modified archive in `backup_dir`. Equal mtimes fall back to
/// the lexicographically greatest name, since archive names embed a sortable
/// timestamp.
pub fn latest_archive(backup_dir: &Path) -> UpdaterResult<PathBuf> {
    if !backup_dir.is_dir() {
        return Err(ServerControlError::NoBackupDir(backup_dir.to_path_buf()).into());
    }

    let mut newest: Option<(SystemTime, String, PathBuf)> = None;
    let entries = std::fs::read_dir(backup_dir).map_err(|e| UpdaterError::io(backup_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| UpdaterError::io(backup_dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(ARCHIVE_SUFFIX) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| UpdaterError::io(entry.path(), e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let key = (modified, name);
        if newest
            .as_ref()
            .map_or(true, |(time, n, _)| key > (*time, n.clone()))
        {
            newest = Some((key.0, key.1, entry.path()));
        }
    }

    newest
        .map(|(_, _, path)| path)
        .ok_or_else(|| ServerControlError::NoBackupFound(backup_dir.to_path_buf()).into())
}

/// Remove everything inside `dir` but keep `dir` itself.
pub fn clear_dir_contents(dir: &Path) -> UpdaterResult<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir).map_err(|e| UpdaterError::io(dir, e))?;
        return Ok(());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| UpdaterError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| UpdaterError::io(dir, e))?;
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let removed = if is_dir {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(e) = removed {
            warn!("Failed to remove {:?} during restore: {}", path, e);
        }
    }
    Ok(())
}

pub fn extract_archive(archive: &Path, dest: &Path) -> UpdaterResult<()> {
    let restore_failed = |reason: String| ServerControlError::RestoreFailed {
        archive: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive).map_err(|e| restore_failed(e.to_string()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| restore_failed(e.to_string()))?;
    Ok(())
}

/// Replace the contents of `server_dir` with the newest archive in `backup_dir`.
/// Returns the archive that was restored.
pub fn restore_latest(backup_dir: &Path, server_dir: &Path) -> UpdaterResult<PathBuf> {
    let latest = latest_archive(backup_dir)?;
    info!("Restoring backup from {:?}", latest);

    clear_dir_contents(server_dir)?;
    extract_archive(&latest, server_dir)?;

    info!("Restored {:?} into {:?}", latest, server_dir);
    Ok(latest)
}
