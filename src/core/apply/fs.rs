// ─── Live Filesystem Ops ───
// Blocking helpers used once staging is complete.

use std::path::Path;

use tracing::{debug, warn};

use crate::core::error::{UpdaterError, UpdaterResult};

pub fn copy_dir_recursive(source: &Path, destination: &Path) -> UpdaterResult<()> {
    std::fs::create_dir_all(destination).map_err(|e| UpdaterError::io(destination, e))?;

    for entry in std::fs::read_dir(source).map_err(|e| UpdaterError::io(source, e))? {
        let entry = entry.map_err(|e| UpdaterError::io(source, e))?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| UpdaterError::io(&src_path, e))?;

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            std::fs::copy(&src_path, &dst_path).map_err(|e| UpdaterError::io(&dst_path, e))?;
        }
    }

    Ok(())
}

/// Replace `destination` wholesale with a copy of `source`.
pub fn replace_dir(source: &Path, destination: &Path) -> UpdaterResult<()> {
    if destination.exists() {
        std::fs::remove_dir_all(destination).map_err(|e| UpdaterError::io(destination, e))?;
    }
    copy_dir_recursive(source, destination)
}

/// Rename, falling back to copy + delete when the paths sit on different filesystems.
pub fn move_file(source: &Path, destination: &Path) -> UpdaterResult<()> {
    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    debug!("rename {:?} -> {:?} failed; copying instead", source, destination);
    std::fs::copy(source, destination).map_err(|e| UpdaterError::io(destination, e))?;
    std::fs::remove_file(source).map_err(|e| UpdaterError::io(source, e))?;
    Ok(())
}

/// Delete a file; failure is logged and reported as `false`.
pub fn remove_logged(path: &Path, what: &str) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to remove {} {:?}: {}", what, path, e);
            false
        }
    }
}
