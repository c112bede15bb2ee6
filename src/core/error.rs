use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning the declared package set into concrete versions.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Requested game version {0} not found in platform metadata")]
    UnknownGameVersion(String),

    #[error("Platform metadata returned no {0} versions")]
    EmptyPlatformListing(&'static str),

    #[error("Package '{0}' not found in the registry")]
    PackageNotFound(String),

    #[error("No versions found in the registry for {0}")]
    NoCompatibleVersion(String),

    #[error("No downloadable file with a SHA-1 hash for {0}")]
    MissingIntegrityHash(String),
}

/// Failures while streaming an artifact into the staging area.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Failed to download {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("SHA-1 mismatch for {url}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

/// Failures raised by the server lifecycle controller.
#[derive(Debug, Error)]
pub enum ServerControlError {
    #[error("Backup script failed with exit {code:?}: {output}")]
    BackupFailed { code: Option<i32>, output: String },

    #[error("start_script is not configured")]
    StartNotConfigured,

    #[error("Start script failed with exit {code:?}: {output}")]
    StartFailed { code: Option<i32>, output: String },

    #[error("Failed to restore backup {archive:?}: {reason}")]
    RestoreFailed { archive: PathBuf, reason: String },

    #[error("No backup directory found at {0:?}")]
    NoBackupDir(PathBuf),

    #[error("No backups found in {0:?}")]
    NoBackupFound(PathBuf),
}

#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("Directory does not exist: {0:?}")]
    NotFound(PathBuf),
}

/// Central error type for the updater.
/// Every module returns `Result<T, UpdaterError>`.
#[derive(Debug, Error)]
pub enum UpdaterError {
    // ── Taxonomy ────────────────────────────────────────
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    ServerControl(#[from] ServerControlError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error("Apply aborted: {0}")]
    ApplyAborted(String),

    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed: HTTP {status}")]
    RequestFailed { url: String, status: u16 },

    // ── Serialization ───────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    // ── Configuration ───────────────────────────────────
    #[error("Config error: {0}")]
    Config(String),

    // ── Loader ──────────────────────────────────────────
    #[error("Loader installer error: {0}")]
    Installer(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// Convenience alias used throughout the crate.
pub type UpdaterResult<T> = Result<T, UpdaterError>;

impl UpdaterError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for UpdaterError {
    fn from(source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_errors_render_through_the_crate_error() {
        let err: UpdaterError = ResolutionError::PackageNotFound("sodium".into()).into();
        assert_eq!(err.to_string(), "Package 'sodium' not found in the registry");

        let err: UpdaterError = DownloadError::IntegrityMismatch {
            url: "https://cdn/x.jar".into(),
            expected: "aaa".into(),
            actual: "bbb".into(),
        }
        .into();
        assert!(matches!(
            err,
            UpdaterError::Download(DownloadError::IntegrityMismatch { .. })
        ));
    }
}
