// ─── Staging ───
// A private scratch directory next to the live installation holding
// verified-but-not-yet-live artifacts for exactly one apply attempt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::downloader::{Downloader, StagedArtifact};
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::resolver::VersionCandidate;

const STAGING_PREFIX: &str = "staging_";

/// Exclusively owned staging directory. Removed by [`StagingArea::close`], or
/// on drop if the owner unwinds without closing it.
#[derive(Debug)]
pub struct StagingArea {
    base_dir: PathBuf,
    released: bool,
}

impl StagingArea {
    /// Create a uniquely named directory under `parent_dir`. Staging beside the
    /// installation keeps staged files on the destination filesystem so they
    /// can be renamed into place.
    pub async fn open(parent_dir: &Path) -> UpdaterResult<Self> {
        tokio::fs::create_dir_all(parent_dir)
            .await
            .map_err(|e| UpdaterError::io(parent_dir, e))?;

        let base_dir = parent_dir.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4().simple()));
        tokio::fs::create_dir(&base_dir)
            .await
            .map_err(|e| UpdaterError::io(&base_dir, e))?;

        info!("Opened staging area {:?}", base_dir);
        Ok(Self {
            base_dir,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.base_dir
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(relative)
    }

    /// Recursively remove the directory. Failures are logged, never returned,
    /// so cleanup cannot mask the error that ended the transaction.
    pub async fn close(mut self) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.base_dir).await {
            Ok(()) => debug!("Removed staging area {:?}", self.base_dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staging area {:?}: {}", self.base_dir, e),
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.base_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staging area {:?}: {}", self.base_dir, e);
            }
        }
    }
}

/// Downloads into a [`StagingArea`], de-duplicating by destination path.
pub struct StagingTransaction<'a> {
    area: StagingArea,
    downloader: &'a Downloader,
    staged: HashMap<PathBuf, StagedArtifact>,
}

impl<'a> StagingTransaction<'a> {
    pub async fn open(parent_dir: &Path, downloader: &'a Downloader) -> UpdaterResult<Self> {
        Ok(Self {
            area: StagingArea::open(parent_dir).await?,
            downloader,
            staged: HashMap::new(),
        })
    }

    pub fn area(&self) -> &StagingArea {
        &self.area
    }

    /// Download and verify `candidate` to `relative` inside the staging area.
    /// A destination already staged in this transaction is reused as is.
    pub async fn download(
        &mut self,
        relative: impl AsRef<Path>,
        candidate: &VersionCandidate,
    ) -> UpdaterResult<StagedArtifact> {
        let dest = self.area.join(relative);
        if let Some(existing) = self.staged.get(&dest) {
            debug!("Already staged {:?}; reusing", dest);
            return Ok(existing.clone());
        }

        let artifact = self
            .downloader
            .download_file(&candidate.download_url, &dest, Some(&candidate.content_hash))
            .await?;
        self.staged.insert(dest, artifact.clone());
        Ok(artifact)
    }

    /// Fetch a support file (e.g. a loader installer) that has no registry hash.
    pub async fn fetch(&mut self, relative: impl AsRef<Path>, url: &str) -> UpdaterResult<StagedArtifact> {
        let dest = self.area.join(relative);
        let artifact = self.downloader.download_file(url, &dest, None).await?;
        self.staged.insert(dest, artifact.clone());
        Ok(artifact)
    }

    pub async fn close(self) {
        self.area.close().await;
    }
}
