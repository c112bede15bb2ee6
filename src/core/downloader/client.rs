use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::error::{DownloadError, UpdaterError, UpdaterResult};

/// A file fully written and (optionally) verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub path: PathBuf,
    pub size: u64,
    pub sha1: String,
}

/// Streaming, SHA-1 validated downloader.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Stream `url` into `dest`, hashing as bytes arrive.
    ///
    /// On transport failure or hash mismatch the partial/unverified file is
    /// removed before the error is returned, so `dest` only ever holds a
    /// complete, verified artifact.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> UpdaterResult<StagedArtifact> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdaterError::io(parent, e))?;
        }

        info!("Downloading {} -> {:?}", url, dest);

        let (size, actual) = match self.stream_to(url, dest).await {
            Ok(done) => done,
            Err(e) => {
                remove_partial(dest).await;
                return Err(e);
            }
        };

        if let Some(expected) = sha1_expected {
            if !actual.eq_ignore_ascii_case(expected) {
                remove_partial(dest).await;
                return Err(DownloadError::IntegrityMismatch {
                    url: url.to_string(),
                    expected: expected.to_string(),
                    actual,
                }
                .into());
            }
        }

        debug!("Downloaded: {} ({} bytes, sha1 {})", url, size, actual);
        Ok(StagedArtifact {
            path: dest.to_path_buf(),
            size,
            sha1: actual,
        })
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> UpdaterResult<(u64, String)> {
        let transport = |reason: String| DownloadError::Transport {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport(format!("HTTP {}", status.as_u16())).into());
        }

        let mut hasher = Sha1::new();
        let mut size = 0u64;

        // Scope the handle so it is closed before the caller renames the file.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| UpdaterError::io(dest, e))?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| transport(e.to_string()))?;
                hasher.update(&chunk);
                size += chunk.len() as u64;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| UpdaterError::io(dest, e))?;
            }
            file.flush().await.map_err(|e| UpdaterError::io(dest, e))?;
        }

        Ok((size, hex::encode(hasher.finalize())))
    }
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!("Removed partial download {:?}", dest),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial download {:?}: {}", dest, e),
    }
}

/// Hex SHA-1 of a byte slice.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
