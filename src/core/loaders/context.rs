use std::path::Path;

use crate::core::downloader::Downloader;

/// Everything a loader installer needs for one run.
pub struct InstallContext<'a> {
    pub game_version: &'a str,
    pub loader_version: &'a str,
    /// Directory inside the staging area the installer may write into.
    pub work_dir: &'a Path,
    pub java_cmd: &'a str,
    pub downloader: &'a Downloader,
}
