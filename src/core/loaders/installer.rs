use std::path::PathBuf;

use async_trait::async_trait;

use super::context::InstallContext;
use crate::core::error::UpdaterResult;

/// Platform runtime files an installer materialized in its work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformArtifacts {
    /// Launch jar that replaces the configured server jar.
    pub launch_jar: PathBuf,
    /// Support-library tree replacing `<server>/libraries` wholesale.
    pub libraries_dir: Option<PathBuf>,
    /// Vanilla runtime jar.
    pub runtime_jar: Option<PathBuf>,
    /// Launch configuration files copied next to the server jar.
    pub launch_config: Vec<PathBuf>,
}

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    async fn install(&self, ctx: InstallContext<'_>) -> UpdaterResult<PlatformArtifacts>;
}
