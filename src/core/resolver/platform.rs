use tracing::info;

use super::model::PlatformTarget;
use crate::core::config::StateRecord;
use crate::core::error::{ResolutionError, UpdaterResult};
use crate::core::registry::{PlatformVersion, VersionSource};

/// First entry flagged stable in listing order, else the first entry overall.
pub fn pick_stable_first(entries: &[PlatformVersion]) -> Option<&str> {
    entries
        .iter()
        .find(|e| e.stable)
        .or_else(|| entries.first())
        .map(|e| e.version.as_str())
}

/// Decide the game + loader versions for this run.
pub async fn resolve_platform_target(
    source: &dyn VersionSource,
    state: &StateRecord,
    requested_game_version: Option<&str>,
) -> UpdaterResult<PlatformTarget> {
    let game_versions = source.game_versions().await?;
    let loader_versions = source.loader_versions().await?;

    let target_game_version = match requested_game_version {
        Some(requested) => {
            if !game_versions.iter().any(|e| e.version == requested) {
                return Err(ResolutionError::UnknownGameVersion(requested.to_string()).into());
            }
            requested.to_string()
        }
        None => pick_stable_first(&game_versions)
            .ok_or(ResolutionError::EmptyPlatformListing("game"))?
            .to_string(),
    };

    let target_loader_version = pick_stable_first(&loader_versions)
        .ok_or(ResolutionError::EmptyPlatformListing("loader"))?
        .to_string();

    let needs_update = state.game_version != target_game_version
        || state.loader_version != target_loader_version;

    info!(
        "Platform target: game {} loader {} (current game {:?} loader {:?}, update: {})",
        target_game_version,
        target_loader_version,
        state.game_version,
        state.loader_version,
        needs_update
    );

    Ok(PlatformTarget {
        target_game_version,
        target_loader_version,
        current_game_version: state.game_version.clone(),
        current_loader_version: state.loader_version.clone(),
        needs_update,
    })
}
