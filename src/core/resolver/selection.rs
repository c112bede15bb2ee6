// ─── Candidate Selection ───
// Picks one registry version per package for the target game version.
// Listings arrive newest first; "most recent" always means the earliest index.

use super::model::{VersionCandidate, VersionStability};
use crate::core::error::{ResolutionError, UpdaterResult};
use crate::core::registry::RegistryVersion;

/// Choose the best mod version for `target_game_version`:
///
/// 1. newest release supporting the target,
/// 2. else newest version of any stability supporting the target,
/// 3. else among loader-compatible versions, the greatest
///    (newest supported game version, stability rank) pair,
/// 4. else the first entry of the unfiltered listing.
pub fn select_mod_version<'a>(
    versions: &'a [RegistryVersion],
    target_game_version: &str,
    loader: &str,
) -> Option<&'a RegistryVersion> {
    let for_loader = |v: &&RegistryVersion| v.loaders.iter().any(|l| l == loader);
    let supports_target = |v: &&RegistryVersion| v.game_versions.iter().any(|g| g == target_game_version);

    if let Some(release) = versions
        .iter()
        .filter(for_loader)
        .filter(supports_target)
        .find(|v| VersionStability::parse(v.version_type.as_deref()) == VersionStability::Release)
    {
        return Some(release);
    }

    if let Some(any) = versions.iter().filter(for_loader).find(supports_target) {
        return Some(any);
    }

    let mut best: Option<(&RegistryVersion, (Vec<u64>, u8))> = None;
    for version in versions.iter().filter(for_loader) {
        let key = (
            newest_game_version_tuple(&version.game_versions),
            VersionStability::parse(version.version_type.as_deref()).rank(),
        );
        // Strictly greater keeps the most recent entry on ties.
        if best.as_ref().map_or(true, |(_, best_key)| key > *best_key) {
            best = Some((version, key));
        }
    }

    best.map(|(v, _)| v).or_else(|| versions.first())
}

/// Numeric components of a version label; `"1.21.8-pre1"` → `[1, 21, 8, 1]`.
pub fn game_version_tuple(version: &str) -> Vec<u64> {
    let nums: Vec<u64> = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<u64>().ok())
        .collect();
    if nums.is_empty() {
        vec![0]
    } else {
        nums
    }
}

fn newest_game_version_tuple(game_versions: &[String]) -> Vec<u64> {
    game_versions
        .iter()
        .map(|v| game_version_tuple(v))
        .max()
        .unwrap_or_else(|| vec![0])
}

/// Turn a registry version into a candidate, taking the first file that
/// carries both a URL and a SHA-1. Without one the package cannot be verified.
pub fn into_candidate(package_id: &str, version: &RegistryVersion) -> UpdaterResult<VersionCandidate> {
    let file = version
        .files
        .iter()
        .find(|f| !f.url.is_empty() && f.sha1().is_some())
        .ok_or_else(|| ResolutionError::MissingIntegrityHash(package_id.to_string()))?;

    let content_hash = file
        .sha1()
        .ok_or_else(|| ResolutionError::MissingIntegrityHash(package_id.to_string()))?
        .to_ascii_lowercase();

    let required_dependencies = version
        .dependencies
        .iter()
        .filter(|d| d.is_required())
        .filter_map(|d| d.project_id.clone())
        .filter(|id| !id.is_empty())
        .collect();

    Ok(VersionCandidate {
        package_id: package_id.to_string(),
        version_label: version.version_number.clone(),
        stability: VersionStability::parse(version.version_type.as_deref()),
        supported_game_versions: version.game_versions.clone(),
        download_url: file.url.clone(),
        content_hash,
        required_dependencies,
    })
}
