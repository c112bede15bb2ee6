use serde::{Deserialize, Serialize};

use crate::core::inventory::normalize_token;

/// Game + loader versions the installation should run, decided once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTarget {
    pub target_game_version: String,
    pub target_loader_version: String,
    pub current_game_version: String,
    pub current_loader_version: String,
    pub needs_update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub package_id: String,
    pub display_name: String,
    /// Explicitly configured, as opposed to pulled in as a dependency.
    pub declared: bool,
}

/// Registry release channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStability {
    Unknown,
    Alpha,
    Beta,
    Release,
}

impl VersionStability {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("release") => Self::Release,
            Some("beta") => Self::Beta,
            Some("alpha") => Self::Alpha,
            _ => Self::Unknown,
        }
    }

    /// Tie-break rank: release > beta > alpha > anything else.
    pub fn rank(self) -> u8 {
        match self {
            Self::Release => 3,
            Self::Beta => 2,
            Self::Alpha => 1,
            Self::Unknown => 0,
        }
    }
}

impl std::fmt::Display for VersionStability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionStability::Release => write!(f, "release"),
            VersionStability::Beta => write!(f, "beta"),
            VersionStability::Alpha => write!(f, "alpha"),
            VersionStability::Unknown => write!(f, "unknown"),
        }
    }
}

/// A concrete, downloadable package version. `content_hash` is always a SHA-1
/// hex digest; candidates without one never get constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCandidate {
    pub package_id: String,
    pub version_label: String,
    pub stability: VersionStability,
    pub supported_game_versions: Vec<String>,
    pub download_url: String,
    pub content_hash: String,
    pub required_dependencies: Vec<String>,
}

impl VersionCandidate {
    pub fn supports(&self, game_version: &str) -> bool {
        self.supported_game_versions.iter().any(|v| v == game_version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub descriptor: PackageDescriptor,
    pub candidate: VersionCandidate,
    /// Target game version is in the candidate's supported set. Advisory only.
    pub compatible: bool,
    /// Version recorded by the last successful apply, if any.
    pub current_version: Option<String>,
}

impl ResolvedPackage {
    pub fn package_id(&self) -> &str {
        &self.descriptor.package_id
    }

    pub fn is_auto_added(&self) -> bool {
        !self.descriptor.declared
    }

    /// Staged filename: `<display name, spaces→_>_<version>.<ext>`, prefixed
    /// with the normalized package id when the name alone would not contain it,
    /// so the next inventory scan recognizes the file as this package.
    pub fn artifact_file_name(&self, extension: &str) -> String {
        let base = format!(
            "{}_{}",
            self.descriptor.display_name.replace(' ', "_"),
            self.candidate.version_label
        )
        .replace(['/', '\\'], "_");
        let id_token = normalize_token(&self.descriptor.package_id);
        if base.to_lowercase().contains(&id_token) {
            format!("{base}.{extension}")
        } else {
            format!("{id_token}_{base}.{extension}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub platform: PlatformTarget,
    /// Dependency-closed mod set in resolution (BFS) order.
    pub mods: Vec<ResolvedPackage>,
    pub datapacks: Vec<ResolvedPackage>,
}

impl ResolutionResult {
    /// Mods and datapacks whose chosen version does not list the target game version.
    pub fn incompatible(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.mods.iter().chain(&self.datapacks).filter(|p| !p.compatible)
    }

    pub fn has_incompatible(&self) -> bool {
        self.incompatible().next().is_some()
    }

    pub fn resolved_ids(&self) -> impl Iterator<Item = &str> {
        self.mods.iter().map(ResolvedPackage::package_id)
    }
}
