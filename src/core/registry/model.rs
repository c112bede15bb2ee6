use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One entry of a Fabric meta listing (game, loader or installer versions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVersion {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

impl PlatformVersion {
    pub fn new(version: &str, stable: bool) -> Self {
        Self {
            version: version.to_string(),
            stable,
        }
    }
}

/// A single version of a Modrinth project, newest-first in listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryVersion {
    #[serde(default)]
    pub version_number: String,
    #[serde(default)]
    pub version_type: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub files: Vec<RegistryFile>,
    #[serde(default)]
    pub dependencies: Vec<RegistryDependency>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub hashes: HashMap<String, String>,
}

impl RegistryFile {
    pub fn sha1(&self) -> Option<&str> {
        self.hashes
            .get("sha1")
            .map(String::as_str)
            .filter(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDependency {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub dependency_type: String,
}

impl RegistryDependency {
    pub fn is_required(&self) -> bool {
        self.dependency_type == "required"
    }
}

/// How a search request narrows its hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Free-text relevance search.
    Text(String),
    /// Exact match on the project slug.
    Slug(String),
    /// Exact match on the project id.
    ProjectId(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectResponse {
    #[serde(default)]
    pub title: Option<String>,
}

/// Server-side narrowing of a version listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionFilter {
    /// Only versions built for this loader.
    Loader(String),
    /// Only versions declaring support for this game version.
    GameVersion(String),
    /// Everything.
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_registry_version_with_missing_fields() {
        let json = r#"{
            "version_number": "2.0.0",
            "version_type": "release",
            "game_versions": ["1.21.8"],
            "loaders": ["fabric"],
            "files": [{"url": "https://cdn/a.jar", "hashes": {"sha1": "aaa", "sha512": "zzz"}}],
            "dependencies": [{"project_id": "P7dR8mSH", "dependency_type": "required"},
                             {"dependency_type": "optional"}]
        }"#;
        let v: RegistryVersion = serde_json::from_str(json).unwrap();
        assert_eq!(v.files[0].sha1(), Some("aaa"));
        assert!(v.dependencies[0].is_required());
        assert!(v.dependencies[1].project_id.is_none());
    }

    #[test]
    fn empty_sha1_is_not_a_hash() {
        let file = RegistryFile {
            url: "u".into(),
            filename: None,
            hashes: HashMap::from([("sha1".to_string(), String::new())]),
        };
        assert_eq!(file.sha1(), None);
    }
}
