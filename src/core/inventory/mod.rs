// ─── Inventory ───
// Read-only classification of the live plugin directory against the
// declared package set. Matching is substring based and first-match-wins
// in declaration order; which file counts as canonical depends on it.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::core::error::{FilesystemError, UpdaterError, UpdaterResult};

pub const MOD_ARCHIVE_EXTENSION: &str = "jar";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    /// `None` marks an unexpected artifact.
    pub package_id: Option<String>,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InventoryResult {
    /// package_id → authoritative on-disk file, in declaration order.
    pub matched: IndexMap<String, InventoryEntry>,
    pub missing: Vec<String>,
    pub unexpected: Vec<InventoryEntry>,
}

impl InventoryResult {
    pub fn is_present(&self, package_id: &str) -> bool {
        self.matched.contains_key(package_id)
    }
}

/// Lowercase and replace spaces with hyphens.
pub fn normalize_token(value: &str) -> String {
    value.trim().to_lowercase().replace(' ', "-")
}

/// First id (in the given order) whose normalized form is contained in `filename`.
pub fn infer_package_id<'a, I>(filename: &str, package_ids: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let haystack = filename.to_lowercase();
    package_ids.into_iter().find(|id| {
        let needle = normalize_token(id);
        !needle.is_empty() && haystack.contains(&needle)
    })
}

/// Classify every `.jar` in `plugin_dir` as matched, unexpected or missing.
pub fn scan<'a, I>(plugin_dir: &Path, declared_packages: I) -> UpdaterResult<InventoryResult>
where
    I: IntoIterator<Item = &'a str>,
{
    if !plugin_dir.is_dir() {
        return Err(FilesystemError::NotFound(plugin_dir.to_path_buf()).into());
    }
    let declared: Vec<&str> = declared_packages.into_iter().collect();

    let mut files = Vec::new();
    let entries = std::fs::read_dir(plugin_dir).map_err(|e| UpdaterError::io(plugin_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| UpdaterError::io(plugin_dir, e))?;
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().to_string();
        if !is_archive(&filename) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| UpdaterError::io(&path, e))?;
        if !metadata.is_file() {
            continue;
        }
        files.push((filename, path, metadata.len()));
    }
    // read_dir order is unspecified; sort so "first match" is reproducible.
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut result = InventoryResult::default();
    for (filename, path, size) in files {
        match infer_package_id(&filename, declared.iter().copied()) {
            Some(id) if !result.matched.contains_key(id) => {
                debug!("Inventory: {} -> {}", filename, id);
                result.matched.insert(
                    id.to_string(),
                    InventoryEntry {
                        package_id: Some(id.to_string()),
                        filename,
                        path,
                        size,
                    },
                );
            }
            other => {
                if let Some(id) = other {
                    debug!("Inventory: duplicate {} for {}", filename, id);
                }
                result.unexpected.push(InventoryEntry {
                    package_id: None,
                    filename,
                    path,
                    size,
                });
            }
        }
    }

    result.missing = declared
        .iter()
        .filter(|id| !result.matched.contains_key(**id))
        .map(|id| id.to_string())
        .collect();

    Ok(result)
}

fn is_archive(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(MOD_ARCHIVE_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"jar").unwrap();
    }

    #[test]
    fn classifies_matched_missing_and_unexpected() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "fabric-api-0.129.0+1.21.8.jar");
        touch(tmp.path(), "Lithium-fabric-0.18.0.jar");
        touch(tmp.path(), "random-mod.jar");
        touch(tmp.path(), "README.txt");

        let inv = scan(tmp.path(), ["fabric-api", "lithium", "sodium"]).unwrap();

        assert_eq!(
            inv.matched["fabric-api"].filename,
            "fabric-api-0.129.0+1.21.8.jar"
        );
        assert_eq!(inv.matched["lithium"].size, 3);
        assert_eq!(inv.missing, vec!["sodium"]);
        assert_eq!(inv.unexpected.len(), 1);
        assert_eq!(inv.unexpected[0].filename, "random-mod.jar");
        assert!(inv.unexpected[0].package_id.is_none());
    }

    #[test]
    fn second_match_for_same_package_is_unexpected() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "lithium-0.17.0.jar");
        touch(tmp.path(), "lithium-0.18.0.jar");

        let inv = scan(tmp.path(), ["lithium"]).unwrap();

        assert_eq!(inv.matched["lithium"].filename, "lithium-0.17.0.jar");
        assert_eq!(inv.unexpected.len(), 1);
        assert_eq!(inv.unexpected[0].filename, "lithium-0.18.0.jar");
    }

    #[test]
    fn first_declared_id_wins_and_spaces_become_hyphens() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "Mod_Menu-mod-menu-11.0.jar");

        let inv = scan(tmp.path(), ["mod menu", "menu"]).unwrap();

        assert!(inv.is_present("mod menu"));
        assert_eq!(inv.missing, vec!["menu"]);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let err = scan(Path::new("/definitely/not/here"), ["x"]).unwrap_err();
        assert!(matches!(
            err,
            UpdaterError::Filesystem(FilesystemError::NotFound(_))
        ));
    }
}
