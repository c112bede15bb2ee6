// ─── Version Resolver ───
// Turns the declared mod/datapack set into a dependency-closed set of
// concrete, hash-verified versions plus the platform target decision.

pub mod model;
pub mod platform;
pub mod selection;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

pub use model::{
    PackageDescriptor, PlatformTarget, ResolutionResult, ResolvedPackage, VersionCandidate,
    VersionStability,
};
pub use platform::{pick_stable_first, resolve_platform_target};
pub use selection::{game_version_tuple, into_candidate, select_mod_version};

use crate::core::config::StateRecord;
use crate::core::error::{ResolutionError, UpdaterResult};
use crate::core::registry::{RegistryVersion, SearchQuery, VersionFilter, VersionSource};

pub const FABRIC_LOADER: &str = "fabric";

pub struct VersionResolver {
    source: Arc<dyn VersionSource>,
    loader: String,
}

impl VersionResolver {
    pub fn new(source: Arc<dyn VersionSource>) -> Self {
        Self {
            source,
            loader: FABRIC_LOADER.to_string(),
        }
    }

    /// Resolve the platform target, every declared mod with its required
    /// dependencies (breadth first), and every declared datapack.
    pub async fn resolve(
        &self,
        declared_mods: &IndexMap<String, String>,
        declared_datapacks: &IndexMap<String, String>,
        state: &StateRecord,
        target_game_version: Option<&str>,
    ) -> UpdaterResult<ResolutionResult> {
        let platform =
            resolve_platform_target(self.source.as_ref(), state, target_game_version).await?;
        let target = platform.target_game_version.as_str();

        let mods = self.resolve_mods(declared_mods, state, target).await?;
        let datapacks = self.resolve_datapacks(declared_datapacks, target).await?;

        info!(
            "Resolved {} mods ({} auto-added) and {} datapacks",
            mods.len(),
            mods.iter().filter(|m| m.is_auto_added()).count(),
            datapacks.len()
        );

        Ok(ResolutionResult {
            platform,
            mods,
            datapacks,
        })
    }

    async fn resolve_mods(
        &self,
        declared: &IndexMap<String, String>,
        state: &StateRecord,
        target: &str,
    ) -> UpdaterResult<Vec<ResolvedPackage>> {
        let mut queue: VecDeque<PackageDescriptor> = declared
            .iter()
            .map(|(id, name)| PackageDescriptor {
                package_id: id.clone(),
                display_name: name.clone(),
                declared: true,
            })
            .collect();
        let mut enqueued: HashSet<String> = declared.keys().cloned().collect();
        let mut visited: HashSet<String> = HashSet::new();
        let mut resolved = Vec::new();

        while let Some(descriptor) = queue.pop_front() {
            if !visited.insert(descriptor.package_id.clone()) {
                continue;
            }

            let versions = self.mod_versions(&descriptor.package_id).await?;
            let chosen = select_mod_version(&versions, target, &self.loader).ok_or_else(|| {
                ResolutionError::NoCompatibleVersion(descriptor.package_id.clone())
            })?;
            let candidate = into_candidate(&descriptor.package_id, chosen)?;

            for dep_id in &candidate.required_dependencies {
                if visited.contains(dep_id) || enqueued.contains(dep_id) {
                    continue;
                }
                let display_name = match declared.get(dep_id) {
                    Some(name) => name.clone(),
                    None => self.display_name(dep_id).await,
                };
                debug!(
                    "Enqueue dependency {} of {}",
                    dep_id, descriptor.package_id
                );
                queue.push_back(PackageDescriptor {
                    package_id: dep_id.clone(),
                    display_name,
                    declared: declared.contains_key(dep_id),
                });
                enqueued.insert(dep_id.clone());
            }

            let compatible = candidate.supports(target);
            if !compatible {
                warn!(
                    "Version mismatch for {} ({}): target {}, supports {:?}",
                    descriptor.display_name,
                    descriptor.package_id,
                    target,
                    candidate.supported_game_versions
                );
            }

            resolved.push(ResolvedPackage {
                current_version: state.mods.get(&descriptor.package_id).cloned(),
                descriptor,
                candidate,
                compatible,
            });
        }

        Ok(resolved)
    }

    async fn resolve_datapacks(
        &self,
        declared: &IndexMap<String, String>,
        target: &str,
    ) -> UpdaterResult<Vec<ResolvedPackage>> {
        let mut resolved = Vec::new();

        for (id, name) in declared {
            let filtered = self
                .source
                .project_versions(id, &VersionFilter::GameVersion(target.to_string()))
                .await?
                .unwrap_or_default();
            let versions = if filtered.is_empty() {
                debug!("No {} datapack versions for {}; using full listing", target, id);
                self.source
                    .project_versions(id, &VersionFilter::All)
                    .await?
                    .ok_or_else(|| ResolutionError::PackageNotFound(id.clone()))?
            } else {
                filtered
            };

            let newest = versions
                .first()
                .ok_or_else(|| ResolutionError::NoCompatibleVersion(id.clone()))?;
            let candidate = into_candidate(id, newest)?;
            let compatible = candidate.supports(target);

            resolved.push(ResolvedPackage {
                descriptor: PackageDescriptor {
                    package_id: id.clone(),
                    display_name: name.clone(),
                    declared: true,
                },
                candidate,
                compatible,
                current_version: None,
            });
        }

        Ok(resolved)
    }

    /// Loader-filtered listing, retrying through search when the id is unknown.
    async fn mod_versions(&self, package_id: &str) -> UpdaterResult<Vec<RegistryVersion>> {
        let filter = VersionFilter::Loader(self.loader.clone());

        let versions = match self.source.project_versions(package_id, &filter).await? {
            Some(versions) => versions,
            None => {
                let resolved_id = self.resolve_identifier(package_id).await?;
                info!("Resolved registry identifier {} -> {}", package_id, resolved_id);
                self.source
                    .project_versions(&resolved_id, &filter)
                    .await?
                    .ok_or_else(|| ResolutionError::PackageNotFound(package_id.to_string()))?
            }
        };

        if versions.is_empty() {
            return Err(ResolutionError::NoCompatibleVersion(package_id.to_string()).into());
        }
        Ok(versions)
    }

    /// Text search, then exact slug facet, then project-id facet with case variants.
    async fn resolve_identifier(&self, package_id: &str) -> UpdaterResult<String> {
        let id = package_id.trim();

        let mut queries = vec![
            SearchQuery::Text(id.to_string()),
            SearchQuery::Slug(id.to_string()),
        ];
        let mut variants: Vec<String> = Vec::new();
        for variant in [id.to_string(), id.to_lowercase(), id.to_uppercase()] {
            if !variants.contains(&variant) {
                variants.push(variant);
            }
        }
        queries.extend(variants.into_iter().map(SearchQuery::ProjectId));

        for query in &queries {
            let hits = self.source.search(query).await?;
            if let Some(hit) = hits.into_iter().next() {
                return Ok(hit.project_id.or(hit.slug).unwrap_or_else(|| id.to_string()));
            }
        }

        Err(ResolutionError::PackageNotFound(id.to_string()).into())
    }

    async fn display_name(&self, package_id: &str) -> String {
        match self.source.project_title(package_id).await {
            Ok(Some(title)) => title,
            Ok(None) => package_id.to_string(),
            Err(e) => {
                warn!("Cannot fetch title for {}: {}", package_id, e);
                package_id.to_string()
            }
        }
    }
}
