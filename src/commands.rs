use std::sync::Arc;

use tracing::{info, warn};

use crate::core::apply::{ApplyOrchestrator, ApplyReport, ApplySettings, AutoConfirm, Confirm, TerminalConfirm};
use crate::core::config::UpdaterConfig;
use crate::core::downloader::Downloader;
use crate::core::error::UpdaterResult;
use crate::core::http::{build_http_client, DOWNLOAD_TIMEOUT};
use crate::core::inventory::{self, InventoryResult};
use crate::core::loaders::FabricServerInstaller;
use crate::core::registry::VersionSource;
use crate::core::resolver::{ResolutionResult, VersionResolver};
use crate::core::server::{ControlChannel, LifecycleSettings, ScreenChannel, ServerController};
use crate::core::state::StateStore;

/// Resolve the declared set and classify the live mods directory.
pub async fn check_updates(
    config: &UpdaterConfig,
    source: Arc<dyn VersionSource>,
    target_game_version: Option<&str>,
) -> UpdaterResult<(ResolutionResult, InventoryResult)> {
    let resolver = VersionResolver::new(source);
    let resolution = resolver
        .resolve(&config.mods, &config.datapacks, &config.state, target_game_version)
        .await?;
    let inventory = inventory::scan(config.mods_dir(), resolution.resolved_ids())?;
    Ok((resolution, inventory))
}

pub fn print_report(resolution: &ResolutionResult, inventory: &InventoryResult) {
    let platform = &resolution.platform;
    println!("Fabric:");
    println!(
        "  Target MC {}, loader {} | Current MC {}, loader {} | Needs update: {}",
        platform.target_game_version,
        platform.target_loader_version,
        or_unknown(&platform.current_game_version),
        or_unknown(&platform.current_loader_version),
        if platform.needs_update { "yes" } else { "no" }
    );

    println!("\nMods:");
    for package in &resolution.mods {
        let candidate = &package.candidate;
        println!(
            "  {} ({}){}: current={}, latest={} [{}, {}] sha1={} url={} {}",
            package.descriptor.display_name,
            package.package_id(),
            if package.is_auto_added() { " [dependency]" } else { "" },
            package.current_version.as_deref().unwrap_or("unknown"),
            candidate.version_label,
            candidate.stability,
            if package.compatible { "compatible" } else { "mismatch" },
            candidate.content_hash,
            candidate.download_url,
            if inventory.is_present(package.package_id()) { "FOUND" } else { "MISSING" }
        );
        if !package.compatible {
            let supported = if candidate.supported_game_versions.is_empty() {
                "unknown".to_string()
            } else {
                candidate.supported_game_versions.join(",")
            };
            warn!(
                "Version mismatch for {} ({}): target MC {}, mod supports {}",
                package.descriptor.display_name,
                package.package_id(),
                platform.target_game_version,
                supported
            );
        }
    }

    if !resolution.datapacks.is_empty() {
        println!("\nDatapacks:");
        for package in &resolution.datapacks {
            println!(
                "  {} ({}): latest={} [{}] url={}",
                package.descriptor.display_name,
                package.package_id(),
                package.candidate.version_label,
                package.candidate.stability,
                package.candidate.download_url
            );
        }
    }

    if !inventory.unexpected.is_empty() {
        println!("\nUnexpected mods in directory:");
        for entry in &inventory.unexpected {
            println!("  {}", entry.filename);
        }
    }

    if !inventory.missing.is_empty() {
        println!("\nMissing mods (configured but not found):");
        for id in &inventory.missing {
            println!("  {}", id);
        }
    }
}

/// Wire the live collaborators from `config` and run one apply.
pub async fn apply_updates(
    config: &UpdaterConfig,
    source: Arc<dyn VersionSource>,
    resolution: &ResolutionResult,
    inventory: &InventoryResult,
) -> UpdaterResult<ApplyReport> {
    let env = &config.environment;

    let channel: Option<Arc<dyn ControlChannel>> = non_empty(&env.screen_session)
        .map(|session| Arc::new(ScreenChannel::new(&session)) as Arc<dyn ControlChannel>);

    let mut lifecycle = LifecycleSettings::new(config.server_dir().to_path_buf());
    lifecycle.backup_dir = non_empty(&env.backup_dir);
    lifecycle.backup_script = non_empty(&env.backup_script);
    lifecycle.start_script = non_empty(&env.start_script);

    let confirm: Arc<dyn Confirm> = if config.options.assume_yes {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(TerminalConfirm::new(false))
    };

    let downloader = Arc::new(Downloader::new(build_http_client(DOWNLOAD_TIMEOUT)?));

    let mut orchestrator = ApplyOrchestrator::new(
        ApplySettings::from_config(config),
        ServerController::new(channel, lifecycle),
        Arc::new(FabricServerInstaller::new(source)),
        downloader,
        StateStore::new(&config.config_path),
        confirm,
    );

    info!("Starting apply flow...");
    let report = orchestrator.apply(resolution, inventory).await?;
    info!(
        "Apply flow completed: {} mods, {} datapacks installed{}",
        report.mods_installed,
        report.datapacks_installed,
        if report.platform_updated { ", platform updated" } else { "" }
    );
    Ok(report)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
