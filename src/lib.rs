pub mod cli;
pub mod commands;
pub mod core;
pub mod logging;

use std::sync::Arc;

use crate::cli::Args;
use crate::core::config::UpdaterConfig;
use crate::core::error::UpdaterResult;
use crate::core::http::build_http_client;
use crate::core::registry::{RemoteVersionSource, VersionSource};

/// Check (and with `--apply`, apply) updates for the configured installation.
pub async fn run(args: Args) -> UpdaterResult<()> {
    let config = UpdaterConfig::load(&args.config, args.assume_yes)?;
    config.validate()?;
    let _guard = logging::init(&config.environment.log_file)?;

    tracing::info!("Fabric server updater starting for {:?}", config.server_dir());

    let source: Arc<dyn VersionSource> =
        Arc::new(RemoteVersionSource::new(build_http_client(config.http_timeout())?));

    let (resolution, inventory) =
        commands::check_updates(&config, Arc::clone(&source), args.mc_version.as_deref()).await?;
    commands::print_report(&resolution, &inventory);

    if !args.apply {
        return Ok(());
    }

    if let Err(e) = commands::apply_updates(&config, source, &resolution, &inventory).await {
        tracing::error!("Apply flow failed: {}", e);
        return Err(e);
    }
    Ok(())
}
