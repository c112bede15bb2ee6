use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::error::{UpdaterError, UpdaterResult};

const DEFAULT_FILTER: &str = "info,fabric_server_updater=debug";

/// Console + file logging. The returned guard must live until exit so the
/// file writer flushes.
pub fn init(log_file: &Path) -> UpdaterResult<WorkerGuard> {
    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory).map_err(|e| UpdaterError::io(directory, e))?;
    let file_name = log_file
        .file_name()
        .ok_or_else(|| UpdaterError::Config(format!("log_file is not a file path: {}", log_file.display())))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| UpdaterError::Config(format!("Logging already initialized: {e}")))?;

    tracing::debug!("Logging to {:?}", log_file);
    Ok(guard)
}
