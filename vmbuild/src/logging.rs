//! Tracing subscriber setup for the `vmbuild` binary and embedders.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

/// Log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "vmbuild.log";

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Human-readable events go to stderr, filtered by `RUST_LOG` (default `info`). With a
/// `log_dir`, every event is also appended to `<log_dir>/vmbuild.log` without ANSI
/// colors. Keep the returned guard alive until exit so buffered lines are flushed.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is already set.
pub fn init_logging(log_dir: Option<&Path>) -> VmbuildResult<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| VmbuildError::Internal(format!("failed to install logger: {}", e)))?;

    if let Some(dir) = log_dir {
        tracing::debug!(path = %dir.join(LOG_FILE_NAME).display(), "Logging to file");
    }

    Ok(guard)
}
