use std::path::Path;

use emulite_shared::errors::{EmuliteError, EmuliteResult};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// File name prefix of the daily-rotated log.
pub const LOG_FILE_NAME: &str = "emulite.log";

/// `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();
}

/// Install the global subscriber.
///
/// With `log_dir`, logs go to `<log_dir>/emulite.log.<date>`; otherwise to
/// stderr. The returned guard must be held until exit so buffered lines are
/// flushed.
pub fn init_logging(log_dir: Option<&Path>, default_directive: &str) -> EmuliteResult<WorkerGuard> {
    let filter = env_filter(default_directive);

    let (non_blocking, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                EmuliteError::Storage(format!(
                    "Failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_NAME))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    register_to_tracing(non_blocking, filter);
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_logging_creates_log_dir() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init_logging(Some(&log_dir), "info").unwrap();
        tracing::info!("logging initialised");
        drop(guard);

        assert!(log_dir.is_dir());
    }
}
