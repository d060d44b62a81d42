//! Logging setup: stdout plus a daily rolling file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::AppError;

const LOG_FILE_PREFIX: &str = "cisia-alert";

/// Installs the global subscriber. `RUST_LOG` wins over `config.log_filter`.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// until shutdown.
pub fn setup_logging(config: &Config) -> Result<WorkerGuard, AppError> {
    let file_appender = rolling_appender(&config.logs_path, config.log_files_kept)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| AppError::InvalidConfig {
            key: "LOG_FILTER".to_string(),
            reason: e.to_string(),
        })?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Failed to install global logger: {e}"),
        })?;

    Ok(guard)
}

fn rolling_appender(dir: &Path, kept: usize) -> Result<RollingFileAppender, AppError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(kept)
        .build(dir)
        .map_err(|e| AppError::ConfigurationError {
            msg: format!(
                "Failed to initialize rolling file appender at '{}': {e}",
                dir.display()
            ),
        })
}
