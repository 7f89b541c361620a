//! Log file setup

use std::fs::File;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;
use crate::error::{DaemonError, Result};

/// Keeps the background writer alive; logs are flushed when it is dropped
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Maximum level for a `-v` count
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Install the global subscriber writing to the configured log file.
///
/// The file is truncated. `RUST_LOG` takes precedence over the verbosity.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let file = File::create(&config.file).map_err(|e| {
        DaemonError::Logging(format!("Cannot open {}: {}", config.file.display(), e))
    })?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level_for(config.verbosity).into()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| DaemonError::Logging(e.to_string()))?;

    tracing::info!("Logging to {}", config.file.display());
    Ok(LoggingGuard { _guard: guard })
}
