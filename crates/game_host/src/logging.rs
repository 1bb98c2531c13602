//! Logging system setup and configuration
//!
//! Console output goes through `tracing-subscriber` in human or JSON format.
//! When a log file is configured, every event is also written to it through
//! a non-blocking `tracing-appender` writer; that file is what the platform
//! collects after the process ends.
//!
//! Until the configuration is loaded, [`bootstrap_logging`] provides a plain
//! console for the current thread so config loading is not silent.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Keeps the background log writer alive. Dropping it flushes the log file.
#[must_use = "dropping the guard stops writing to the log file"]
pub struct LogGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Initialize the logging system
///
/// # Arguments
/// * `settings` - Level and console format
/// * `log_file` - Optional file receiving a plain-text copy of every event
///
/// # Returns
/// * `Result<LogGuard>` - Guard that must be held for the process lifetime
///
/// # Environment Variables
/// * `RUST_LOG` - Overrides the configured level (e.g., "debug", "game_host=trace")
pub fn setup_logging(settings: &LoggingSettings, log_file: Option<&Path>) -> Result<LogGuard> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let (writer, guard) = open_log_file(path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if settings.json_format {
        registry
            .with(fmt::layer().json().with_target(false))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }

    Ok(LogGuard {
        _file_writer: file_guard,
    })
}

/// Console logging for the current thread while configuration loads.
///
/// Honors `RUST_LOG`, otherwise logs at `info` (`debug` with `--debug`).
/// Drop the guard before calling [`setup_logging`].
pub fn bootstrap_logging(debug: bool) -> DefaultGuard {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing::subscriber::set_default(bootstrap_subscriber(filter, std::io::stderr))
}

fn bootstrap_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(writer))
}

fn open_log_file(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file path has no file name: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
