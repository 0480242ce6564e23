//! GestureLink Session Client Library
//!
//! A client for a real-time hand-gesture recognition backend: opens, reports
//! on, and tears down the WebSocket session that streams gesture status.

pub mod cli;
pub mod config;
pub mod gesture;
pub mod session;
pub mod ui;

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::LogConfig;

/// Application result type for consistent error handling
pub type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Initialize tracing subscriber for logging
///
/// `RUST_LOG` takes precedence over `level`. With `quiet_stderr` only warnings
/// and errors reach stderr, so they do not interleave with console output; the
/// log file still receives everything `level` allows. When file output is
/// enabled the returned guard must be held until exit so buffered lines are
/// flushed.
pub fn init_logging(
    level: &str,
    log: &LogConfig,
    quiet_stderr: bool,
) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{
        Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let (file_layer, guard) = if log.file_output {
        let path = Path::new(&log.file_path);
        let file_name = path
            .file_name()
            .with_context(|| format!("Log file path has no file name: {}", log.file_path))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let appender = tracing_appender::rolling::daily(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let stderr_ceiling = if quiet_stderr {
        LevelFilter::WARN
    } else {
        LevelFilter::TRACE
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gesturelink={}", level).into()),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stderr_ceiling),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
