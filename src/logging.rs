//! Tracing setup: stderr plus the per-run activity log file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Suffix of every activity log file name.
pub const ACTIVITY_LOG_SUFFIX: &str = "_PZWDLog.txt";

/// Errors from logging setup.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Cannot create activity log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create activity log {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tracing already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Path of the activity log for a run started at `started`.
#[must_use]
pub fn activity_log_path(dir: &Path, started: DateTime<Local>) -> PathBuf {
    let stamp = started.format("%Y-%m-%d_%H-%M-%S");
    dir.join(format!("{stamp}{ACTIVITY_LOG_SUFFIX}"))
}

/// Filter directive for a `-v` count.
#[must_use]
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber and open this run's activity log.
///
/// Stderr follows `verbosity` (or `RUST_LOG`). The activity log records
/// at least `info` so operator messages always reach it. Writes go
/// straight to the file, one per event.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created, or if a
/// global subscriber is already installed.
pub fn init_tracing(verbosity: u8, activity_dir: &Path) -> Result<PathBuf, LoggingError> {
    fs::create_dir_all(activity_dir).map_err(|source| LoggingError::CreateDir {
        path: activity_dir.to_path_buf(),
        source,
    })?;
    let path = activity_log_path(activity_dir, Local::now());
    let file = File::create(&path).map_err(|source| LoggingError::CreateFile {
        path: path.clone(),
        source,
    })?;

    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));
    let file_filter = EnvFilter::new(level_for(verbosity.max(1)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(stderr_filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_filter),
        )
        .try_init()?;

    Ok(path)
}
