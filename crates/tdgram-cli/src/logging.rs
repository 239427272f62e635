//! Log output setup
//!
//! Installs a `tracing_subscriber::fmt` subscriber writing either to stderr or
//! to a log file through `tracing_appender`'s non-blocking writer. The file is
//! rotated on the configured schedule.

use std::io;
use std::path::{Path, PathBuf};

use tdgram_core::{LogRotation, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::error::{CliError, Result};

/// Install the global subscriber; `verbose` forces debug output
///
/// When logging to a file the returned guard must be held until exit, or
/// buffered lines are lost.
pub fn init_logging(config: &LoggingConfig, session: &str, verbose: bool) -> Result<Option<WorkerGuard>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config
            .level
            .parse::<tracing::Level>()
            .map_err(|e| CliError::Logging(e.to_string()))?
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match config.resolved_path(session) {
        Some(path) => {
            let appender = file_appender(&path, config.rotation)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(io::stderr)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}

fn rotation(schedule: LogRotation) -> Rotation {
    match schedule {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
    }
}

/// Split a log path into the appender's directory and file name
fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file = path
        .file_name()
        .ok_or_else(|| CliError::Logging(format!("log path {} has no file name", path.display())))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir.to_path_buf(), PathBuf::from(file)))
}

fn file_appender(path: &Path, schedule: LogRotation) -> Result<RollingFileAppender> {
    let (dir, file) = split_log_path(path)?;
    std::fs::create_dir_all(&dir)?;
    Ok(RollingFileAppender::new(rotation(schedule), dir, file))
}
