//! Tracing subscriber setup.
//!
//! The library itself only emits `tracing` events. Binaries call
//! [`init_logging`] (stderr) or [`init_file_logging`] once; `RUST_LOG`
//! overrides the default directive in both cases.

use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging setup failures.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The default directive is not a valid filter.
    #[error("invalid log filter {directive:?}: {message}")]
    InvalidFilter { directive: String, message: String },

    /// The log file could not be opened.
    #[error("cannot open log file {path}: {message}")]
    File { path: String, message: String },

    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builds the filter: `RUST_LOG` if set and valid, else `default_directive`.
pub fn env_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive).map_err(|e| LoggingError::InvalidFilter {
            directive: default_directive.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Installs a stderr fmt subscriber as the global default.
///
/// Stdout is left to the caller for command output.
pub fn init_logging(default_directive: &str) -> Result<(), LoggingError> {
    let filter = env_filter(default_directive)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTime::rfc_3339())
                .with_target(false),
        )
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

/// Installs a subscriber appending to `path` through a background writer.
///
/// Keep the returned guard alive until exit; dropping it flushes pending
/// lines.
pub fn init_file_logging(path: &Path, default_directive: &str) -> Result<WorkerGuard, LoggingError> {
    let filter = env_filter(default_directive)?;
    let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339()),
        )
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
    Ok(guard)
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let file_error = |message: String| LoggingError::File {
        path: path.display().to_string(),
        message,
    };

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| file_error("not a file path".to_string()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| file_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_invalid_directive_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(matches!(
            env_filter("shardcache=loud"),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_valid_directive() {
        assert!(env_filter("shardcache=debug,warn").is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging("warn");
        assert!(matches!(
            init_logging("warn"),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_file_appender_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shardcache.log");

        let mut appender = file_appender(&path).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_file_appender_rejects_directory_path() {
        assert!(matches!(
            file_appender(Path::new("/")),
            Err(LoggingError::File { .. })
        ));
    }
}
