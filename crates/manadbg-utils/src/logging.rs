//! # Logging Utilities
//!
//! Logging infrastructure for manadbg using `tracing`.
//!
//! stdout carries the MI protocol, so log records never go there. They are
//! written to stderr, or to a file when one is configured.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manadbg_utils::{init_logging, LogFormat};
//!
//! // Keep the guard alive for as long as logs should be flushed.
//! let _guard = init_logging(None, LogFormat::Pretty, None).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log filter when no explicit level is given (e.g., `RUST_LOG=manadbg_core=debug`)
//! - `MANADBG_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `MANADBG_LOG_FILE`: Log file, or a directory for a dated log file
//!
//! The environment is read by [`DebuggerConfig`](crate::config::DebuggerConfig);
//! this module only applies the resulting settings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Level used when neither an explicit level nor `RUST_LOG` is set.
pub const DEFAULT_LEVEL: LogLevel = LogLevel::Warn;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    #[default]
    Pretty,
    /// JSON format, one record per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level (default)
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the file writer alive; logs still buffered are flushed on drop.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Filter priority:
/// 1. `level`, when given (from `--log-level`)
/// 2. `RUST_LOG`, which allows module-specific filters like `manadbg_core=debug`
/// 3. [`DEFAULT_LEVEL`]
///
/// With `file` set, records go to that file (or to a dated file inside it,
/// when it is a directory) and nothing is written to the console.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file cannot
/// be created.
pub fn init_logging(level: Option<LogLevel>, format: LogFormat, file: Option<&Path>) -> Result<LoggingGuard, LoggingError>
{
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(level, rust_log.as_deref());
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(Level::from(DEFAULT_LEVEL).to_string()));

    let (layer, guard) = match file {
        Some(path) => {
            let log_file = resolve_log_file(path);
            let (writer, guard) = tracing_appender::non_blocking(file_appender(&log_file)?);
            (build_layer(writer, format, false, env_filter), Some(guard))
        }
        None => (build_layer(io::stderr, format, true, env_filter), None),
    };

    Registry::default()
        .with(layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(LoggingGuard { _file: guard })
}

/// Filter directive for the given explicit level and `RUST_LOG` value.
fn filter_directive(level: Option<LogLevel>, rust_log: Option<&str>) -> String
{
    match (level, rust_log) {
        (Some(level), _) => Level::from(level).to_string(),
        (None, Some(rust_log)) if !rust_log.trim().is_empty() => rust_log.to_string(),
        (None, _) => Level::from(DEFAULT_LEVEL).to_string(),
    }
}

/// `path` itself, or `path/YYYY-MM-DD-manadbg.log` when `path` is a directory.
pub fn resolve_log_file(path: &Path) -> PathBuf
{
    if path.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        path.join(format!("{today}-manadbg.log"))
    } else {
        path.to_path_buf()
    }
}

fn file_appender(log_file: &Path) -> Result<RollingFileAppender, LoggingError>
{
    let directory = log_file.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(directory)?;
    let file_name = log_file
        .file_name()
        .ok_or_else(|| LoggingError::InitializationFailed(format!("not a file path: {}", log_file.display())))?;

    // The date is already part of dated file names, so never rotate.
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

fn build_layer<W>(writer: W, format: LogFormat, ansi: bool, filter: EnvFilter) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
