//! # Configuration
//!
//! Settings of a debugger run, layered as:
//!
//! 1. built-in defaults
//! 2. environment variables
//! 3. command-line flags (applied by the binary on top of [`DebuggerConfig::from_env`])
//!
//! ## Environment Variables
//!
//! - `MANADBG_EVAL_TIMEOUT_MS`: bound on a function evaluation
//! - `MANADBG_EXIT_WAIT_MS`: how long to wait for exit after a terminate request
//! - `MANADBG_LOG_FORMAT`: `pretty` or `json`
//! - `MANADBG_LOG_FILE`: log file (or directory) instead of stderr

use std::path::PathBuf;
use std::time::Duration;

use crate::logging::{LogFormat, LogLevel, LoggingError};

pub const EVAL_TIMEOUT_VAR: &str = "MANADBG_EVAL_TIMEOUT_MS";
pub const EXIT_WAIT_VAR: &str = "MANADBG_EXIT_WAIT_MS";
pub const LOG_FORMAT_VAR: &str = "MANADBG_LOG_FORMAT";
pub const LOG_FILE_VAR: &str = "MANADBG_LOG_FILE";

/// Settings of one debugger run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerConfig
{
    /// How long a function evaluation may run before it is aborted.
    pub eval_timeout: Duration,
    /// How often to check for exit after a terminate request.
    pub exit_poll_interval: Duration,
    /// How long to wait for exit after a terminate request.
    pub exit_wait_limit: Duration,
    /// Explicit log level; `None` defers to `RUST_LOG`.
    pub log_level: Option<LogLevel>,
    pub log_format: LogFormat,
    /// Log destination; `None` logs to stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for DebuggerConfig
{
    fn default() -> Self
    {
        Self {
            eval_timeout: Duration::from_secs(15),
            exit_poll_interval: Duration::from_millis(100),
            exit_wait_limit: Duration::from_secs(10),
            log_level: None,
            log_format: LogFormat::Pretty,
            log_file: None,
        }
    }
}

impl DebuggerConfig
{
    /// Defaults overridden by the process environment.
    ///
    /// ## Errors
    ///
    /// Returns an error when a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use manadbg_utils::DebuggerConfig;
    ///
    /// let config = DebuggerConfig::from_lookup(|name| (name == "MANADBG_EVAL_TIMEOUT_MS").then(|| "250".to_string()))
    ///     .unwrap();
    /// assert_eq!(config.eval_timeout, Duration::from_millis(250));
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns an error when a variable is set to an unparsable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError>
    {
        let mut config = Self::default();
        if let Some(timeout) = millis(&lookup, EVAL_TIMEOUT_VAR)? {
            config.eval_timeout = timeout;
        }
        if let Some(limit) = millis(&lookup, EXIT_WAIT_VAR)? {
            config.exit_wait_limit = limit;
        }
        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            config.log_format = format.parse()?;
        }
        config.log_file = lookup(LOG_FILE_VAR).filter(|path| !path.is_empty()).map(PathBuf::from);
        Ok(config)
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, variable: &'static str) -> Result<Option<Duration>, ConfigError>
{
    let Some(value) = lookup(variable) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
        _ => Err(ConfigError::InvalidValue { variable, value }),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError
{
    /// A variable holds something other than a positive number of milliseconds
    #[error("Invalid value for {variable}: '{value}' (expected a positive number of milliseconds)")]
    InvalidValue
    {
        variable: &'static str, value: String
    },

    /// Invalid log setting
    #[error(transparent)]
    Logging(#[from] LoggingError),
}
