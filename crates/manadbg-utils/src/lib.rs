//! # manadbg Utilities
//!
//! Logging and configuration shared by the manadbg crates.
//!
//! The MI protocol owns stdout, so nothing here ever writes to it: console
//! logs go to stderr and file logs go through a non-blocking appender.

pub mod config;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{ConfigError, DebuggerConfig};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
