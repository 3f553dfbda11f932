//! Protocol errors.

use std::io;

/// Errors of the MI command loop
///
/// Parse errors are reported to the front-end as `^error` replies and the
/// loop keeps going. Only I/O errors on the protocol streams end it.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError
{
    /// Verb not in the command set
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Known verb with arguments that do not parse
    #[error("{command}: {message}")]
    MalformedArguments
    {
        command: &'static str, message: String
    },

    /// Reading commands or writing records failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError
{
    pub(crate) fn malformed(command: &'static str, message: impl Into<String>) -> Self
    {
        Self::MalformedArguments {
            command,
            message: message.into(),
        }
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
