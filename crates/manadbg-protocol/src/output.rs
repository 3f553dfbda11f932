//! # Output Stream
//!
//! All protocol output goes through one [`MiWriter`]. Replies come from the
//! command loop and asynchronous records from the event-dispatcher thread;
//! the writer's lock keeps every record on its own line.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use manadbg_core::events::{Notification, NotificationSink};
use tracing::{trace, warn};

use crate::format;
use crate::record::Record;

/// Prompt printed before each command is read.
pub const PROMPT: &str = "(gdb)";

/// Serialized, line-flushed writer for protocol records.
#[derive(Debug)]
pub struct MiWriter<W: Write + Send>
{
    out: Mutex<W>,
}

impl<W: Write + Send> MiWriter<W>
{
    pub fn new(out: W) -> Self
    {
        Self { out: Mutex::new(out) }
    }

    /// Write one line and flush it.
    ///
    /// ## Errors
    ///
    /// Returns the I/O error of the underlying stream.
    pub fn write_line(&self, line: &str) -> io::Result<()>
    {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        trace!(target: "manadbg_protocol::wire", "<- {line}");
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()
    }

    /// ## Errors
    ///
    /// Returns the I/O error of the underlying stream.
    pub fn write_record(&self, record: &Record) -> io::Result<()>
    {
        self.write_line(&record.to_string())
    }

    /// ## Errors
    ///
    /// Returns the I/O error of the underlying stream.
    pub fn prompt(&self) -> io::Result<()>
    {
        self.write_line(PROMPT)
    }
}

impl<W: Write + Send> NotificationSink for MiWriter<W>
{
    fn notify(&self, notification: Notification)
    {
        if let Err(err) = self.write_record(&format::notification(&notification)) {
            warn!("Failed to write notification ({}): {err}", notification.describe());
        }
    }
}
