//! # Process Controller
//!
//! Owns the handle of the attached debuggee.
//!
//! The handle is shared by the command loop and the event-dispatcher thread.
//! It sits behind one mutex, and that mutex is held only long enough to clone
//! or swap the handle. Calls into the debugging interface happen after the
//! lock is released: they can trigger nested callbacks, and a callback that
//! needs the handle must not find it locked.

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::error::{DebuggerError, Result};
use crate::runtime::RuntimeProcess;
use crate::types::{Address, ProcessId, ThreadInfo};

/// Fallback when the OS does not report a page size.
const DEFAULT_PAGE_SIZE: u64 = 4096;

/// Largest single memory read.
pub const MAX_READ_LEN: usize = 1 << 20;

static PAGE_SIZE: Lazy<u64> = Lazy::new(|| {
    // SAFETY: sysconf has no preconditions and only reads system configuration.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size)
        .ok()
        .filter(|size| size.is_power_of_two())
        .unwrap_or(DEFAULT_PAGE_SIZE)
});

/// Memory page size of the host, read once.
#[must_use]
pub fn page_size() -> u64
{
    *PAGE_SIZE
}

/// Shared owner of the debuggee handle
///
/// Cloning the controller shares the same slot: a detach through one clone is
/// seen by all of them.
#[derive(Clone, Default)]
pub struct ProcessController
{
    slot: Arc<Mutex<Option<Arc<dyn RuntimeProcess>>>>,
}

impl ProcessController
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<dyn RuntimeProcess>>>
    {
        // A poisoned slot still holds a valid handle (or none).
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install the handle of a freshly attached process.
    pub fn install(&self, process: Arc<dyn RuntimeProcess>)
    {
        info!("Attached to process {}", process.pid());
        *self.lock() = Some(process);
    }

    /// Clone the current handle out of the slot.
    ///
    /// ## Errors
    ///
    /// `NotAttached` after detach/terminate or before attach.
    pub fn handle(&self) -> Result<Arc<dyn RuntimeProcess>>
    {
        self.lock().clone().ok_or(DebuggerError::NotAttached)
    }

    /// Empty the slot, returning the handle it held.
    pub fn release(&self) -> Option<Arc<dyn RuntimeProcess>>
    {
        self.lock().take()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool
    {
        self.lock().is_some()
    }

    pub fn pid(&self) -> Result<ProcessId>
    {
        Ok(self.handle()?.pid())
    }

    pub fn continue_execution(&self) -> Result<()>
    {
        debug!("Continue");
        self.handle()?.continue_execution()
    }

    pub fn stop(&self) -> Result<()>
    {
        debug!("Stop");
        self.handle()?.stop()
    }

    /// Ask the runtime to kill the debuggee.
    ///
    /// The handle stays installed: the exit callback still has to arrive.
    pub fn terminate(&self) -> Result<()>
    {
        debug!("Terminate");
        self.handle()?.terminate()
    }

    /// Detach and empty the slot.
    pub fn detach(&self) -> Result<()>
    {
        let process = self.release().ok_or(DebuggerError::NotAttached)?;
        info!("Detaching from process {}", process.pid());
        process.detach()
    }

    pub fn threads(&self) -> Result<Vec<ThreadInfo>>
    {
        self.handle()?.threads()
    }

    /// Read `len` bytes starting at `address`.
    ///
    /// When the full read fails, the read is retried up to the end of the page
    /// containing `address`, which covers reads running off the edge of a
    /// mapping. The returned buffer holds only the bytes actually read.
    ///
    /// ## Errors
    ///
    /// Reads longer than [`MAX_READ_LEN`] are rejected with
    /// [`DebuggerError::InvalidArgument`].
    pub fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        if len > MAX_READ_LEN {
            return Err(DebuggerError::InvalidArgument(format!(
                "read of {len} bytes exceeds the {MAX_READ_LEN} byte limit"
            )));
        }
        let process = self.handle()?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|err| DebuggerError::InvalidArgument(format!("cannot allocate {len} bytes: {err}")))?;
        buf.resize(len, 0_u8);

        let read = match process.read_memory(address, &mut buf) {
            Ok(read) => read,
            Err(err) => {
                let to_page_end = usize::try_from(address.bytes_to_page_end(page_size())).unwrap_or(usize::MAX);
                if to_page_end >= len {
                    return Err(err);
                }
                warn!("Read of {len} bytes at {address} failed ({err}), retrying {to_page_end} bytes");
                process.read_memory(address, &mut buf[..to_page_end])?
            }
        };

        buf.truncate(read);
        Ok(buf)
    }
}

impl std::fmt::Debug for ProcessController
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ProcessController")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two()
    {
        assert!(page_size().is_power_of_two());
        assert!(page_size() >= 4096);
    }

    #[test]
    fn test_unattached_controller_reports_not_attached()
    {
        let controller = ProcessController::new();
        assert!(!controller.is_attached());
        assert!(matches!(controller.continue_execution(), Err(DebuggerError::NotAttached)));
        assert!(matches!(controller.detach(), Err(DebuggerError::NotAttached)));
        assert!(matches!(
            controller.read_memory(Address::new(0x1000), 4),
            Err(DebuggerError::NotAttached)
        ));
    }
}
