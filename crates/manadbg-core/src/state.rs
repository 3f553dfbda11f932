//! Session state written by stop and exit events.
//!
//! The current thread and the exited flag are written on the dispatcher thread
//! and read by the command loop. They have their own lock, separate from the
//! process controller's, and it is only held to copy a field in or out.

use std::sync::{Mutex, MutexGuard};

use crate::types::ThreadId;

#[derive(Debug, Default)]
struct StateInner
{
    current_thread: Option<ThreadId>,
    exit_code: Option<i32>,
}

/// Current thread and exit status of the debuggee.
#[derive(Debug, Default)]
pub struct SessionState
{
    inner: Mutex<StateInner>,
}

impl SessionState
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StateInner>
    {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Thread of the most recent stop event.
    #[must_use]
    pub fn current_thread(&self) -> Option<ThreadId>
    {
        self.lock().current_thread
    }

    pub fn set_current_thread(&self, thread: ThreadId)
    {
        self.lock().current_thread = Some(thread);
    }

    /// Forget the current thread if it is `thread` (it exited).
    pub fn clear_thread(&self, thread: ThreadId)
    {
        let mut inner = self.lock();
        if inner.current_thread == Some(thread) {
            inner.current_thread = None;
        }
    }

    pub fn mark_exited(&self, exit_code: i32)
    {
        let mut inner = self.lock();
        inner.exit_code = Some(exit_code);
        inner.current_thread = None;
    }

    #[must_use]
    pub fn has_exited(&self) -> bool
    {
        self.lock().exit_code.is_some()
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32>
    {
        self.lock().exit_code
    }
}
