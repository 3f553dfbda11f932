//! Completion slots for function evaluations.
//!
//! The evaluator issues a call, continues the debuggee and then waits here.
//! The dispatcher thread fills the slot when the runtime reports
//! `EvalComplete` or `EvalException`. At most one evaluation per thread can
//! be outstanding.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::error::EvalError;
use crate::types::{ThreadId, Value};

/// Outcome of a finished evaluation.
pub type EvalOutcome = Result<Value, EvalError>;

#[derive(Debug)]
enum Slot
{
    Pending,
    Done(EvalOutcome),
}

/// Shared completion state between the evaluator and the dispatcher.
#[derive(Debug, Default)]
pub struct EvalWaiter
{
    slots: Mutex<HashMap<ThreadId, Slot>>,
    ready: Condvar,
}

impl EvalWaiter
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Slot>>
    {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the slot for an evaluation about to be issued on `thread`.
    pub fn begin(&self, thread: ThreadId) -> Result<(), EvalError>
    {
        let mut slots = self.lock();
        if slots.contains_key(&thread) {
            return Err(EvalError::Busy(thread.raw()));
        }
        slots.insert(thread, Slot::Pending);
        Ok(())
    }

    /// Whether an evaluation on `thread` is waiting for its result.
    #[must_use]
    pub fn is_pending(&self, thread: ThreadId) -> bool
    {
        matches!(self.lock().get(&thread), Some(Slot::Pending))
    }

    /// Deliver the result for `thread`.
    ///
    /// Returns `false` when nothing was waiting (a late completion after a
    /// timeout, for example).
    pub fn complete(&self, thread: ThreadId, outcome: EvalOutcome) -> bool
    {
        let mut slots = self.lock();
        match slots.get_mut(&thread) {
            Some(slot @ Slot::Pending) => {
                *slot = Slot::Done(outcome);
                self.ready.notify_all();
                true
            }
            _ => {
                debug!("Dropping evaluation result for thread {thread}: nothing is waiting");
                false
            }
        }
    }

    /// Block until the evaluation on `thread` finishes or `timeout` elapses.
    ///
    /// On timeout the slot stays open; the caller aborts the call and then
    /// [`cancel`](Self::cancel)s it.
    pub fn wait(&self, thread: ThreadId, timeout: Duration) -> EvalOutcome
    {
        let slots = self.lock();
        let (mut slots, _) = self
            .ready
            .wait_timeout_while(slots, timeout, |slots| matches!(slots.get(&thread), Some(Slot::Pending)))
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match slots.remove(&thread) {
            Some(Slot::Done(outcome)) => outcome,
            Some(Slot::Pending) => {
                slots.insert(thread, Slot::Pending);
                Err(EvalError::Timeout(timeout))
            }
            None => Err(EvalError::ProcessExited),
        }
    }

    /// Close the slot of `thread` without a result.
    pub fn cancel(&self, thread: ThreadId)
    {
        self.lock().remove(&thread);
    }

    /// Fail every outstanding evaluation, e.g. because the debuggee exited.
    pub fn fail_all(&self, error: &EvalError)
    {
        let mut slots = self.lock();
        for slot in slots.values_mut() {
            if matches!(slot, Slot::Pending) {
                *slot = Slot::Done(Err(error.clone()));
            }
        }
        self.ready.notify_all();
    }
}
