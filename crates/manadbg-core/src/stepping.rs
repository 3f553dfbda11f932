//! Run-control steps (`exec-step`, `exec-next`, `exec-finish`).
//!
//! Each request creates one runtime stepper for the thread. In and Over step
//! over the IL range of the current source line when symbols know it, and fall
//! back to a single-instruction step otherwise. Out stops at the return point
//! of the current frame.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::error::Result;
use crate::runtime::{InterceptMask, RuntimeProcess, Stepper};
use crate::symbols::SymbolStore;
use crate::types::{IlRange, ThreadId};

/// Kind of step requested by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode
{
    /// Step into calls (`exec-step`).
    In,
    /// Step over calls (`exec-next`).
    Over,
    /// Run until the current frame returns (`exec-finish`).
    Out,
}

impl fmt::Display for StepMode
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            StepMode::In => write!(f, "in"),
            StepMode::Over => write!(f, "over"),
            StepMode::Out => write!(f, "out"),
        }
    }
}

/// How a stepper was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlan
{
    Out,
    /// Step until execution leaves the range of the current line.
    Range(IlRange),
    /// Step a single instruction (no sequence points available).
    Instruction,
}

/// Active steppers, one per thread.
#[derive(Default)]
pub struct StepEngine
{
    active: HashMap<ThreadId, Box<dyn Stepper>>,
}

impl StepEngine
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Arm a stepper for `thread`. The caller continues the process afterwards.
    ///
    /// A stepper still active on the thread is deactivated and replaced.
    pub fn run_step(
        &mut self,
        thread: ThreadId,
        mode: StepMode,
        process: &dyn RuntimeProcess,
        symbols: &SymbolStore,
    ) -> Result<StepPlan>
    {
        let mut stepper = process.create_stepper(thread)?;
        stepper.set_intercept_mask(InterceptMask::USER_STEP)?;

        let plan = match mode {
            StepMode::Out => {
                stepper.step_out()?;
                StepPlan::Out
            }
            StepMode::In | StepMode::Over => {
                let step_in = mode == StepMode::In;
                let range = process
                    .active_frame(thread)?
                    .and_then(|(function, offset)| symbols.step_range(function, offset));
                match range {
                    Some(range) => {
                        stepper.step_range(step_in, &[range])?;
                        StepPlan::Range(range)
                    }
                    None => {
                        stepper.step(step_in)?;
                        StepPlan::Instruction
                    }
                }
            }
        };
        debug!("Step {mode} on thread {thread}: {plan:?}");

        if let Some(mut previous) = self.active.insert(thread, stepper) {
            if let Err(err) = previous.deactivate() {
                warn!("Failed to deactivate previous stepper on thread {thread}: {err}");
            }
        }
        Ok(plan)
    }

    /// Forget the stepper of a thread whose step completed.
    pub fn complete(&mut self, thread: ThreadId) -> bool
    {
        self.active.remove(&thread).is_some()
    }

    #[must_use]
    pub fn is_stepping(&self, thread: ThreadId) -> bool
    {
        self.active.contains_key(&thread)
    }

    /// Deactivate every active stepper.
    pub fn deactivate_all(&mut self) -> usize
    {
        let count = self.active.len();
        for (thread, mut stepper) in self.active.drain() {
            if let Err(err) = stepper.deactivate() {
                warn!("Failed to deactivate stepper on thread {thread}: {err}");
            }
        }
        count
    }
}

impl fmt::Debug for StepEngine
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("StepEngine")
            .field("threads", &self.active.keys().collect::<Vec<_>>())
            .finish()
    }
}
