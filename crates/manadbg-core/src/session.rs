//! # Debugging Session
//!
//! One attached debuggee and everything the engine knows about it.
//!
//! A [`Session`] is created by a successful attach and owns:
//!
//! - the [`ProcessController`] with the debuggee handle
//! - the [`BreakpointTable`], [`SymbolStore`] and [`StepEngine`]
//! - the [`EvalStackMachine`]
//! - the event-dispatcher thread
//!
//! The command loop calls the session's methods synchronously; the dispatcher
//! thread updates the same shared state as runtime callbacks arrive.
//!
//! ## Lock order
//!
//! When two locks are needed at once the breakpoint table is taken before
//! the symbol store. The controller's lock and the session state's lock are
//! never held while another lock is taken.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use manadbg_core::runtime::default_factory;
//! use manadbg_core::session::{Session, SessionConfig};
//! use manadbg_core::symbols::NoSymbols;
//! use manadbg_core::events::{Notification, NotificationSink};
//! use manadbg_core::types::ProcessId;
//!
//! struct Print;
//!
//! impl NotificationSink for Print
//! {
//!     fn notify(&self, notification: Notification)
//!     {
//!         println!("{}", notification.describe());
//!     }
//! }
//!
//! let factory = default_factory()?;
//! let session = Session::attach(
//!     factory.as_ref(),
//!     ProcessId::from(4242),
//!     Box::new(NoSymbols),
//!     Arc::new(Print),
//!     SessionConfig::default(),
//! )?;
//! session.insert_breakpoint("Program.cs", 10)?;
//! session.continue_execution()?;
//! # Ok::<(), manadbg_core::error::DebuggerError>(())
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::breakpoints::{Breakpoint, BreakpointId, BreakpointTable};
use crate::dispatcher::EventDispatcher;
use crate::error::{DebuggerError, Result};
use crate::eval::EvalStackMachine;
use crate::events::{event_channel, Notification, NotificationSink, StopReason};
use crate::process::ProcessController;
use crate::runtime::{RuntimeFactory, RuntimeProcess};
use crate::stack::StackWalker;
use crate::state::SessionState;
use crate::stepping::{StepEngine, StepMode, StepPlan};
use crate::symbols::{SymbolProvider, SymbolStore};
use crate::types::{Address, ProcessId, SourceLocation, StackFrame, ThreadId, ThreadInfo, Value};

/// Default bound on a function evaluation.
pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_secs(15);
/// Default interval between checks for process exit after terminate.
pub const DEFAULT_EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Default limit on the wait for process exit after terminate.
pub const DEFAULT_EXIT_WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Timing knobs of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig
{
    /// How long a function evaluation may run before it is aborted.
    pub eval_timeout: Duration,
    /// How often to check for exit after a terminate request.
    pub exit_poll_interval: Duration,
    /// How long to wait for exit after a terminate request.
    pub exit_wait_limit: Duration,
}

impl Default for SessionConfig
{
    fn default() -> Self
    {
        Self {
            eval_timeout: DEFAULT_EVAL_TIMEOUT,
            exit_poll_interval: DEFAULT_EXIT_POLL_INTERVAL,
            exit_wait_limit: DEFAULT_EXIT_WAIT_LIMIT,
        }
    }
}

/// An attached debuggee.
pub struct Session
{
    controller: ProcessController,
    state: Arc<SessionState>,
    breakpoints: Arc<Mutex<BreakpointTable>>,
    symbols: Arc<RwLock<SymbolStore>>,
    steps: Arc<Mutex<StepEngine>>,
    evaluator: Arc<EvalStackMachine>,
    sink: Arc<dyn NotificationSink>,
    walker: StackWalker,
    config: SessionConfig,
    dispatcher: Option<JoinHandle<()>>,
}

impl Session
{
    /// Attach to `pid` and start dispatching its events.
    ///
    /// ## Errors
    ///
    /// Any error of `factory.attach` (all of them fatal), or `Io` when the
    /// dispatcher thread cannot be started.
    pub fn attach(
        factory: &dyn RuntimeFactory,
        pid: ProcessId,
        symbols: Box<dyn SymbolProvider>,
        sink: Arc<dyn NotificationSink>,
        config: SessionConfig,
    ) -> Result<Self>
    {
        info!("Attaching to process {pid}");
        let (events_tx, events_rx) = event_channel();
        let process = factory.attach(pid, events_tx)?;

        let controller = ProcessController::new();
        controller.install(process);

        let mut session = Self {
            controller,
            state: Arc::new(SessionState::new()),
            breakpoints: Arc::new(Mutex::new(BreakpointTable::new())),
            symbols: Arc::new(RwLock::new(SymbolStore::new(symbols))),
            steps: Arc::new(Mutex::new(StepEngine::new())),
            evaluator: Arc::new(EvalStackMachine::new(config.eval_timeout)),
            sink,
            walker: StackWalker,
            config,
            dispatcher: None,
        };

        // Events published during attach wait in the channel until now.
        let dispatcher = EventDispatcher {
            controller: session.controller.clone(),
            state: Arc::clone(&session.state),
            breakpoints: Arc::clone(&session.breakpoints),
            symbols: Arc::clone(&session.symbols),
            steps: Arc::clone(&session.steps),
            evaluator: Arc::clone(&session.evaluator),
            sink: Arc::clone(&session.sink),
            walker: session.walker,
        };
        session.dispatcher = Some(dispatcher.spawn(events_rx)?);
        Ok(session)
    }

    fn process(&self) -> Result<Arc<dyn RuntimeProcess>>
    {
        if self.state.has_exited() {
            return Err(DebuggerError::NotAttached);
        }
        self.controller.handle()
    }

    fn breakpoint_table(&self) -> MutexGuard<'_, BreakpointTable>
    {
        self.breakpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn symbol_store(&self) -> RwLockReadGuard<'_, SymbolStore>
    {
        self.symbols.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn step_engine(&self) -> MutexGuard<'_, StepEngine>
    {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pid(&self) -> Result<ProcessId>
    {
        self.controller.pid()
    }

    pub fn config(&self) -> &SessionConfig
    {
        &self.config
    }

    /// Thread of the most recent stop.
    #[must_use]
    pub fn current_thread(&self) -> Option<ThreadId>
    {
        self.state.current_thread()
    }

    fn require_thread(&self) -> Result<ThreadId>
    {
        self.state.current_thread().ok_or(DebuggerError::NoCurrentThread)
    }

    #[must_use]
    pub fn has_exited(&self) -> bool
    {
        self.state.has_exited()
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32>
    {
        self.state.exit_code()
    }

    pub fn threads(&self) -> Result<Vec<ThreadInfo>>
    {
        self.process()?.threads()
    }

    pub fn continue_execution(&self) -> Result<()>
    {
        self.process()?.continue_execution()
    }

    /// Stop the debuggee and report it as interrupted.
    ///
    /// The current thread is kept when there is one; otherwise the first
    /// thread of the process becomes current.
    pub fn interrupt(&self) -> Result<()>
    {
        let process = self.process()?;
        process.stop()?;

        let thread = match self.state.current_thread() {
            Some(thread) => Some(thread),
            None => process.threads()?.first().map(|info| info.id),
        };
        let frame = match thread {
            Some(thread) => {
                self.state.set_current_thread(thread);
                self.walker
                    .top_frame(process.as_ref(), &self.symbol_store(), thread)
                    .unwrap_or_else(|err| {
                        warn!("Failed to resolve interrupt location: {err}");
                        None
                    })
            }
            None => None,
        };
        self.sink.notify(Notification::Stopped {
            reason: StopReason::Interrupted,
            thread,
            frame,
        });
        Ok(())
    }

    /// Step the current thread and continue the process.
    pub fn step(&self, mode: StepMode) -> Result<StepPlan>
    {
        let thread = self.require_thread()?;
        let process = self.process()?;
        let plan = {
            let mut steps = self.step_engine();
            let symbols = self.symbol_store();
            steps.run_step(thread, mode, process.as_ref(), &symbols)?
        };
        process.continue_execution()?;
        Ok(plan)
    }

    /// Add a breakpoint at `file:line`, bound immediately when its code is loaded.
    pub fn insert_breakpoint(&self, file: &str, line: u32) -> Result<Breakpoint>
    {
        if file.is_empty() || line == 0 {
            return Err(DebuggerError::InvalidArgument(format!("invalid breakpoint location {file}:{line}")));
        }
        let process = self.process()?;
        let mut breakpoints = self.breakpoint_table();
        let symbols = self.symbol_store();
        Ok(breakpoints.insert(SourceLocation::new(file, line), &symbols, process.as_ref()))
    }

    /// Remove a breakpoint. Unknown ids are accepted, and so is a delete after
    /// the debuggee has gone.
    pub fn delete_breakpoint(&self, id: BreakpointId) -> Result<()>
    {
        let process = self.process().ok();
        self.breakpoint_table().delete(id, process.as_deref());
        Ok(())
    }

    #[must_use]
    pub fn breakpoints(&self) -> Vec<Breakpoint>
    {
        self.breakpoint_table().list()
    }

    /// Frames of the current thread, walked afresh.
    pub fn list_frames(&self) -> Result<Vec<StackFrame>>
    {
        let thread = self.require_thread()?;
        let process = self.process()?;
        let symbols = self.symbol_store();
        self.walker.frames(process.as_ref(), &symbols, thread)
    }

    /// Arguments and locals of `frame` on the current thread.
    pub fn list_variables(&self, frame: usize) -> Result<Vec<(String, Value)>>
    {
        let thread = self.require_thread()?;
        self.process()?.inspector().frame_variables(thread, frame)
    }

    /// Evaluate `expression` in `frame` of the current thread.
    pub fn evaluate(&self, expression: &str, frame: usize) -> Result<Value>
    {
        let thread = self.require_thread()?;
        let process = self.process()?;
        Ok(self.evaluator.evaluate(process.as_ref(), thread, frame, expression)?)
    }

    pub fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        if self.state.has_exited() {
            return Err(DebuggerError::NotAttached);
        }
        self.controller.read_memory(address, len)
    }

    /// Deactivate every breakpoint and stepper.
    pub fn disable_all(&self) -> Result<()>
    {
        let process = self.controller.handle()?;
        let breakpoints = self.breakpoint_table().clear(process.as_ref());
        let steppers = self.step_engine().deactivate_all();
        debug!("Disabled {breakpoints} breakpoints and {steppers} steppers");
        Ok(())
    }

    /// Kill the debuggee and wait for its exit event.
    ///
    /// Breakpoints and steppers are disabled first. The wait polls the exited
    /// flag and gives up after the configured limit. Returns whether the exit
    /// was observed.
    pub fn terminate(&mut self) -> Result<bool>
    {
        if !self.state.has_exited() {
            if let Err(err) = self.controller.stop() {
                warn!("Failed to stop before terminate: {err}");
            }
            self.disable_all()?;
            self.controller.terminate()?;
        }

        let deadline = Instant::now() + self.config.exit_wait_limit;
        while !self.state.has_exited() {
            if Instant::now() >= deadline {
                warn!("Debuggee did not exit within {:?}", self.config.exit_wait_limit);
                break;
            }
            thread::sleep(self.config.exit_poll_interval);
        }

        let exited = self.state.has_exited();
        self.controller.release();
        if exited {
            self.join_dispatcher();
        }
        info!("Terminated (exit observed: {exited})");
        Ok(exited)
    }

    /// Disable breakpoints and steppers, then detach, leaving the debuggee running.
    pub fn detach(&mut self) -> Result<()>
    {
        if let Err(err) = self.controller.stop() {
            warn!("Failed to stop before detach: {err}");
        }
        self.disable_all()?;
        self.controller.detach()
    }

    /// End the session: detach if the debuggee is still attached.
    pub fn shutdown(&mut self) -> Result<()>
    {
        if self.controller.is_attached() && !self.state.has_exited() {
            return self.detach();
        }
        self.controller.release();
        Ok(())
    }

    fn join_dispatcher(&mut self)
    {
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                warn!("Event dispatcher thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Session
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Session")
            .field("controller", &self.controller)
            .field("current_thread", &self.state.current_thread())
            .field("exited", &self.state.has_exited())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
