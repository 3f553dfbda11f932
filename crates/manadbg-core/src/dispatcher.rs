//! # Event Dispatcher
//!
//! Decides what happens after every runtime callback.
//!
//! The runtime delivers callbacks one at a time and waits, after each one,
//! for the debugger to continue the process. The dispatcher drains the event
//! channel on its own thread and applies one policy per event class:
//!
//! - **Stopping events** (breakpoint hit, step complete, unhandled exception):
//!   record the stopped thread as current, emit `*stopped` with the source
//!   location of the active frame, and leave the process stopped.
//! - **Bookkeeping events** (module, thread, assembly and app-domain
//!   lifecycle, handled exceptions, log messages): update state, emit a
//!   notification, and continue the process. Nothing else would.
//! - **Evaluation results**: hand the result to the waiting evaluator and
//!   leave the process stopped.
//! - **Process exit**: set the exited flag, fail pending evaluations, emit
//!   the exit record.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};

use crate::breakpoints::BreakpointTable;
use crate::error::EvalError;
use crate::eval::{EvalStackMachine, PredefinedTypes};
use crate::events::{EventReceiver, ExceptionStage, Notification, NotificationSink, RuntimeEvent, StopReason};
use crate::process::ProcessController;
use crate::stack::StackWalker;
use crate::state::SessionState;
use crate::stepping::StepEngine;
use crate::symbols::SymbolStore;
use crate::types::{ModuleId, ModuleInfo, SourceLocation, ThreadId};

/// What to do with the debuggee after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition
{
    /// Continue the process.
    Resume,
    /// Leave it stopped; the command loop owns the next transition.
    Halt,
}

/// Handles runtime events against the session's shared state.
pub struct EventDispatcher
{
    pub(crate) controller: ProcessController,
    pub(crate) state: Arc<SessionState>,
    pub(crate) breakpoints: Arc<Mutex<BreakpointTable>>,
    pub(crate) symbols: Arc<RwLock<SymbolStore>>,
    pub(crate) steps: Arc<Mutex<StepEngine>>,
    pub(crate) evaluator: Arc<EvalStackMachine>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) walker: StackWalker,
}

impl EventDispatcher
{
    fn breakpoints(&self) -> MutexGuard<'_, BreakpointTable>
    {
        self.breakpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn symbols(&self) -> RwLockReadGuard<'_, SymbolStore>
    {
        self.symbols.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn symbols_mut(&self) -> RwLockWriteGuard<'_, SymbolStore>
    {
        self.symbols.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the policy for `event` and return the resulting disposition.
    ///
    /// Does not continue the process itself; see [`handle`](Self::handle).
    pub fn dispatch(&self, event: RuntimeEvent) -> Disposition
    {
        trace!("Dispatching {}", event.name());
        match event {
            RuntimeEvent::Breakpoint { thread, breakpoint } => {
                if self.is_evaluating(thread) {
                    return Disposition::Resume;
                }
                match self.breakpoints().record_hit(breakpoint) {
                    Some(id) => self.stop(thread, StopReason::BreakpointHit { id }),
                    None => {
                        debug!("Hit on unknown native breakpoint {breakpoint:?}, resuming");
                        Disposition::Resume
                    }
                }
            }
            RuntimeEvent::StepComplete { thread } => {
                if self.is_evaluating(thread) {
                    return Disposition::Resume;
                }
                self.steps.lock().unwrap_or_else(PoisonError::into_inner).complete(thread);
                self.stop(thread, StopReason::EndSteppingRange)
            }
            RuntimeEvent::Exception {
                thread,
                stage,
                type_name,
                module_name,
            } => self.exception(thread, stage, type_name, module_name),
            RuntimeEvent::ExceptionUnwind { thread } => {
                debug!("Exception unwind on thread {thread}");
                Disposition::Resume
            }
            RuntimeEvent::EvalComplete { thread, result } => {
                self.evaluator.waiter().complete(thread, Ok(result));
                Disposition::Halt
            }
            RuntimeEvent::EvalException { thread, exception } => {
                let error = EvalError::ExceptionThrown(exception.type_name);
                self.evaluator.waiter().complete(thread, Err(error));
                Disposition::Halt
            }
            RuntimeEvent::ExitProcess { exit_code } => {
                info!("Debuggee exited with code {exit_code}");
                self.state.mark_exited(exit_code);
                self.evaluator.waiter().fail_all(&EvalError::ProcessExited);
                self.sink.notify(Notification::Stopped {
                    reason: StopReason::Exited(exit_code),
                    thread: None,
                    frame: None,
                });
                Disposition::Halt
            }
            RuntimeEvent::CreateThread { thread } => {
                self.sink.notify(Notification::ThreadCreated { thread });
                Disposition::Resume
            }
            RuntimeEvent::ExitThread { thread } => {
                self.state.clear_thread(thread);
                self.sink.notify(Notification::ThreadExited { thread });
                Disposition::Resume
            }
            RuntimeEvent::LoadModule { module } => {
                self.load_module(&module);
                Disposition::Resume
            }
            RuntimeEvent::UnloadModule { module } => {
                self.unload_module(module);
                Disposition::Resume
            }
            RuntimeEvent::LogMessage { message } => {
                self.sink.notify(Notification::Message { text: message });
                Disposition::Resume
            }
            RuntimeEvent::DebuggerError { code } => {
                warn!("Runtime reported a debugger error: HRESULT=0x{code:08x}");
                self.message(&format!("Debugger error: HRESULT=0x{code:08x}"));
                Disposition::Resume
            }
            event @ (RuntimeEvent::Break { .. }
            | RuntimeEvent::ExitAppDomain { .. }
            | RuntimeEvent::LoadClass
            | RuntimeEvent::UnloadClass) => {
                self.message(&format!("event received {}", event.name()));
                Disposition::Resume
            }
            RuntimeEvent::CreateProcess
            | RuntimeEvent::CreateAppDomain { .. }
            | RuntimeEvent::LoadAssembly { .. }
            | RuntimeEvent::UnloadAssembly { .. } => {
                debug!("{} event", event.name());
                Disposition::Resume
            }
        }
    }

    /// Dispatch `event` and continue the process when the policy says so.
    pub fn handle(&self, event: RuntimeEvent) -> Disposition
    {
        let disposition = self.dispatch(event);
        if disposition == Disposition::Resume {
            if let Err(err) = self.controller.continue_execution() {
                warn!("Failed to resume after event: {err}");
            }
        }
        disposition
    }

    /// Drain `events` until the process exits or the channel closes.
    pub fn run(self, events: EventReceiver)
    {
        for event in events {
            let exited = matches!(event, RuntimeEvent::ExitProcess { .. });
            self.handle(event);
            if exited {
                break;
            }
        }
        debug!("Event dispatcher stopped");
    }

    /// Run the dispatcher on a dedicated `event-dispatcher` thread.
    pub fn spawn(self, events: EventReceiver) -> io::Result<JoinHandle<()>>
    {
        thread::Builder::new()
            .name("event-dispatcher".to_string())
            .spawn(move || self.run(events))
    }

    fn is_evaluating(&self, thread: ThreadId) -> bool
    {
        let evaluating = self.evaluator.waiter().is_pending(thread);
        if evaluating {
            debug!("Thread {thread} is evaluating, not reporting a stop");
        }
        evaluating
    }

    fn message(&self, text: &str)
    {
        self.sink.notify(Notification::Message { text: text.to_string() });
    }

    /// Record `thread` as current and report the stop.
    fn stop(&self, thread: ThreadId, reason: StopReason) -> Disposition
    {
        self.state.set_current_thread(thread);

        let frame = match self.controller.handle() {
            Ok(process) => self
                .walker
                .top_frame(process.as_ref(), &self.symbols(), thread)
                .unwrap_or_else(|err| {
                    warn!("Failed to resolve stop location on thread {thread}: {err}");
                    None
                }),
            Err(err) => {
                warn!("Stop on thread {thread} without a process: {err}");
                None
            }
        };

        info!("{reason} on thread {thread}");
        self.sink.notify(Notification::Stopped {
            reason,
            thread: Some(thread),
            frame,
        });
        Disposition::Halt
    }

    fn exception(
        &self,
        thread: ThreadId,
        stage: ExceptionStage,
        type_name: Option<String>,
        module_name: Option<String>,
    ) -> Disposition
    {
        if stage.is_unhandled() && !self.is_evaluating(thread) {
            return self.stop(thread, StopReason::ExceptionReceived { stage });
        }
        let type_name = type_name.as_deref().unwrap_or("<unknown>");
        let module_name = module_name.as_deref().unwrap_or("<unknown>");
        debug!("Exception {type_name} ({stage}) on thread {thread}");
        self.message(&format!("Exception thrown: '{type_name}' in {module_name}\n"));
        Disposition::Resume
    }

    fn load_module(&self, module: &ModuleInfo)
    {
        let symbols_loaded = self.symbols_mut().load_module(module);
        self.sink.notify(Notification::LibraryLoaded {
            module: module.clone(),
            symbols_loaded,
        });

        let process = match self.controller.handle() {
            Ok(process) => process,
            Err(err) => {
                warn!("Module {} loaded without a process: {err}", module.name);
                return;
            }
        };

        if PredefinedTypes::is_core_library(module) {
            if let Err(err) = self.evaluator.find_predefined_types(process.inspector(), module.id) {
                warn!("Failed to locate predefined types: {err}");
            }
        }

        if !symbols_loaded {
            return;
        }
        let resolved = {
            let mut breakpoints = self.breakpoints();
            let symbols = self.symbols();
            breakpoints.try_resolve_for_module(module.id, &symbols, process.as_ref())
        };
        for breakpoint in resolved {
            self.sink.notify(Notification::BreakpointModified {
                id: breakpoint.id,
                location: SourceLocation::new(breakpoint.fullname(), breakpoint.location.line),
                bound: true,
            });
        }
    }

    fn unload_module(&self, module: ModuleId)
    {
        let demoted = self.breakpoints().module_unloaded(module);
        for breakpoint in demoted {
            self.sink.notify(Notification::BreakpointModified {
                id: breakpoint.id,
                location: breakpoint.location,
                bound: false,
            });
        }
        if let Some(info) = self.symbols_mut().unload_module(module) {
            self.message(&format!("event received UnloadModule {}", info.name));
        }
    }
}
