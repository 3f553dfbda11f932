//! Runtime callbacks and front-end notifications.
//!
//! Two kinds of events flow through the debugger:
//!
//! - [`RuntimeEvent`]: what the debugging runtime reports. Backends publish
//!   these into the channel created by [`event_channel`]; a single dispatcher
//!   thread drains it.
//! - [`Notification`]: what the front-end is told. The dispatcher turns
//!   runtime events into notifications and hands them to a
//!   [`NotificationSink`] (the protocol writer, or a recorder in tests).

use std::fmt;
use std::sync::mpsc;

use crate::breakpoints::BreakpointId;
use crate::runtime::NativeBreakpoint;
use crate::types::{ModuleId, ModuleInfo, SourceLocation, StackFrame, ThreadId, Value};

/// Stage at which an exception callback is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionStage
{
    FirstChance,
    UserFirstChance,
    CatchHandlerFound,
    Unhandled,
}

impl ExceptionStage
{
    #[must_use]
    pub fn is_unhandled(self) -> bool
    {
        self == Self::Unhandled
    }
}

impl fmt::Display for ExceptionStage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Self::FirstChance => "first-chance",
            Self::UserFirstChance => "user-first-chance",
            Self::CatchHandlerFound => "catch-handler-found",
            Self::Unhandled => "unhandled",
        };
        write!(f, "{label}")
    }
}

/// Callback delivered by the debugging runtime.
///
/// The runtime never delivers two callbacks for one process at the same
/// time, and after each one it waits for the debugger to either continue the
/// process or leave it stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent
{
    /// A bound breakpoint was hit.
    Breakpoint
    {
        thread: ThreadId,
        breakpoint: NativeBreakpoint,
    },
    /// A stepper reached its stopping condition.
    StepComplete
    {
        thread: ThreadId
    },
    /// The debuggee called `Debugger.Break()`.
    Break
    {
        thread: ThreadId
    },
    /// Exception callback at one of its stages.
    Exception
    {
        thread: ThreadId,
        stage: ExceptionStage,
        /// Exception type, when the runtime could read it.
        type_name: Option<String>,
        /// Module the exception was thrown in.
        module_name: Option<String>,
    },
    /// Frames are being unwound for an exception.
    ExceptionUnwind
    {
        thread: ThreadId
    },
    /// A function evaluation returned.
    EvalComplete
    {
        thread: ThreadId, result: Value
    },
    /// A function evaluation threw.
    EvalException
    {
        thread: ThreadId, exception: Value
    },
    CreateProcess,
    ExitProcess
    {
        exit_code: i32
    },
    CreateThread
    {
        thread: ThreadId
    },
    ExitThread
    {
        thread: ThreadId
    },
    LoadModule
    {
        module: ModuleInfo
    },
    UnloadModule
    {
        module: ModuleId
    },
    LoadAssembly
    {
        name: String
    },
    UnloadAssembly
    {
        name: String
    },
    CreateAppDomain
    {
        name: String
    },
    ExitAppDomain
    {
        name: String
    },
    LoadClass,
    UnloadClass,
    /// `System.Diagnostics.Debugger.Log` output.
    LogMessage
    {
        message: String
    },
    /// The runtime's debugger-side support failed.
    DebuggerError
    {
        code: u32
    },
}

impl RuntimeEvent
{
    /// Callback name, for logs and `=message` records.
    #[must_use]
    pub fn name(&self) -> &'static str
    {
        match self {
            Self::Breakpoint { .. } => "Breakpoint",
            Self::StepComplete { .. } => "StepComplete",
            Self::Break { .. } => "Break",
            Self::Exception { .. } => "Exception",
            Self::ExceptionUnwind { .. } => "ExceptionUnwind",
            Self::EvalComplete { .. } => "EvalComplete",
            Self::EvalException { .. } => "EvalException",
            Self::CreateProcess => "CreateProcess",
            Self::ExitProcess { .. } => "ExitProcess",
            Self::CreateThread { .. } => "CreateThread",
            Self::ExitThread { .. } => "ExitThread",
            Self::LoadModule { .. } => "LoadModule",
            Self::UnloadModule { .. } => "UnloadModule",
            Self::LoadAssembly { .. } => "LoadAssembly",
            Self::UnloadAssembly { .. } => "UnloadAssembly",
            Self::CreateAppDomain { .. } => "CreateAppDomain",
            Self::ExitAppDomain { .. } => "ExitAppDomain",
            Self::LoadClass => "LoadClass",
            Self::UnloadClass => "UnloadClass",
            Self::LogMessage { .. } => "LogMessage",
            Self::DebuggerError { .. } => "DebuggerError",
        }
    }
}

/// Why the debuggee is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason
{
    BreakpointHit
    {
        id: BreakpointId
    },
    EndSteppingRange,
    ExceptionReceived
    {
        stage: ExceptionStage
    },
    /// Stopped on request or by `Debugger.Break()`.
    Interrupted,
    Exited(i32),
}

impl fmt::Display for StopReason
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::BreakpointHit { id } => write!(f, "Hit breakpoint {}", id.raw()),
            Self::EndSteppingRange => write!(f, "Step complete"),
            Self::ExceptionReceived { stage } => write!(f, "Exception received ({stage})"),
            Self::Interrupted => write!(f, "Interrupted"),
            Self::Exited(code) => write!(f, "Process exited with code: {code}"),
        }
    }
}

/// Asynchronous record for the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification
{
    LibraryLoaded
    {
        module: ModuleInfo,
        symbols_loaded: bool,
    },
    ThreadCreated
    {
        thread: ThreadId
    },
    ThreadExited
    {
        thread: ThreadId
    },
    /// Execution stopped. For exits, `thread` and `frame` are `None`.
    Stopped
    {
        reason: StopReason,
        thread: Option<ThreadId>,
        /// Innermost frame with its resolved source location.
        frame: Option<StackFrame>,
    },
    /// A breakpoint changed binding state.
    BreakpointModified
    {
        id: BreakpointId,
        /// Matched source file when bound, requested location when pending.
        location: SourceLocation,
        bound: bool,
    },
    /// Free-form text for the output window.
    Message
    {
        text: String
    },
}

impl Notification
{
    /// Human-readable description, used for logs.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::LibraryLoaded { module, .. } => format!("Loaded {}", module.name),
            Self::ThreadCreated { thread } => format!("Thread {thread} created"),
            Self::ThreadExited { thread } => format!("Thread {thread} exited"),
            Self::Stopped { reason, thread, .. } => {
                let mut description = reason.to_string();
                if let Some(thread_id) = thread {
                    description.push_str(&format!(" (thread {})", thread_id.raw()));
                }
                description
            }
            Self::BreakpointModified { id, location, bound } => {
                let state = if *bound { "bound" } else { "pending" };
                format!("Breakpoint {} at {location} is {state}", id.raw())
            }
            Self::Message { text } => text.clone(),
        }
    }
}

/// Receiver of front-end notifications.
///
/// Called from the dispatcher thread; implementations must serialize their
/// output against synchronous replies.
pub trait NotificationSink: Send + Sync
{
    fn notify(&self, notification: Notification);
}

/// Sender side of the runtime event channel.
pub type EventSender = mpsc::Sender<RuntimeEvent>;
/// Receiver side of the runtime event channel.
pub type EventReceiver = mpsc::Receiver<RuntimeEvent>;

/// Create a new runtime event channel.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver)
{
    mpsc::channel()
}
