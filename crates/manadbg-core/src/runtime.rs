//! # Runtime Interface
//!
//! The seam between the engine and the managed runtime's debugging interface.
//!
//! The CoreCLR debugging interface is a versioned COM-style API loaded from the
//! debuggee's runtime directory. Everything the engine needs from it is
//! expressed here as a small set of traits:
//!
//! - [`RuntimeFactory`]: attach-by-pid, produces a [`RuntimeProcess`]
//! - [`RuntimeProcess`]: run control, memory, threads, breakpoints, steppers
//! - [`Stepper`]: one run-control request
//! - [`StackWalk`]: a "fetch next frame" cursor over a stopped thread
//! - [`ValueInspector`]: value queries and function evaluation for the evaluator
//!
//! Callbacks do not go through these traits. A backend publishes
//! [`RuntimeEvent`](crate::events::RuntimeEvent)s into the
//! [`EventSender`] it received at attach time, and the engine decides whether
//! the debuggee resumes.
//!
//! ## Thread Safety
//!
//! `RuntimeProcess` and `ValueInspector` are `Send + Sync`: the command loop
//! and the event-dispatcher thread both call into them. Backends must not
//! deliver events synchronously from inside one of these calls while holding
//! their own locks; the engine never holds its locks across a call either.

use std::fs;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DebuggerError, Result};
use crate::events::EventSender;
use crate::types::{
    Address, DecimalParts, FunctionRef, IlOffset, IlRange, ModuleId, Primitive, ProcessId, ThreadId, ThreadInfo, Value,
};

/// File name of the runtime image the debugging shim must match.
pub const RUNTIME_IMAGE_NAME: &str = "libcoreclr.so";

/// Handle of a breakpoint installed by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeBreakpoint(pub u64);

/// Runtime handle of a class (used for static access and literal construction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassHandle(pub u64);

/// Runtime handle of a callable method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle(pub u64);

/// Which runtime-internal code a stepper is allowed to stop in.
///
/// Mirrors the `CorDebugIntercept` bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptMask(u32);

impl InterceptMask
{
    pub const NONE: Self = Self(0);
    pub const CLASS_INIT: Self = Self(0x01);
    pub const EXCEPTION_FILTER: Self = Self(0x02);
    pub const SECURITY: Self = Self(0x04);
    pub const CONTEXT_POLICY: Self = Self(0x08);
    pub const INTERCEPTION: Self = Self(0x10);
    pub const ALL: Self = Self(0xffff);

    /// Mask used for every user-visible step: everything except class
    /// initializers and security stubs.
    pub const USER_STEP: Self = Self(Self::ALL.0 & !(Self::SECURITY.0 | Self::CLASS_INIT.0));

    #[must_use]
    pub const fn bits(self) -> u32
    {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool
    {
        self.0 & other.0 == other.0
    }
}

/// What the runtime returned for one step of a stack walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkStep
{
    /// No more frames.
    EndOfStack,
    /// A frame exists but the runtime could not describe it (unmanaged code).
    Unresolvable,
    /// A frame the runtime could describe.
    Frame(RawFrame),
}

/// A frame as the runtime describes it, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame
{
    /// Unmanaged code.
    Native,
    /// Runtime helper frame.
    RuntimeUnwindable,
    /// Frame offering an IL interpretation. `function` is `None` when the
    /// runtime cannot produce a function for it (IL stubs, dynamic methods).
    Il
    {
        function: Option<FunctionRef>,
        il_offset: IlOffset,
    },
    /// Frame that offers no IL interpretation.
    Other,
}

/// Cursor over the frames of one stopped thread, innermost first.
pub trait StackWalk
{
    /// Advance to the next frame.
    fn next_frame(&mut self) -> Result<WalkStep>;
}

/// A runtime stepper created for one run-control request.
pub trait Stepper: Send
{
    fn set_intercept_mask(&mut self, mask: InterceptMask) -> Result<()>;

    /// Stop when the current frame returns.
    fn step_out(&mut self) -> Result<()>;

    /// Stop when execution leaves all of `ranges` in the current frame.
    fn step_range(&mut self, step_in: bool, ranges: &[IlRange]) -> Result<()>;

    /// Stop after a single instruction.
    fn step(&mut self, step_in: bool) -> Result<()>;

    fn deactivate(&mut self) -> Result<()>;
}

/// Something a member lookup can be performed on.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a>
{
    /// Instance members of a resolved value.
    Instance(&'a Value),
    /// Static members of a class.
    Class(ClassHandle),
}

/// Result of looking up a field or property.
#[derive(Debug, Clone, PartialEq)]
pub enum Member
{
    /// A field, read directly.
    Value(Value),
    /// A property; its getter has to be evaluated in the debuggee.
    Getter(MethodHandle),
}

/// Value queries used by the evaluator and `stack-list-variables`.
///
/// `frame` is the frame index as produced by the stack walker (0 = innermost).
pub trait ValueInspector: Send + Sync
{
    /// Arguments and locals of a frame, in declaration order. `this` is not included.
    fn frame_variables(&self, thread: ThreadId, frame: usize) -> Result<Vec<(String, Value)>>;

    /// A single argument or local by name.
    fn frame_variable(&self, thread: ThreadId, frame: usize, name: &str) -> Result<Option<Value>>
    {
        Ok(self
            .frame_variables(thread, frame)?
            .into_iter()
            .find_map(|(candidate, value)| (candidate == name).then_some(value)))
    }

    /// `this` of an instance method frame.
    fn this_value(&self, thread: ThreadId, frame: usize) -> Result<Option<Value>>;

    /// Exception currently in flight on `thread`, if any.
    fn current_exception(&self, thread: ThreadId) -> Result<Option<Value>>;

    /// Field or property named `name`.
    fn member(&self, owner: Owner<'_>, name: &str) -> Result<Option<Member>>;

    /// Method named `name` that can be invoked on `owner`.
    fn method(&self, owner: Owner<'_>, name: &str) -> Result<Option<MethodHandle>>;

    /// Class by fully qualified name, searched in `module` or in every loaded module.
    fn find_class(&self, module: Option<ModuleId>, name: &str) -> Result<Option<ClassHandle>>;

    /// Element of an array, `None` when an index is out of bounds.
    fn element(&self, array: &Value, indices: &[u32]) -> Result<Option<Value>>;

    fn create_primitive(&self, thread: ThreadId, value: Primitive) -> Result<Value>;

    fn create_string(&self, thread: ThreadId, text: &str) -> Result<Value>;

    /// Materialize a `System.Decimal` from its field layout.
    fn create_decimal(&self, thread: ThreadId, class: ClassHandle, parts: DecimalParts) -> Result<Value>;

    /// Start running `method` on `thread`.
    ///
    /// The result arrives later as an `EvalComplete` or `EvalException` event,
    /// after the process has been continued.
    fn begin_call(&self, thread: ThreadId, method: MethodHandle, this: Option<&Value>, args: &[Value]) -> Result<()>;

    /// Abort the evaluation outstanding on `thread`.
    fn abort_eval(&self, thread: ThreadId) -> Result<()>;
}

/// An attached debuggee, as seen through the debugging interface.
pub trait RuntimeProcess: Send + Sync
{
    fn pid(&self) -> ProcessId;

    fn continue_execution(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn terminate(&self) -> Result<()>;

    fn detach(&self) -> Result<()>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Fails when the first byte is not readable.
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<usize>;

    fn threads(&self) -> Result<Vec<ThreadInfo>>;

    /// Install a breakpoint at an IL offset of a loaded method.
    fn create_breakpoint(&self, function: FunctionRef, offset: IlOffset) -> Result<NativeBreakpoint>;

    fn set_breakpoint_active(&self, breakpoint: NativeBreakpoint, active: bool) -> Result<()>;

    fn create_stepper(&self, thread: ThreadId) -> Result<Box<dyn Stepper>>;

    fn stack_walk(&self, thread: ThreadId) -> Result<Box<dyn StackWalk + '_>>;

    /// Function and IL offset of the innermost managed frame.
    fn active_frame(&self, thread: ThreadId) -> Result<Option<(FunctionRef, IlOffset)>>;

    fn inspector(&self) -> &dyn ValueInspector;
}

/// Versioned attach-by-pid entry point of a debugging interface binding.
pub trait RuntimeFactory
{
    /// Attach to `pid`. Every callback for the process is published to `events`.
    fn attach(&self, pid: ProcessId, events: EventSender) -> Result<Arc<dyn RuntimeProcess>>;
}

/// Find the runtime image mapped into `pid`.
///
/// Scans `/proc/<pid>/maps` for a mapping whose path ends in `/libcoreclr.so`.
///
/// ## Errors
///
/// - `ProcessNotFound`: `/proc/<pid>` does not exist
/// - `RuntimeImageNotFound`: the process has no runtime image mapped
pub fn locate_runtime_image(pid: ProcessId) -> Result<String>
{
    let maps = fs::read_to_string(format!("/proc/{pid}/maps")).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            DebuggerError::ProcessNotFound(pid.0)
        } else {
            DebuggerError::Io(err)
        }
    })?;
    find_runtime_image(&maps).ok_or(DebuggerError::RuntimeImageNotFound(pid))
}

/// Search the text of a `maps` file for the runtime image path.
pub fn find_runtime_image(maps: &str) -> Option<String>
{
    let suffix = format!("/{RUNTIME_IMAGE_NAME}");
    maps.lines()
        .filter_map(|line| line.split_whitespace().nth(5))
        .find(|path| path.ends_with(&suffix))
        .map(str::to_string)
}

/// Factory used when no debugging interface binding is linked in
///
/// Runs the same runtime-image discovery a real binding performs, then
/// reports that no binding is available to load the debugging shim.
#[derive(Debug, Default)]
pub struct UnavailableRuntime;

impl RuntimeFactory for UnavailableRuntime
{
    fn attach(&self, pid: ProcessId, _events: EventSender) -> Result<Arc<dyn RuntimeProcess>>
    {
        let image = locate_runtime_image(pid)?;
        info!("Found runtime image {image} in process {pid}");
        debug!("No debugging interface binding available");
        Err(DebuggerError::AttachFailed(format!(
            "no debugging interface is available for the runtime at {image}"
        )))
    }
}

/// Create the runtime factory for the current platform.
///
/// Returns an error on platforms where the managed runtime cannot be debugged.
pub fn default_factory() -> Result<Box<dyn RuntimeFactory>>
{
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(UnavailableRuntime))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(DebuggerError::AttachFailed(
            "Attaching to managed processes is only supported on Linux".to_string(),
        ))
    }
}
