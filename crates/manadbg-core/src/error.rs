//! # Error Types
//!
//! General error handling for the debugger.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use std::time::Duration;

use thiserror::Error;

use crate::types::ProcessId;

/// Main error type for debugger operations
///
/// ## Error Categories
///
/// 1. **Attach errors** (fatal during startup): AttachFailed, ProcessNotFound,
///    RuntimeImageNotFound, VersionMismatch
/// 2. **State errors**: NotAttached, NoCurrentThread
/// 3. **Runtime call errors**: RuntimeCall
/// 4. **Evaluation errors**: Evaluation
/// 5. **Argument errors**: InvalidArgument
/// 6. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum DebuggerError
{
    /// The process with the given PID doesn't exist or has exited
    #[error("Process not found: PID {0}")]
    ProcessNotFound(u32),

    /// No `libcoreclr.so` mapping was found in the target process
    ///
    /// Either the PID belongs to a process that is not running managed code,
    /// or the runtime has not been loaded yet.
    #[error("Unable to find the managed runtime image in process {0}")]
    RuntimeImageNotFound(ProcessId),

    /// The debuggee's runtime version is not supported by the debugging interface
    #[error("Runtime version mismatch: {0}")]
    VersionMismatch(String),

    /// Failed to attach to a process
    ///
    /// General attach failure that doesn't fit the more specific variants above.
    #[error("Failed to attach to process: {0}")]
    AttachFailed(String),

    /// Operation requires an attached process
    ///
    /// Returned after detach/terminate, or when the debuggee has exited.
    #[error("Not attached to a process")]
    NotAttached,

    /// Operation needs a stopped thread, but nothing has stopped yet
    ///
    /// The current thread is only set by stop events (breakpoint hit, step
    /// complete, unhandled exception).
    #[error("No current thread: the process has not stopped")]
    NoCurrentThread,

    /// A call into the debugging interface failed
    ///
    /// `code` is the status code the runtime returned (an HRESULT for the
    /// CoreCLR debugging interface).
    #[error("{operation} failed: HRESULT=0x{code:08x}")]
    RuntimeCall
    {
        /// Name of the failing operation, e.g. `Continue` or `CreateStepper`
        operation: &'static str,
        /// Status code reported by the runtime
        code: u32,
    },

    /// Expression evaluation failed
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    /// Invalid argument passed to a debugger function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (reading `/proc`, log files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DebuggerError
{
    /// Shorthand for a failed runtime call.
    pub fn runtime(operation: &'static str, code: u32) -> Self
    {
        Self::RuntimeCall { operation, code }
    }

    /// Whether this error must abort startup.
    ///
    /// Only the attach family is fatal; everything else is reported to the
    /// front-end and the command loop keeps going.
    #[must_use]
    pub fn is_fatal(&self) -> bool
    {
        matches!(
            self,
            Self::ProcessNotFound(_) | Self::RuntimeImageNotFound(_) | Self::VersionMismatch(_) | Self::AttachFailed(_)
        )
    }
}

/// Failure of an expression evaluation
///
/// These never end the session; the front-end receives them as the result of
/// the evaluation request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError
{
    /// The expression text could not be compiled
    #[error("Syntax error at {position}: {message}")]
    Syntax
    {
        /// Byte offset in the expression
        position: usize,
        message: String,
    },

    /// No local, member, type, or synthesized variable carries this name
    #[error("The name '{0}' does not exist in the current context")]
    UnresolvedIdentifier(String),

    /// The operation does not apply to the operand's type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Member or element access through a null reference
    #[error("Object reference not set to an instance of an object: '{0}'")]
    NullReference(String),

    /// Index outside the array bounds
    #[error("Index was outside the bounds of the array")]
    IndexOutOfRange,

    /// The evaluated call did not complete in time
    #[error("Evaluation timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The evaluated code threw
    #[error("Evaluation threw an exception of type '{0}'")]
    ExceptionThrown(String),

    /// Another evaluation is still outstanding on this thread
    #[error("An evaluation is already in progress on thread {0}")]
    Busy(u32),

    /// The debuggee exited while the evaluation was waiting
    #[error("The debuggee exited during evaluation")]
    ProcessExited,

    /// A runtime call made on behalf of the evaluation failed
    #[error("{operation} failed: HRESULT=0x{code:08x}")]
    Runtime
    {
        operation: &'static str,
        code: u32,
    },

    /// A predefined runtime type needed for a literal has not been loaded
    #[error("Type '{0}' is not available yet")]
    MissingPredefinedType(&'static str),
}

impl From<DebuggerError> for EvalError
{
    fn from(err: DebuggerError) -> Self
    {
        match err {
            DebuggerError::Evaluation(inner) => inner,
            DebuggerError::RuntimeCall { operation, code } => EvalError::Runtime { operation, code },
            DebuggerError::NotAttached => EvalError::ProcessExited,
            other => EvalError::TypeMismatch(other.to_string()),
        }
    }
}

/// Convenience type alias for `Result<T, DebuggerError>`
///
/// ```rust
/// use manadbg_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DebuggerError>;
