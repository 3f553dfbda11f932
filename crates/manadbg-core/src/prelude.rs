//! Common module for library exports

pub use crate::breakpoints::{Breakpoint, BreakpointId, BreakpointState};
pub use crate::error::{DebuggerError, EvalError, Result};
pub use crate::events::{Notification, NotificationSink, RuntimeEvent, StopReason};
pub use crate::runtime::{default_factory, RuntimeFactory, RuntimeProcess};
pub use crate::session::{Session, SessionConfig};
pub use crate::stepping::StepMode;
pub use crate::symbols::{NoSymbols, SymbolProvider};
pub use crate::types::{Address, FrameKind, ProcessId, SourceLocation, StackFrame, ThreadId, Value};
