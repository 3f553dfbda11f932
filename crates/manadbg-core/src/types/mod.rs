//! # Types
//!
//! Runtime-agnostic types used throughout the debugger.
//!
//! These types describe the debuggee (threads, modules, frames, values) without
//! tying the rest of the engine to a particular debugging-interface binding.

pub mod address;
pub mod process;
pub mod stack;
pub mod symbols;
pub mod value;

// Re-export all public types
pub use address::Address;
pub use process::{ProcessId, ThreadId, ThreadInfo, ThreadState};
pub use stack::{FrameKind, StackFrame};
pub use symbols::{
    file_name_of, FunctionRef, IlOffset, IlRange, MethodToken, ModuleId, ModuleInfo, SequencePoint, SourceLocation,
    HIDDEN_LINE,
};
pub use value::{Decimal, DecimalParts, Primitive, Value, ValueData, ValueHandle};
