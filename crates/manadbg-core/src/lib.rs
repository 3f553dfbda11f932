//! # manadbg-core
//!
//! Debuggee control and event engine for managed (.NET Core) processes.
//!
//! This crate provides the engine behind the `manadbg` front-end protocol:
//! - Process attachment and run control ([`process`], [`session`])
//! - Source breakpoints bound through sequence points ([`breakpoints`], [`symbols`])
//! - Stepping in, over and out ([`stepping`])
//! - Stack walking with source locations ([`stack`])
//! - Runtime callback dispatch ([`dispatcher`], [`events`])
//! - Watch expression evaluation ([`eval`])
//!
//! ## Runtime interface
//!
//! The managed runtime is driven through its debugging interface, described
//! by the traits in [`runtime`]. Backends implement them; the engine never
//! touches the interface directly.
//!
//! ## Why unsafe code is needed
//!
//! Reading the host page size goes through `libc::sysconf`. The call is
//! wrapped in a safe accessor ([`process::page_size`]).

#![allow(unsafe_code)] // Required for sysconf

pub mod breakpoints;
pub mod dispatcher;
pub mod error;
pub mod eval;
pub mod events;
pub mod prelude;
pub mod process;
pub mod runtime;
pub mod session;
pub mod stack;
pub mod state;
pub mod stepping;
pub mod symbols;
pub mod types;

pub use error::{DebuggerError, EvalError, Result};
pub use session::{Session, SessionConfig};
pub use types::{ProcessId, ThreadId};
