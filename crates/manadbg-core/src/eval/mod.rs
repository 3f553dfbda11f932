//! # Expression Evaluation
//!
//! Watch and print expressions are compiled to a postfix program
//! ([`compile`]) and run by the [`EvalStackMachine`] against a frame of a
//! stopped thread. Evaluations that run managed code complete through the
//! [`EvalWaiter`], which the event dispatcher fills.

pub mod machine;
pub mod parser;
pub mod predefined;
pub mod waiter;

pub use machine::{EvalStackEntry, EvalStackMachine, EXCEPTION_VARIABLE};
pub use parser::{compile, EvalCommand, Literal};
pub use predefined::{PredefinedTypes, CORE_LIBRARY};
pub use waiter::{EvalOutcome, EvalWaiter};
