//! # Evaluation Stack Machine
//!
//! Runs a compiled expression against one frame of a stopped thread.
//!
//! ## Stack entries
//!
//! An entry is either a chain of identifiers that has not been looked up yet
//! (`a.b.c` stays a chain until an operator needs its value) or a resolved
//! value. A value entry may carry the short-circuit flag set by `?.` and `?[`
//! on a null receiver; while it is set, every following operator passes the
//! entry through untouched and the expression ends up null.
//!
//! ## Identifier resolution
//!
//! When a chain is consumed, its head is looked up as:
//!
//! 1. an argument or local of the frame
//! 2. a field or property of `this`
//! 3. a type name (longest dotted prefix first), for static access
//! 4. a debugger-synthesized variable (`$exception`)
//!
//! The remaining identifiers are member accesses on the result.
//!
//! ## Function evaluation
//!
//! Property getters and invocations run managed code. The call is issued,
//! the debuggee is continued, and the machine waits on the
//! [`EvalWaiter`] for the dispatcher to deliver the result. The wait is
//! bounded; on timeout the call is aborted and a timeout is reported.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use smallvec::SmallVec;
use tracing::{debug, warn};

use super::parser::{compile, EvalCommand, Literal};
use super::predefined::PredefinedTypes;
use super::waiter::EvalWaiter;
use crate::error::{EvalError, Result};
use crate::runtime::{ClassHandle, Member, MethodHandle, Owner, RuntimeProcess, ValueInspector};
use crate::types::{ModuleId, Primitive, ThreadId, Value, ValueData};

/// Name of the synthesized variable holding the exception in flight.
pub const EXCEPTION_VARIABLE: &str = "$exception";

type Identifiers = SmallVec<[String; 4]>;

/// One entry of the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalStackEntry
{
    /// Identifiers not looked up yet, never empty.
    Identifiers(Identifiers),
    Value
    {
        value: Value,
        /// Set by a null-conditional operator on a null receiver.
        prevent_binding: bool,
    },
}

impl EvalStackEntry
{
    fn value(value: Value) -> Self
    {
        Self::Value {
            value,
            prevent_binding: false,
        }
    }

    fn short_circuit(value: Value) -> Self
    {
        Self::Value {
            value,
            prevent_binding: true,
        }
    }

    fn is_short_circuited(&self) -> bool
    {
        matches!(self, Self::Value { prevent_binding: true, .. })
    }
}

/// A resolved identifier chain: a value, or a class when static access is allowed.
enum Resolved
{
    Value(Value),
    Class(ClassHandle),
}

/// Evaluates watch expressions.
#[derive(Debug)]
pub struct EvalStackMachine
{
    waiter: Arc<EvalWaiter>,
    predefined: RwLock<PredefinedTypes>,
    timeout: Duration,
}

impl EvalStackMachine
{
    /// Create a machine whose function evaluations give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self
    {
        Self {
            waiter: Arc::new(EvalWaiter::new()),
            predefined: RwLock::new(PredefinedTypes::default()),
            timeout,
        }
    }

    /// Completion slots shared with the event dispatcher.
    #[must_use]
    pub fn waiter(&self) -> Arc<EvalWaiter>
    {
        Arc::clone(&self.waiter)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration
    {
        self.timeout
    }

    /// Locate the predefined classes in the core library.
    pub fn find_predefined_types(&self, inspector: &dyn ValueInspector, module: ModuleId) -> Result<()>
    {
        let types = PredefinedTypes::find(inspector, module)?;
        *self.predefined.write().unwrap_or_else(PoisonError::into_inner) = types;
        Ok(())
    }

    #[must_use]
    pub fn predefined_types(&self) -> PredefinedTypes
    {
        self.predefined.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Evaluate `expression` in frame `frame` of the stopped `thread`.
    pub fn evaluate(
        &self,
        process: &dyn RuntimeProcess,
        thread: ThreadId,
        frame: usize,
        expression: &str,
    ) -> std::result::Result<Value, EvalError>
    {
        let program = compile(expression)?;
        debug!("Evaluating '{expression}' on thread {thread}: {} commands", program.len());

        let predefined = self.predefined_types();
        let mut run = Evaluation {
            process,
            inspector: process.inspector(),
            thread,
            frame,
            waiter: &self.waiter,
            timeout: self.timeout,
            predefined: &predefined,
            stack: Vec::new(),
        };
        for command in program {
            run.execute(command)?;
        }
        run.finish()
    }
}

/// State of one evaluation call.
struct Evaluation<'a>
{
    process: &'a dyn RuntimeProcess,
    inspector: &'a dyn ValueInspector,
    thread: ThreadId,
    frame: usize,
    waiter: &'a EvalWaiter,
    timeout: Duration,
    predefined: &'a PredefinedTypes,
    stack: Vec<EvalStackEntry>,
}

type EvalResult<T> = std::result::Result<T, EvalError>;

impl Evaluation<'_>
{
    fn pop(&mut self) -> EvalResult<EvalStackEntry>
    {
        self.stack.pop().ok_or_else(|| EvalError::Syntax {
            position: 0,
            message: "malformed expression".to_string(),
        })
    }

    /// Pop `count` operands and resolve them to values, in push order.
    fn pop_values(&mut self, count: usize) -> EvalResult<Vec<Value>>
    {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let entry = self.pop()?;
            values.push(self.entry_value(entry)?);
        }
        values.reverse();
        Ok(values)
    }

    fn execute(&mut self, command: EvalCommand) -> EvalResult<()>
    {
        let entry = match command {
            EvalCommand::Identifier(name) => EvalStackEntry::Identifiers(SmallVec::from_elem(name, 1)),
            EvalCommand::This => {
                let this = self
                    .inspector
                    .this_value(self.thread, self.frame)?
                    .ok_or_else(|| EvalError::UnresolvedIdentifier("this".to_string()))?;
                EvalStackEntry::value(this)
            }
            EvalCommand::Literal(literal) => EvalStackEntry::value(self.literal(literal)?),
            EvalCommand::MemberAccess { name, conditional } => self.member_access(name, conditional)?,
            EvalCommand::ElementAccess { indices, conditional } => self.element_access(indices, conditional)?,
            EvalCommand::Invocation {
                method,
                args,
                receiver,
                conditional,
            } => self.invocation(&method, args, receiver, conditional)?,
        };
        self.stack.push(entry);
        Ok(())
    }

    fn finish(mut self) -> EvalResult<Value>
    {
        let entry = self.pop()?;
        if !self.stack.is_empty() {
            return Err(EvalError::Syntax {
                position: 0,
                message: "malformed expression".to_string(),
            });
        }
        self.entry_value(entry)
    }

    fn member_access(&mut self, name: String, conditional: bool) -> EvalResult<EvalStackEntry>
    {
        let entry = self.pop()?;
        if entry.is_short_circuited() {
            return Ok(entry);
        }
        let value = match entry {
            EvalStackEntry::Identifiers(mut chain) if !conditional => {
                chain.push(name);
                return Ok(EvalStackEntry::Identifiers(chain));
            }
            other => self.entry_value(other)?,
        };
        if value.is_null() && conditional {
            return Ok(EvalStackEntry::short_circuit(value));
        }
        Ok(EvalStackEntry::value(self.member_of(value, &name)?))
    }

    fn element_access(&mut self, count: usize, conditional: bool) -> EvalResult<EvalStackEntry>
    {
        let index_values = self.pop_values(count)?;
        let entry = self.pop()?;
        if entry.is_short_circuited() {
            return Ok(entry);
        }
        let array = self.entry_value(entry)?;
        if array.is_null() {
            return if conditional {
                Ok(EvalStackEntry::short_circuit(array))
            } else {
                Err(EvalError::NullReference("[]".to_string()))
            };
        }

        let ValueData::Array { dims } = &array.data else {
            return Err(EvalError::TypeMismatch(format!("cannot apply indexing to '{}'", array.type_name)));
        };
        if dims.len() != count {
            return Err(EvalError::TypeMismatch(format!(
                "wrong number of indices: expected {}, got {count}",
                dims.len()
            )));
        }

        let mut indices = Vec::with_capacity(count);
        for (index, dim) in index_values.iter().zip(dims) {
            let index = index
                .as_index()
                .ok_or_else(|| EvalError::TypeMismatch(format!("index must be an integer, got '{}'", index.type_name)))?;
            if index >= *dim {
                return Err(EvalError::IndexOutOfRange);
            }
            indices.push(index);
        }

        let element = self
            .inspector
            .element(&array, &indices)?
            .ok_or(EvalError::IndexOutOfRange)?;
        Ok(EvalStackEntry::value(element))
    }

    fn invocation(&mut self, method: &str, args: usize, receiver: bool, conditional: bool) -> EvalResult<EvalStackEntry>
    {
        let arguments = self.pop_values(args)?;

        let target = if receiver {
            let entry = self.pop()?;
            if entry.is_short_circuited() {
                return Ok(entry);
            }
            match entry {
                EvalStackEntry::Identifiers(chain) => self.resolve_chain(&chain, true)?,
                EvalStackEntry::Value { value, .. } => Resolved::Value(value),
            }
        } else {
            let this = self
                .inspector
                .this_value(self.thread, self.frame)?
                .ok_or_else(|| EvalError::UnresolvedIdentifier(method.to_string()))?;
            Resolved::Value(this)
        };

        let (handle, this) = match target {
            Resolved::Class(class) => (self.inspector.method(Owner::Class(class), method)?, None),
            Resolved::Value(value) if value.is_null() => {
                return if conditional {
                    Ok(EvalStackEntry::short_circuit(value))
                } else {
                    Err(EvalError::NullReference(method.to_string()))
                };
            }
            Resolved::Value(value) => {
                let owner = match value.data {
                    ValueData::Primitive(_) => Owner::Class(
                        self.predefined
                            .value_class(&value.type_name)
                            .ok_or_else(|| EvalError::TypeMismatch(format!("no methods known for '{}'", value.type_name)))?,
                    ),
                    _ => Owner::Instance(&value),
                };
                (self.inspector.method(owner, method)?, Some(value))
            }
        };

        let handle = handle.ok_or_else(|| EvalError::UnresolvedIdentifier(method.to_string()))?;
        let result = self.call(handle, this.as_ref(), &arguments)?;
        Ok(EvalStackEntry::value(result))
    }

    fn literal(&self, literal: Literal) -> EvalResult<Value>
    {
        let value = match literal {
            Literal::Int(value) => self.inspector.create_primitive(self.thread, Primitive::Int(value))?,
            Literal::UInt(value) => self.inspector.create_primitive(self.thread, Primitive::UInt(value))?,
            Literal::Float(value) => self.inspector.create_primitive(self.thread, Primitive::Float(value))?,
            Literal::Bool(value) => self.inspector.create_primitive(self.thread, Primitive::Bool(value))?,
            Literal::Char(value) => self.inspector.create_primitive(self.thread, Primitive::Char(value))?,
            Literal::String(text) => self.inspector.create_string(self.thread, &text)?,
            Literal::Decimal(value) => {
                let class = self
                    .predefined
                    .decimal()
                    .ok_or(EvalError::MissingPredefinedType(super::predefined::DECIMAL_CLASS))?;
                self.inspector.create_decimal(self.thread, class, value.parts())?
            }
            Literal::Null => Value::null("object"),
        };
        Ok(value)
    }

    fn entry_value(&mut self, entry: EvalStackEntry) -> EvalResult<Value>
    {
        match entry {
            EvalStackEntry::Value { value, .. } => Ok(value),
            EvalStackEntry::Identifiers(chain) => match self.resolve_chain(&chain, false)? {
                Resolved::Value(value) => Ok(value),
                Resolved::Class(_) => Err(EvalError::TypeMismatch(format!(
                    "'{}' is a type, which is not valid in this context",
                    chain.join(".")
                ))),
            },
        }
    }

    fn resolve_chain(&mut self, chain: &[String], allow_class: bool) -> EvalResult<Resolved>
    {
        let Some((head, rest)) = chain.split_first() else {
            return Err(EvalError::Syntax {
                position: 0,
                message: "empty identifier".to_string(),
            });
        };

        if let Some(local) = self.inspector.frame_variable(self.thread, self.frame, head)? {
            return self.members(local, rest).map(Resolved::Value);
        }

        if let Some(this) = self.inspector.this_value(self.thread, self.frame)? {
            if let Some(member) = self.inspector.member(Owner::Instance(&this), head)? {
                let value = self.read_member(member, Some(&this))?;
                return self.members(value, rest).map(Resolved::Value);
            }
        }

        for split in (1..=chain.len()).rev() {
            let type_name = chain[..split].join(".");
            let Some(class) = self.inspector.find_class(None, &type_name)? else {
                continue;
            };
            let Some((member_name, rest)) = chain[split..].split_first() else {
                if allow_class {
                    return Ok(Resolved::Class(class));
                }
                return Err(EvalError::TypeMismatch(format!(
                    "'{type_name}' is a type, which is not valid in this context"
                )));
            };
            let member = self
                .inspector
                .member(Owner::Class(class), member_name)?
                .ok_or_else(|| EvalError::UnresolvedIdentifier(format!("{type_name}.{member_name}")))?;
            let value = self.read_member(member, None)?;
            return self.members(value, rest).map(Resolved::Value);
        }

        if head == EXCEPTION_VARIABLE {
            if let Some(exception) = self.inspector.current_exception(self.thread)? {
                return self.members(exception, rest).map(Resolved::Value);
            }
        }

        Err(EvalError::UnresolvedIdentifier(head.clone()))
    }

    /// Apply member accesses `names` to `value`.
    fn members(&mut self, mut value: Value, names: &[String]) -> EvalResult<Value>
    {
        for name in names {
            value = self.member_of(value, name)?;
        }
        Ok(value)
    }

    fn member_of(&mut self, value: Value, name: &str) -> EvalResult<Value>
    {
        if value.is_null() {
            return Err(EvalError::NullReference(name.to_string()));
        }
        match self.inspector.member(Owner::Instance(&value), name)? {
            Some(member) => self.read_member(member, Some(&value)),
            None if matches!(value.data, ValueData::Primitive(_)) => Err(EvalError::TypeMismatch(format!(
                "'{}' does not contain a definition for '{name}'",
                value.type_name
            ))),
            None => Err(EvalError::UnresolvedIdentifier(name.to_string())),
        }
    }

    fn read_member(&mut self, member: Member, this: Option<&Value>) -> EvalResult<Value>
    {
        match member {
            Member::Value(value) => Ok(value),
            Member::Getter(getter) => self.call(getter, this, &[]),
        }
    }

    /// Run `method` in the debuggee and wait for its result.
    fn call(&mut self, method: MethodHandle, this: Option<&Value>, args: &[Value]) -> EvalResult<Value>
    {
        self.waiter.begin(self.thread)?;

        let issued = self
            .inspector
            .begin_call(self.thread, method, this, args)
            .and_then(|()| self.process.continue_execution());
        if let Err(err) = issued {
            self.waiter.cancel(self.thread);
            return Err(err.into());
        }

        match self.waiter.wait(self.thread, self.timeout) {
            Err(EvalError::Timeout(elapsed)) => {
                warn!("Evaluation on thread {} timed out, aborting", self.thread);
                if let Err(err) = self.inspector.abort_eval(self.thread) {
                    warn!("Failed to abort evaluation: {err}");
                }
                self.waiter.cancel(self.thread);
                Err(EvalError::Timeout(elapsed))
            }
            outcome => outcome,
        }
    }
}
