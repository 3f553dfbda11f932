//! Stack frame types.

use std::fmt;

use super::symbols::{FunctionRef, IlOffset, SourceLocation};

/// Classification the stack walker assigns to each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind
{
    /// Managed frame with a function and an IL position.
    ManagedIl,
    /// Unmanaged code (runtime internals, P/Invoke targets).
    Native,
    /// Runtime helper frame the runtime can only unwind through.
    RuntimeUnwindable,
    /// Managed-looking frame without a function (IL stubs, lightweight codegen).
    Stub,
    /// Frame without an IL interpretation.
    Unresolvable,
}

impl FrameKind
{
    /// Placeholder function name shown for frames without a method.
    pub const fn placeholder(self) -> Option<&'static str>
    {
        match self {
            FrameKind::ManagedIl => None,
            FrameKind::Native => Some("[NativeStackFrame]"),
            FrameKind::Unresolvable => Some("?"),
            FrameKind::RuntimeUnwindable => Some("[RuntimeUnwindableFrame]"),
            FrameKind::Stub => Some("[IL Stub or LCG]"),
        }
    }
}

impl fmt::Display for FrameKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            FrameKind::ManagedIl => "managed",
            FrameKind::Native => "native",
            FrameKind::RuntimeUnwindable => "runtime-unwindable",
            FrameKind::Stub => "stub",
            FrameKind::Unresolvable => "unresolvable",
        };
        write!(f, "{label}")
    }
}

/// One frame of a stopped thread's stack.
///
/// Frames are rebuilt on every request and must not be kept across a resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame
{
    /// 0 = innermost.
    pub index: usize,
    pub kind: FrameKind,
    /// Function and IL position, for managed frames.
    pub function: Option<FunctionRef>,
    pub il_offset: Option<IlOffset>,
    /// Source location from the nearest preceding sequence point.
    pub location: Option<SourceLocation>,
    /// Formatted method name from the symbol provider.
    pub method: Option<String>,
}

impl StackFrame
{
    /// Frame that carries nothing beyond its classification.
    pub fn bare(index: usize, kind: FrameKind) -> Self
    {
        Self {
            index,
            kind,
            function: None,
            il_offset: None,
            location: None,
            method: None,
        }
    }

    /// Name to show in the `func` field.
    pub fn display_name(&self) -> &str
    {
        match (&self.method, self.kind.placeholder()) {
            (Some(method), _) => method,
            (None, Some(placeholder)) => placeholder,
            (None, None) => "?",
        }
    }
}
