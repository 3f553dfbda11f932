//! Module, method, and source location types.

use std::fmt;

/// Line number the compiler emits for sequence points that hide code from the user.
pub const HIDDEN_LINE: u32 = 0x00fe_efee;

/// Identifier the runtime assigns to a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u64);

/// Metadata token of a method definition (`0x06xxxxxx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodToken(pub u32);

impl fmt::Display for MethodToken
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Byte offset of an instruction within a method's IL body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IlOffset(pub u32);

/// Half-open IL range `[start, end)` handed to ranged steppers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IlRange
{
    pub start: IlOffset,
    pub end: IlOffset,
}

impl IlRange
{
    pub fn contains(&self, offset: IlOffset) -> bool
    {
        self.start <= offset && offset < self.end
    }
}

/// Module as announced by the runtime's load-module callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo
{
    pub id: ModuleId,
    /// File name, e.g. `System.Private.CoreLib.dll`.
    pub name: String,
    /// Full path on disk; empty for in-memory modules.
    pub path: String,
    /// Emitted at run time (no backing file, no symbols).
    pub is_dynamic: bool,
}

/// A method inside a module: the pair every IL position is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef
{
    pub module: ModuleId,
    pub token: MethodToken,
}

/// Mapping from an IL offset to a span of source lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePoint
{
    pub il_offset: IlOffset,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl SequencePoint
{
    /// Whether the compiler marked this point as hidden from the user.
    pub fn is_hidden(&self) -> bool
    {
        self.start_line == HIDDEN_LINE
    }

    pub fn covers_line(&self, line: u32) -> bool
    {
        !self.is_hidden() && self.start_line <= line && line <= self.end_line
    }
}

/// Source code location of a frame or breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation
{
    /// Full path as recorded in the symbol file.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl SourceLocation
{
    pub fn new(file: impl Into<String>, line: u32) -> Self
    {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Last path component, accepting both `/` and `\` separators.
    pub fn file_name(&self) -> &str
    {
        file_name_of(&self.file)
    }
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Last path component of `path`, accepting both `/` and `\` separators.
pub fn file_name_of(path: &str) -> &str
{
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
