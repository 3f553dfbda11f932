//! Process and thread types.

use std::fmt;

/// Process identifier (PID) of the debuggee
///
/// ## Example
///
/// ```rust
/// use manadbg_core::types::ProcessId;
///
/// let pid = ProcessId::from(4242);
/// assert_eq!(u32::from(pid), 4242);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Operating-system identifier of a managed thread
///
/// The debugging runtime hands out thread objects; the session only keeps
/// this id and asks the runtime to resolve it again on every use. A thread
/// that has exited simply stops resolving, so holding the id never keeps a
/// dead thread alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u32);

impl ThreadId
{
    /// Get the raw OS thread id
    ///
    /// ```rust
    /// use manadbg_core::types::ThreadId;
    ///
    /// let thread = ThreadId::from(12345);
    /// assert_eq!(thread.raw(), 12345);
    /// ```
    pub fn raw(&self) -> u32
    {
        self.0
    }
}

impl From<u32> for ThreadId
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Scheduling state the runtime reports for a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState
{
    /// Thread will run when the process is continued.
    Running,
    /// Thread is held suspended by the debugger.
    Stopped,
}

impl fmt::Display for ThreadState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            ThreadState::Running => write!(f, "running"),
            ThreadState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of one debuggee thread, as listed by `thread-info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo
{
    pub id: ThreadId,
    /// Managed thread name, if the debuggee assigned one.
    pub name: Option<String>,
    pub state: ThreadState,
}
