//! Source breakpoint bookkeeping.
//!
//! This module tracks every breakpoint the front-end asked for, keyed by id and
//! by source location, together with its binding state. Binding a breakpoint
//! means finding a sequence point for its `file:line` in a loaded module and
//! asking the runtime to install a native breakpoint there. A breakpoint whose
//! code is not loaded yet stays [`BreakpointState::Pending`] and is retried on
//! every module load.
//!
//! The table is not thread-safe; the session keeps it behind a `Mutex` and
//! always takes that lock before the symbol store's.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::runtime::{NativeBreakpoint, RuntimeProcess};
use crate::symbols::SymbolStore;
use crate::types::{FunctionRef, IlOffset, ModuleId, SourceLocation};

/// Unique identifier for a breakpoint, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(u32);

impl BreakpointId
{
    /// Create a new identifier from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self
    {
        Self(value)
    }

    /// Get the raw numeric representation (the MI `number` field).
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

/// Where a bound breakpoint lives in the debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding
{
    pub function: FunctionRef,
    pub il_offset: IlOffset,
    pub native: NativeBreakpoint,
}

/// Lifecycle states for a breakpoint entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointState
{
    /// No loaded module has code for the location yet.
    Pending,
    /// Installed in the runtime.
    Bound(Binding),
}

/// Public information about a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint
{
    pub id: BreakpointId,
    /// Location as requested by the front-end.
    pub location: SourceLocation,
    /// Full path of the matched source file once bound.
    pub resolved_file: Option<String>,
    pub state: BreakpointState,
    pub enabled: bool,
    pub hit_count: u64,
}

impl Breakpoint
{
    #[must_use]
    pub fn is_bound(&self) -> bool
    {
        matches!(self.state, BreakpointState::Bound(_))
    }

    /// Full path to report: the matched file when bound, the request otherwise.
    #[must_use]
    pub fn fullname(&self) -> &str
    {
        self.resolved_file.as_deref().unwrap_or(&self.location.file)
    }
}

/// Breakpoints of one session.
#[derive(Debug, Default)]
pub struct BreakpointTable
{
    next_id: u32,
    by_id: BTreeMap<BreakpointId, Breakpoint>,
    by_location: HashMap<SourceLocation, BreakpointId>,
}

impl BreakpointTable
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    fn allocate_id(&mut self) -> BreakpointId
    {
        self.next_id = self.next_id.wrapping_add(1);
        BreakpointId::from_raw(self.next_id)
    }

    /// Add a breakpoint at `location` and try to bind it right away.
    ///
    /// A second request for the same location returns the existing breakpoint.
    pub fn insert(
        &mut self,
        location: SourceLocation,
        symbols: &SymbolStore,
        process: &dyn RuntimeProcess,
    ) -> Breakpoint
    {
        if let Some(existing) = self.by_location.get(&location).and_then(|id| self.by_id.get(id)) {
            debug!("Breakpoint at {location} already exists as {}", existing.id.raw());
            return existing.clone();
        }

        let id = self.allocate_id();
        let mut breakpoint = Breakpoint {
            id,
            location: location.clone(),
            resolved_file: None,
            state: BreakpointState::Pending,
            enabled: true,
            hit_count: 0,
        };

        if let Some(target) = symbols.resolve_location(&location.file, location.line) {
            bind(&mut breakpoint, target, symbols, process);
        }
        if !breakpoint.is_bound() {
            info!("Breakpoint {} at {location} is pending", id.raw());
        }

        self.by_location.insert(location, id);
        self.by_id.insert(id, breakpoint.clone());
        breakpoint
    }

    /// Bind pending breakpoints against a newly loaded module.
    ///
    /// Returns the breakpoints that became bound.
    pub fn try_resolve_for_module(
        &mut self,
        module: ModuleId,
        symbols: &SymbolStore,
        process: &dyn RuntimeProcess,
    ) -> Vec<Breakpoint>
    {
        let mut resolved = Vec::new();
        for breakpoint in self.by_id.values_mut().filter(|bp| !bp.is_bound()) {
            let Some(target) = symbols.resolve_in_module(module, &breakpoint.location.file, breakpoint.location.line)
            else {
                continue;
            };
            if bind(breakpoint, target, symbols, process) {
                resolved.push(breakpoint.clone());
            }
        }
        resolved
    }

    /// Return breakpoints bound in an unloaded module to `Pending`.
    pub fn module_unloaded(&mut self, module: ModuleId) -> Vec<Breakpoint>
    {
        let mut demoted = Vec::new();
        for breakpoint in self.by_id.values_mut() {
            if let BreakpointState::Bound(binding) = breakpoint.state {
                if binding.function.module == module {
                    breakpoint.state = BreakpointState::Pending;
                    breakpoint.resolved_file = None;
                    demoted.push(breakpoint.clone());
                }
            }
        }
        demoted
    }

    /// Remove a breakpoint, deactivating its native binding when a process
    /// is still attached.
    ///
    /// Unknown ids are ignored. Returns whether an entry was removed.
    pub fn delete(&mut self, id: BreakpointId, process: Option<&dyn RuntimeProcess>) -> bool
    {
        let Some(breakpoint) = self.by_id.remove(&id) else {
            debug!("Ignoring delete of unknown breakpoint {}", id.raw());
            return false;
        };
        self.by_location.remove(&breakpoint.location);
        if let Some(process) = process {
            deactivate(&breakpoint, process);
        }
        true
    }

    /// Count a hit on the breakpoint installed as `native`.
    pub fn record_hit(&mut self, native: NativeBreakpoint) -> Option<BreakpointId>
    {
        let breakpoint = self
            .by_id
            .values_mut()
            .find(|bp| matches!(bp.state, BreakpointState::Bound(binding) if binding.native == native))?;
        breakpoint.hit_count += 1;
        Some(breakpoint.id)
    }

    /// Deactivate every bound breakpoint and forget all entries.
    ///
    /// Ids are not reset.
    pub fn clear(&mut self, process: &dyn RuntimeProcess) -> usize
    {
        let count = self.by_id.len();
        for breakpoint in self.by_id.values() {
            deactivate(breakpoint, process);
        }
        self.by_id.clear();
        self.by_location.clear();
        count
    }

    pub fn get(&self, id: BreakpointId) -> Option<&Breakpoint>
    {
        self.by_id.get(&id)
    }

    /// All breakpoints, ordered by id.
    pub fn list(&self) -> Vec<Breakpoint>
    {
        self.by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize
    {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.by_id.is_empty()
    }
}

/// Install `breakpoint` at `target`. On runtime failure it stays pending.
fn bind(
    breakpoint: &mut Breakpoint,
    (function, il_offset): (FunctionRef, IlOffset),
    symbols: &SymbolStore,
    process: &dyn RuntimeProcess,
) -> bool
{
    match process.create_breakpoint(function, il_offset) {
        Ok(native) => {
            breakpoint.state = BreakpointState::Bound(Binding {
                function,
                il_offset,
                native,
            });
            breakpoint.resolved_file = symbols
                .location_of(function, il_offset)
                .map(|location| location.file);
            info!(
                "Breakpoint {} bound at {} +{}",
                breakpoint.id.raw(),
                function.token,
                il_offset.0
            );
            true
        }
        Err(err) => {
            warn!("Failed to bind breakpoint {}: {err}", breakpoint.id.raw());
            false
        }
    }
}

fn deactivate(breakpoint: &Breakpoint, process: &dyn RuntimeProcess)
{
    if let BreakpointState::Bound(binding) = breakpoint.state {
        if let Err(err) = process.set_breakpoint_active(binding.native, false) {
            warn!("Failed to deactivate breakpoint {}: {err}", breakpoint.id.raw());
        }
    }
}
