//! # Symbol Store
//!
//! Per-module sequence-point tables and the lookups built on them.
//!
//! Reading symbol files is the job of a [`SymbolProvider`]; this module only
//! keeps what the provider returned for every loaded module and answers the
//! three questions the engine asks:
//!
//! - where does a breakpoint at `file:line` bind? ([`SymbolStore::resolve_location`])
//! - what source line is this IL offset on? ([`SymbolStore::location_of`])
//! - which IL range does a step over the current line cover? ([`SymbolStore::step_range`])
//!
//! ## Thread Safety
//!
//! The store is not thread-safe; the session keeps it behind an `RwLock`.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{
    file_name_of, FunctionRef, IlOffset, IlRange, MethodToken, ModuleId, ModuleInfo, SequencePoint, SourceLocation,
};

/// Symbols of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSymbols
{
    pub token: MethodToken,
    /// Size of the IL body in bytes.
    pub il_size: u32,
    /// Formatted method name, e.g. `App.Program.Main()`.
    pub name: Option<String>,
    /// Sequence points, sorted by IL offset.
    pub sequence_points: Vec<SequencePoint>,
}

impl MethodSymbols
{
    pub fn new(token: MethodToken, il_size: u32, name: Option<String>, mut sequence_points: Vec<SequencePoint>) -> Self
    {
        sequence_points.sort_by_key(|sp| sp.il_offset);
        Self {
            token,
            il_size,
            name,
            sequence_points,
        }
    }

    /// Index of the nearest sequence point at or below `offset`.
    fn point_index_at(&self, offset: IlOffset) -> Option<usize>
    {
        self.sequence_points
            .partition_point(|sp| sp.il_offset <= offset)
            .checked_sub(1)
    }
}

/// Symbols of one module, as produced by a [`SymbolProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSymbols
{
    methods: BTreeMap<MethodToken, MethodSymbols>,
}

impl ModuleSymbols
{
    pub fn new(methods: impl IntoIterator<Item = MethodSymbols>) -> Self
    {
        Self {
            methods: methods.into_iter().map(|method| (method.token, method)).collect(),
        }
    }

    pub fn method(&self, token: MethodToken) -> Option<&MethodSymbols>
    {
        self.methods.get(&token)
    }

    /// Methods in token order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodSymbols>
    {
        self.methods.values()
    }

    /// First sequence point covering `line` in a file accepted by `file_matches`.
    fn find_line(&self, line: u32, file_matches: impl Fn(&str) -> bool) -> Option<(MethodToken, IlOffset)>
    {
        self.methods().find_map(|method| {
            method
                .sequence_points
                .iter()
                .find(|sp| sp.covers_line(line) && file_matches(&sp.file))
                .map(|sp| (method.token, sp.il_offset))
        })
    }

    /// Sequence point for a source location.
    ///
    /// An exact full-path match wins over a match on the file name alone.
    pub fn find_sequence_point(&self, file: &str, line: u32) -> Option<(MethodToken, IlOffset)>
    {
        self.find_line(line, |candidate| candidate == file).or_else(|| {
            let wanted = file_name_of(file);
            self.find_line(line, |candidate| file_name_of(candidate) == wanted)
        })
    }
}

/// Source of per-module symbols (portable PDB reader or similar).
pub trait SymbolProvider: Send + Sync
{
    /// Load the symbols for a module. `Ok(None)` means the module has none.
    fn load_symbols(&self, module: &ModuleInfo) -> Result<Option<ModuleSymbols>>;
}

/// Provider for sessions without symbol support: every module is symbol-less.
#[derive(Debug, Default)]
pub struct NoSymbols;

impl SymbolProvider for NoSymbols
{
    fn load_symbols(&self, _module: &ModuleInfo) -> Result<Option<ModuleSymbols>>
    {
        Ok(None)
    }
}

struct LoadedModule
{
    info: ModuleInfo,
    symbols: Option<ModuleSymbols>,
}

/// Loaded modules and their symbols.
pub struct SymbolStore
{
    provider: Box<dyn SymbolProvider>,
    modules: BTreeMap<ModuleId, LoadedModule>,
    load_order: Vec<ModuleId>,
}

impl SymbolStore
{
    pub fn new(provider: Box<dyn SymbolProvider>) -> Self
    {
        Self {
            provider,
            modules: BTreeMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Record a loaded module and try to load its symbols.
    ///
    /// Returns whether symbols were loaded. A provider failure is logged and
    /// treated as a module without symbols.
    pub fn load_module(&mut self, info: &ModuleInfo) -> bool
    {
        let symbols = if info.is_dynamic {
            None
        } else {
            match self.provider.load_symbols(info) {
                Ok(symbols) => symbols,
                Err(err) => {
                    warn!("Failed to load symbols for {}: {err}", info.name);
                    None
                }
            }
        };
        let loaded = symbols.is_some();
        debug!("Module {} loaded (symbols: {loaded})", info.name);

        if self
            .modules
            .insert(info.id, LoadedModule {
                info: info.clone(),
                symbols,
            })
            .is_none()
        {
            self.load_order.push(info.id);
        }
        loaded
    }

    pub fn unload_module(&mut self, id: ModuleId) -> Option<ModuleInfo>
    {
        self.load_order.retain(|loaded| *loaded != id);
        self.modules.remove(&id).map(|module| module.info)
    }

    pub fn module(&self, id: ModuleId) -> Option<&ModuleInfo>
    {
        self.modules.get(&id).map(|module| &module.info)
    }

    pub fn symbols(&self, id: ModuleId) -> Option<&ModuleSymbols>
    {
        self.modules.get(&id).and_then(|module| module.symbols.as_ref())
    }

    fn method(&self, function: FunctionRef) -> Option<&MethodSymbols>
    {
        self.symbols(function.module)?.method(function.token)
    }

    /// Bind target for `file:line` within one module.
    pub fn resolve_in_module(&self, module: ModuleId, file: &str, line: u32) -> Option<(FunctionRef, IlOffset)>
    {
        let (token, offset) = self.symbols(module)?.find_sequence_point(file, line)?;
        Some((FunctionRef { module, token }, offset))
    }

    /// Bind target for `file:line`, searching modules in load order.
    pub fn resolve_location(&self, file: &str, line: u32) -> Option<(FunctionRef, IlOffset)>
    {
        self.load_order
            .iter()
            .find_map(|module| self.resolve_in_module(*module, file, line))
    }

    /// Source location of an IL offset: the nearest visible sequence point at or below it.
    pub fn location_of(&self, function: FunctionRef, offset: IlOffset) -> Option<SourceLocation>
    {
        let method = self.method(function)?;
        let upto = method.point_index_at(offset)?;
        method.sequence_points[..=upto]
            .iter()
            .rev()
            .find(|sp| !sp.is_hidden())
            .map(|sp| SourceLocation::new(sp.file.clone(), sp.start_line))
    }

    /// IL range of the sequence point enclosing `offset`.
    ///
    /// The range ends at the next sequence point of the method, or at the end
    /// of the IL body for the last one.
    pub fn step_range(&self, function: FunctionRef, offset: IlOffset) -> Option<IlRange>
    {
        let method = self.method(function)?;
        let index = method.point_index_at(offset)?;
        let start = method.sequence_points[index].il_offset;
        let end = method
            .sequence_points
            .get(index + 1)
            .map_or(IlOffset(method.il_size), |next| next.il_offset);
        Some(IlRange { start, end })
    }

    pub fn method_name(&self, function: FunctionRef) -> Option<String>
    {
        self.method(function)?.name.clone()
    }
}
