//! In-memory runtime used by the integration tests.
//!
//! `FakeProcess` implements the runtime traits over plain maps. Tests script
//! it (threads, stacks, values, memory), publish runtime events with
//! [`FakeProcess::emit`], and observe the engine through a
//! [`RecordingSink`] and the call logs kept here.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use manadbg_core::error::{DebuggerError, Result};
use manadbg_core::events::{EventSender, Notification, NotificationSink, RuntimeEvent};
use manadbg_core::runtime::{
    ClassHandle, InterceptMask, Member, MethodHandle, NativeBreakpoint, Owner, RuntimeFactory, RuntimeProcess,
    StackWalk, Stepper, ValueInspector, WalkStep,
};
use manadbg_core::session::{Session, SessionConfig};
use manadbg_core::symbols::{MethodSymbols, ModuleSymbols, SymbolProvider};
use manadbg_core::types::{
    Address, DecimalParts, FunctionRef, IlOffset, IlRange, MethodToken, ModuleId, ModuleInfo, Primitive, ProcessId,
    SequencePoint, ThreadId, ThreadInfo, ThreadState, Value, ValueData, ValueHandle,
};

pub const PID: ProcessId = ProcessId(4242);
pub const MAIN_THREAD: ThreadId = ThreadId(101);
pub const APP_MODULE: ModuleId = ModuleId(1);
pub const MAIN: FunctionRef = FunctionRef {
    module: APP_MODULE,
    token: MethodToken(0x0600_0001),
};

const WAIT: Duration = Duration::from_secs(5);

/// Block until `check` returns `Some`, or panic after a few seconds.
pub fn wait_until<T>(what: &str, mut check: impl FnMut() -> Option<T>) -> T
{
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(value) = check() {
            return value;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink
{
    records: Mutex<Vec<Notification>>,
    changed: Condvar,
}

impl NotificationSink for RecordingSink
{
    fn notify(&self, notification: Notification)
    {
        self.records.lock().unwrap().push(notification);
        self.changed.notify_all();
    }
}

impl RecordingSink
{
    pub fn all(&self) -> Vec<Notification>
    {
        self.records.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Notification) -> bool) -> usize
    {
        self.records.lock().unwrap().iter().filter(|n| predicate(n)).count()
    }

    /// Wait for the first notification matching `predicate`.
    pub fn wait_for(&self, predicate: impl Fn(&Notification) -> bool) -> Notification
    {
        let records = self.records.lock().unwrap();
        let (records, timeout) = self
            .changed
            .wait_timeout_while(records, WAIT, |records| !records.iter().any(&predicate))
            .unwrap();
        assert!(!timeout.timed_out(), "timed out waiting for a notification, got {records:?}");
        records.iter().find(|n| predicate(n)).cloned().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// Symbol provider keyed by module name.
#[derive(Default)]
pub struct FakeSymbols
{
    modules: HashMap<String, ModuleSymbols>,
}

impl FakeSymbols
{
    pub fn with(mut self, module: &str, symbols: ModuleSymbols) -> Self
    {
        self.modules.insert(module.to_string(), symbols);
        self
    }
}

impl SymbolProvider for FakeSymbols
{
    fn load_symbols(&self, module: &ModuleInfo) -> Result<Option<ModuleSymbols>>
    {
        Ok(self.modules.get(&module.name).cloned())
    }
}

pub fn sequence_point(offset: u32, file: &str, line: u32) -> SequencePoint
{
    SequencePoint {
        il_offset: IlOffset(offset),
        file: file.to_string(),
        start_line: line,
        end_line: line,
    }
}

/// `App.Program.Main()` in `/src/App/Program.cs`, lines 9-12 at IL 0, 8, 20, 31; 40 bytes of IL.
pub fn program_symbols() -> ModuleSymbols
{
    ModuleSymbols::new([MethodSymbols::new(
        MAIN.token,
        40,
        Some("App.Program.Main()".to_string()),
        vec![
            sequence_point(0, "/src/App/Program.cs", 9),
            sequence_point(8, "/src/App/Program.cs", 10),
            sequence_point(20, "/src/App/Program.cs", 11),
            sequence_point(31, "/src/App/Program.cs", 12),
        ],
    )])
}

pub fn module(id: u64, name: &str) -> ModuleInfo
{
    ModuleInfo {
        id: ModuleId(id),
        name: name.to_string(),
        path: format!("/src/App/bin/{name}"),
        is_dynamic: false,
    }
}

// ---------------------------------------------------------------------------
// Steppers and stacks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum StepCall
{
    Mask(InterceptMask),
    Out,
    Range
    {
        step_in: bool, ranges: Vec<IlRange>
    },
    Single
    {
        step_in: bool
    },
    Deactivate,
}

struct FakeStepper
{
    thread: ThreadId,
    log: Arc<Mutex<Vec<(ThreadId, StepCall)>>>,
}

impl FakeStepper
{
    fn record(&self, call: StepCall) -> Result<()>
    {
        self.log.lock().unwrap().push((self.thread, call));
        Ok(())
    }
}

impl Stepper for FakeStepper
{
    fn set_intercept_mask(&mut self, mask: InterceptMask) -> Result<()>
    {
        self.record(StepCall::Mask(mask))
    }

    fn step_out(&mut self) -> Result<()>
    {
        self.record(StepCall::Out)
    }

    fn step_range(&mut self, step_in: bool, ranges: &[IlRange]) -> Result<()>
    {
        self.record(StepCall::Range {
            step_in,
            ranges: ranges.to_vec(),
        })
    }

    fn step(&mut self, step_in: bool) -> Result<()>
    {
        self.record(StepCall::Single { step_in })
    }

    fn deactivate(&mut self) -> Result<()>
    {
        self.record(StepCall::Deactivate)
    }
}

struct FakeWalk
{
    steps: VecDeque<WalkStep>,
}

impl StackWalk for FakeWalk
{
    fn next_frame(&mut self) -> Result<WalkStep>
    {
        Ok(self.steps.pop_front().unwrap_or(WalkStep::EndOfStack))
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// What an evaluated method does when the process is continued.
#[derive(Debug, Clone)]
pub enum CallBehavior
{
    Return(Value),
    Throw(Value),
    /// Never completes.
    Hang,
}

#[derive(Default)]
struct InspectorData
{
    next_handle: u64,
    locals: HashMap<(ThreadId, usize), Vec<(String, Value)>>,
    this: HashMap<(ThreadId, usize), Value>,
    exceptions: HashMap<ThreadId, Value>,
    members: HashMap<(ValueHandle, String), Member>,
    static_members: HashMap<(ClassHandle, String), Member>,
    classes: HashMap<String, (Option<ModuleId>, ClassHandle)>,
    methods: HashMap<(u64, String), MethodHandle>,
    calls: HashMap<MethodHandle, CallBehavior>,
    elements: HashMap<(ValueHandle, Vec<u32>), Value>,
    pending_call: Option<(ThreadId, MethodHandle)>,
    member_lookups: Vec<String>,
    element_reads: Vec<(ValueHandle, Vec<u32>)>,
    issued_calls: Vec<(MethodHandle, Option<ValueHandle>, usize)>,
    aborted: Vec<ThreadId>,
}

#[derive(Default)]
pub struct FakeInspector
{
    data: Mutex<InspectorData>,
}

fn owner_key(owner: Owner<'_>) -> u64
{
    match owner {
        Owner::Instance(value) => value.handle.0,
        Owner::Class(class) => class.0 | (1 << 63),
    }
}

impl FakeInspector
{
    /// Allocate a value with a fresh handle.
    pub fn value(&self, type_name: &str, data: ValueData) -> Value
    {
        let mut data_guard = self.data.lock().unwrap();
        data_guard.next_handle += 1;
        Value::new(ValueHandle(1000 + data_guard.next_handle), type_name, data)
    }

    pub fn object(&self, type_name: &str) -> Value
    {
        self.value(type_name, ValueData::Object)
    }

    pub fn int(&self, value: i64) -> Value
    {
        self.value("System.Int32", ValueData::Primitive(Primitive::Int(value)))
    }

    pub fn add_local(&self, thread: ThreadId, frame: usize, name: &str, value: Value)
    {
        self.data
            .lock()
            .unwrap()
            .locals
            .entry((thread, frame))
            .or_default()
            .push((name.to_string(), value));
    }

    pub fn set_this(&self, thread: ThreadId, frame: usize, value: Value)
    {
        self.data.lock().unwrap().this.insert((thread, frame), value);
    }

    pub fn set_exception(&self, thread: ThreadId, value: Value)
    {
        self.data.lock().unwrap().exceptions.insert(thread, value);
    }

    pub fn add_field(&self, owner: &Value, name: &str, value: Value)
    {
        self.data
            .lock()
            .unwrap()
            .members
            .insert((owner.handle, name.to_string()), Member::Value(value));
    }

    /// Property whose getter runs `behavior`.
    pub fn add_property(&self, owner: &Value, name: &str, getter: MethodHandle, behavior: CallBehavior)
    {
        let mut data = self.data.lock().unwrap();
        data.members
            .insert((owner.handle, name.to_string()), Member::Getter(getter));
        data.calls.insert(getter, behavior);
    }

    pub fn add_class(&self, module: Option<ModuleId>, name: &str, class: ClassHandle)
    {
        self.data
            .lock()
            .unwrap()
            .classes
            .insert(name.to_string(), (module, class));
    }

    pub fn add_static_field(&self, class: ClassHandle, name: &str, value: Value)
    {
        self.data
            .lock()
            .unwrap()
            .static_members
            .insert((class, name.to_string()), Member::Value(value));
    }

    pub fn add_method(&self, owner: Owner<'_>, name: &str, method: MethodHandle, behavior: CallBehavior)
    {
        let mut data = self.data.lock().unwrap();
        data.methods.insert((owner_key(owner), name.to_string()), method);
        data.calls.insert(method, behavior);
    }

    pub fn add_element(&self, array: &Value, indices: &[u32], value: Value)
    {
        self.data
            .lock()
            .unwrap()
            .elements
            .insert((array.handle, indices.to_vec()), value);
    }

    /// Every member name looked up so far.
    pub fn member_lookups(&self) -> Vec<String>
    {
        self.data.lock().unwrap().member_lookups.clone()
    }

    pub fn element_reads(&self) -> Vec<(ValueHandle, Vec<u32>)>
    {
        self.data.lock().unwrap().element_reads.clone()
    }

    pub fn issued_calls(&self) -> Vec<(MethodHandle, Option<ValueHandle>, usize)>
    {
        self.data.lock().unwrap().issued_calls.clone()
    }

    pub fn aborted(&self) -> Vec<ThreadId>
    {
        self.data.lock().unwrap().aborted.clone()
    }

    /// Result event for the pending call, if it completes.
    fn take_completion(&self) -> Option<RuntimeEvent>
    {
        let mut data = self.data.lock().unwrap();
        let (thread, method) = data.pending_call?;
        let event = match data.calls.get(&method).cloned()? {
            CallBehavior::Return(result) => RuntimeEvent::EvalComplete { thread, result },
            CallBehavior::Throw(exception) => RuntimeEvent::EvalException { thread, exception },
            CallBehavior::Hang => return None,
        };
        data.pending_call = None;
        Some(event)
    }
}

impl ValueInspector for FakeInspector
{
    fn frame_variables(&self, thread: ThreadId, frame: usize) -> Result<Vec<(String, Value)>>
    {
        Ok(self
            .data
            .lock()
            .unwrap()
            .locals
            .get(&(thread, frame))
            .cloned()
            .unwrap_or_default())
    }

    fn this_value(&self, thread: ThreadId, frame: usize) -> Result<Option<Value>>
    {
        Ok(self.data.lock().unwrap().this.get(&(thread, frame)).cloned())
    }

    fn current_exception(&self, thread: ThreadId) -> Result<Option<Value>>
    {
        Ok(self.data.lock().unwrap().exceptions.get(&thread).cloned())
    }

    fn member(&self, owner: Owner<'_>, name: &str) -> Result<Option<Member>>
    {
        let mut data = self.data.lock().unwrap();
        data.member_lookups.push(name.to_string());
        Ok(match owner {
            Owner::Instance(value) => data.members.get(&(value.handle, name.to_string())).cloned(),
            Owner::Class(class) => data.static_members.get(&(class, name.to_string())).cloned(),
        })
    }

    fn method(&self, owner: Owner<'_>, name: &str) -> Result<Option<MethodHandle>>
    {
        Ok(self
            .data
            .lock()
            .unwrap()
            .methods
            .get(&(owner_key(owner), name.to_string()))
            .copied())
    }

    fn find_class(&self, module: Option<ModuleId>, name: &str) -> Result<Option<ClassHandle>>
    {
        let data = self.data.lock().unwrap();
        Ok(data.classes.get(name).and_then(|(owner, class)| match (module, owner) {
            (Some(wanted), Some(found)) if wanted != *found => None,
            _ => Some(*class),
        }))
    }

    fn element(&self, array: &Value, indices: &[u32]) -> Result<Option<Value>>
    {
        let mut data = self.data.lock().unwrap();
        data.element_reads.push((array.handle, indices.to_vec()));
        Ok(data.elements.get(&(array.handle, indices.to_vec())).cloned())
    }

    fn create_primitive(&self, _thread: ThreadId, value: Primitive) -> Result<Value>
    {
        let type_name = match value {
            Primitive::Bool(_) => "System.Boolean",
            Primitive::Char(_) => "System.Char",
            Primitive::Int(_) => "System.Int32",
            Primitive::UInt(_) => "System.UInt64",
            Primitive::Float(_) => "System.Double",
            Primitive::Decimal(_) => "System.Decimal",
        };
        Ok(self.value(type_name, ValueData::Primitive(value)))
    }

    fn create_string(&self, _thread: ThreadId, text: &str) -> Result<Value>
    {
        Ok(self.value("System.String", ValueData::String(text.to_string())))
    }

    fn create_decimal(&self, _thread: ThreadId, _class: ClassHandle, parts: DecimalParts) -> Result<Value>
    {
        let magnitude = (i128::from(parts.hi) << 64) | (i128::from(parts.mid) << 32) | i128::from(parts.lo);
        let mantissa = if parts.flags & (1 << 31) == 0 { magnitude } else { -magnitude };
        let scale = ((parts.flags >> 16) & 0xff) as u8;
        let decimal = manadbg_core::types::Decimal::new(mantissa, scale)
            .ok_or_else(|| DebuggerError::InvalidArgument("decimal out of range".into()))?;
        Ok(self.value("System.Decimal", ValueData::Primitive(Primitive::Decimal(decimal))))
    }

    fn begin_call(&self, thread: ThreadId, method: MethodHandle, this: Option<&Value>, args: &[Value]) -> Result<()>
    {
        let mut data = self.data.lock().unwrap();
        if !data.calls.contains_key(&method) {
            return Err(DebuggerError::runtime("CallFunction", 0x8013_1c36));
        }
        data.issued_calls.push((method, this.map(|value| value.handle), args.len()));
        data.pending_call = Some((thread, method));
        Ok(())
    }

    fn abort_eval(&self, thread: ThreadId) -> Result<()>
    {
        let mut data = self.data.lock().unwrap();
        data.pending_call = None;
        data.aborted.push(thread);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ProcessData
{
    continues: usize,
    stops: usize,
    terminated: bool,
    detached: bool,
    threads: Vec<ThreadInfo>,
    memory: Vec<(Address, Vec<u8>)>,
    next_breakpoint: u64,
    breakpoints: HashMap<NativeBreakpoint, (FunctionRef, IlOffset, bool)>,
    stacks: HashMap<ThreadId, Vec<WalkStep>>,
    walks: usize,
    active_frames: HashMap<ThreadId, (FunctionRef, IlOffset)>,
    exit_on_terminate: Option<i32>,
}

pub struct FakeProcess
{
    data: Mutex<ProcessData>,
    changed: Condvar,
    events: Mutex<Option<EventSender>>,
    steps: Arc<Mutex<Vec<(ThreadId, StepCall)>>>,
    inspector: FakeInspector,
}

impl FakeProcess
{
    pub fn new() -> Arc<Self>
    {
        let process = Self {
            data: Mutex::new(ProcessData {
                threads: vec![ThreadInfo {
                    id: MAIN_THREAD,
                    name: Some("Main".to_string()),
                    state: ThreadState::Running,
                }],
                exit_on_terminate: Some(137),
                ..ProcessData::default()
            }),
            changed: Condvar::new(),
            events: Mutex::new(None),
            steps: Arc::new(Mutex::new(Vec::new())),
            inspector: FakeInspector::default(),
        };
        Arc::new(process)
    }

    pub fn fake_inspector(&self) -> &FakeInspector
    {
        &self.inspector
    }

    /// Publish a runtime callback, as the debugging interface would.
    pub fn emit(&self, event: RuntimeEvent)
    {
        let events = self.events.lock().unwrap();
        events
            .as_ref()
            .expect("process is not attached")
            .send(event)
            .expect("dispatcher is gone");
    }

    pub fn continues(&self) -> usize
    {
        self.data.lock().unwrap().continues
    }

    pub fn stops(&self) -> usize
    {
        self.data.lock().unwrap().stops
    }

    /// Wait until the process has been continued at least `count` times.
    pub fn wait_for_continues(&self, count: usize)
    {
        let data = self.data.lock().unwrap();
        let (data, timeout) = self
            .changed
            .wait_timeout_while(data, WAIT, |data| data.continues < count)
            .unwrap();
        assert!(
            !timeout.timed_out(),
            "timed out waiting for {count} continues, saw {}",
            data.continues
        );
    }

    pub fn is_terminated(&self) -> bool
    {
        self.data.lock().unwrap().terminated
    }

    pub fn is_detached(&self) -> bool
    {
        self.data.lock().unwrap().detached
    }

    pub fn set_exit_on_terminate(&self, exit_code: Option<i32>)
    {
        self.data.lock().unwrap().exit_on_terminate = exit_code;
    }

    pub fn add_memory(&self, address: Address, bytes: Vec<u8>)
    {
        self.data.lock().unwrap().memory.push((address, bytes));
    }

    pub fn set_stack(&self, thread: ThreadId, steps: Vec<WalkStep>)
    {
        self.data.lock().unwrap().stacks.insert(thread, steps);
    }

    pub fn walks(&self) -> usize
    {
        self.data.lock().unwrap().walks
    }

    pub fn set_active_frame(&self, thread: ThreadId, function: FunctionRef, offset: IlOffset)
    {
        self.data
            .lock()
            .unwrap()
            .active_frames
            .insert(thread, (function, offset));
    }

    /// Native breakpoints: function, offset, and whether each is active.
    pub fn native_breakpoints(&self) -> Vec<(NativeBreakpoint, FunctionRef, IlOffset, bool)>
    {
        let mut breakpoints: Vec<_> = self
            .data
            .lock()
            .unwrap()
            .breakpoints
            .iter()
            .map(|(native, (function, offset, active))| (*native, *function, *offset, *active))
            .collect();
        breakpoints.sort_by_key(|(native, ..)| native.0);
        breakpoints
    }

    pub fn step_log(&self) -> Vec<(ThreadId, StepCall)>
    {
        self.steps.lock().unwrap().clone()
    }
}

impl RuntimeProcess for FakeProcess
{
    fn pid(&self) -> ProcessId
    {
        PID
    }

    fn continue_execution(&self) -> Result<()>
    {
        {
            let mut data = self.data.lock().unwrap();
            data.continues += 1;
        }
        self.changed.notify_all();
        if let Some(event) = self.inspector.take_completion() {
            self.emit(event);
        }
        Ok(())
    }

    fn stop(&self) -> Result<()>
    {
        self.data.lock().unwrap().stops += 1;
        Ok(())
    }

    fn terminate(&self) -> Result<()>
    {
        let exit_code = {
            let mut data = self.data.lock().unwrap();
            data.terminated = true;
            data.exit_on_terminate
        };
        if let Some(exit_code) = exit_code {
            self.emit(RuntimeEvent::ExitProcess { exit_code });
        }
        Ok(())
    }

    fn detach(&self) -> Result<()>
    {
        self.data.lock().unwrap().detached = true;
        Ok(())
    }

    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<usize>
    {
        let data = self.data.lock().unwrap();
        let (start, bytes) = data
            .memory
            .iter()
            .find(|(start, bytes)| {
                address.value() >= start.value() && address.value() < start.value() + bytes.len() as u64
            })
            .ok_or_else(|| DebuggerError::runtime("ReadMemory", 0x8007_012b))?;
        let offset = (address.value() - start.value()) as usize;
        if offset + buf.len() > bytes.len() {
            return Err(DebuggerError::runtime("ReadMemory", 0x8007_012b));
        }
        buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
        Ok(buf.len())
    }

    fn threads(&self) -> Result<Vec<ThreadInfo>>
    {
        Ok(self.data.lock().unwrap().threads.clone())
    }

    fn create_breakpoint(&self, function: FunctionRef, offset: IlOffset) -> Result<NativeBreakpoint>
    {
        let mut data = self.data.lock().unwrap();
        data.next_breakpoint += 1;
        let native = NativeBreakpoint(data.next_breakpoint);
        data.breakpoints.insert(native, (function, offset, true));
        Ok(native)
    }

    fn set_breakpoint_active(&self, breakpoint: NativeBreakpoint, active: bool) -> Result<()>
    {
        let mut data = self.data.lock().unwrap();
        let entry = data
            .breakpoints
            .get_mut(&breakpoint)
            .ok_or_else(|| DebuggerError::runtime("Activate", 0x8007_0057))?;
        entry.2 = active;
        Ok(())
    }

    fn create_stepper(&self, thread: ThreadId) -> Result<Box<dyn Stepper>>
    {
        Ok(Box::new(FakeStepper {
            thread,
            log: Arc::clone(&self.steps),
        }))
    }

    fn stack_walk(&self, thread: ThreadId) -> Result<Box<dyn StackWalk + '_>>
    {
        let mut data = self.data.lock().unwrap();
        data.walks += 1;
        let steps = data.stacks.get(&thread).cloned().unwrap_or_default();
        Ok(Box::new(FakeWalk { steps: steps.into() }))
    }

    fn active_frame(&self, thread: ThreadId) -> Result<Option<(FunctionRef, IlOffset)>>
    {
        Ok(self.data.lock().unwrap().active_frames.get(&thread).copied())
    }

    fn inspector(&self) -> &dyn ValueInspector
    {
        &self.inspector
    }
}

// ---------------------------------------------------------------------------
// Attach
// ---------------------------------------------------------------------------

pub struct FakeFactory
{
    pub process: Arc<FakeProcess>,
}

impl RuntimeFactory for FakeFactory
{
    fn attach(&self, pid: ProcessId, events: EventSender) -> Result<Arc<dyn RuntimeProcess>>
    {
        if pid != PID {
            return Err(DebuggerError::ProcessNotFound(pid.0));
        }
        *self.process.events.lock().unwrap() = Some(events);
        let process: Arc<dyn RuntimeProcess> = self.process.clone();
        Ok(process)
    }
}

/// Timeouts short enough for tests.
pub fn test_config() -> SessionConfig
{
    SessionConfig {
        eval_timeout: Duration::from_secs(5),
        exit_poll_interval: Duration::from_millis(10),
        exit_wait_limit: Duration::from_secs(5),
    }
}

/// Attach a session to a fresh fake process, reporting to `sink`.
pub fn attach(symbols: FakeSymbols, sink: Arc<dyn NotificationSink>, config: SessionConfig) -> (Arc<FakeProcess>, Session)
{
    let process = FakeProcess::new();
    let factory = FakeFactory {
        process: Arc::clone(&process),
    };
    let session = Session::attach(&factory, PID, Box::new(symbols), sink, config).unwrap();
    (process, session)
}

/// A session attached to a fresh fake process.
pub struct Harness
{
    pub process: Arc<FakeProcess>,
    pub sink: Arc<RecordingSink>,
    pub session: Session,
}

impl Harness
{
    pub fn new(symbols: FakeSymbols) -> Self
    {
        Self::with_config(symbols, test_config())
    }

    pub fn with_config(symbols: FakeSymbols, config: SessionConfig) -> Self
    {
        let sink = Arc::new(RecordingSink::default());
        let (process, session) = attach(symbols, sink.clone(), config);
        Self { process, sink, session }
    }

    pub fn inspector(&self) -> &FakeInspector
    {
        self.process.fake_inspector()
    }

    /// Load `name` and wait until the dispatcher has resumed after it.
    pub fn load_module(&self, id: u64, name: &str)
    {
        let before = self.process.continues();
        self.process.emit(RuntimeEvent::LoadModule {
            module: module(id, name),
        });
        self.process.wait_for_continues(before + 1);
    }

    /// Stop `thread` at a breakpoint-less location via a completed step.
    pub fn stop_at(&self, thread: ThreadId, offset: u32)
    {
        self.process.set_active_frame(thread, MAIN, IlOffset(offset));
        self.process.emit(RuntimeEvent::StepComplete { thread });
        wait_until("current thread", || (self.session.current_thread() == Some(thread)).then_some(()));
    }
}
