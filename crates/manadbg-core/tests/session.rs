//! Tests for session lifecycle and run control

mod support;

use std::time::Duration;

use manadbg_core::error::{DebuggerError, EvalError};
use manadbg_core::events::{ExceptionStage, Notification, RuntimeEvent, StopReason};
use manadbg_core::process::{page_size, MAX_READ_LEN};
use manadbg_core::runtime::{MethodHandle, RawFrame, WalkStep};
use manadbg_core::session::{Session, SessionConfig};
use manadbg_core::types::{Address, FrameKind, IlOffset, ProcessId, ThreadState};
use support::{
    program_symbols, wait_until, CallBehavior, FakeFactory, FakeProcess, FakeSymbols, Harness, RecordingSink, APP_MODULE,
    MAIN, MAIN_THREAD,
};

fn harness() -> Harness
{
    Harness::new(FakeSymbols::default().with("App.dll", program_symbols()))
}

#[test]
fn test_breakpoint_scenario_end_to_end()
{
    let h = harness();

    let bp = h.session.insert_breakpoint("Program.cs", 10).unwrap();
    assert!(!bp.is_bound());

    h.load_module(APP_MODULE.0, "App.dll");
    assert!(h.session.breakpoints()[0].is_bound());

    h.session.continue_execution().unwrap();
    let (native, ..) = h.process.native_breakpoints()[0];
    h.process.set_active_frame(MAIN_THREAD, MAIN, IlOffset(8));
    h.process.set_stack(MAIN_THREAD, vec![WalkStep::Frame(RawFrame::Il {
        function: Some(MAIN),
        il_offset: IlOffset(8),
    })]);
    h.process.emit(RuntimeEvent::Breakpoint {
        thread: MAIN_THREAD,
        breakpoint: native,
    });

    let stop = h.sink.wait_for(|n| matches!(n, Notification::Stopped { .. }));
    let Notification::Stopped {
        reason,
        thread,
        frame: Some(frame),
    } = stop
    else {
        panic!("unexpected stop record {stop:?}");
    };
    assert_eq!(reason, StopReason::BreakpointHit { id: bp.id });
    assert_eq!(thread, Some(MAIN_THREAD));
    let location = frame.location.unwrap();
    assert_eq!(location.line, 10);
    assert_eq!(location.file, "/src/App/Program.cs");

    let frames = h.session.list_frames().unwrap();
    assert_eq!(frames[0].kind, FrameKind::ManagedIl);
    assert_eq!(frames[0].location.as_ref().map(|l| l.line), Some(10));
}

#[test]
fn test_attach_to_unknown_pid_fails()
{
    let factory = FakeFactory {
        process: FakeProcess::new(),
    };
    let result = Session::attach(
        &factory,
        ProcessId(1),
        Box::new(FakeSymbols::default()),
        std::sync::Arc::new(RecordingSink::default()),
        SessionConfig::default(),
    );
    let err = result.unwrap_err();
    assert!(matches!(err, DebuggerError::ProcessNotFound(1)));
    assert!(err.is_fatal());
}

#[test]
fn test_thread_info()
{
    let h = harness();
    let threads = h.session.threads().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, MAIN_THREAD);
    assert_eq!(threads[0].state, ThreadState::Running);
}

#[test]
fn test_interrupt_picks_a_thread_and_reports_it()
{
    let h = harness();
    assert_eq!(h.session.current_thread(), None);

    h.session.interrupt().unwrap();

    assert_eq!(h.process.stops(), 1);
    assert_eq!(h.session.current_thread(), Some(MAIN_THREAD));
    h.sink.wait_for(|n| {
        matches!(n, Notification::Stopped {
            reason: StopReason::Interrupted,
            thread: Some(MAIN_THREAD),
            ..
        })
    });
}

#[test]
fn test_read_memory_is_truncated_at_the_page_boundary()
{
    let h = harness();
    let page = page_size();
    let start = Address::new(page * 16 - 16);
    h.process.add_memory(start, (0..16).collect());

    let bytes = h.session.read_memory(start, 64).unwrap();
    assert_eq!(bytes, (0..16).collect::<Vec<u8>>());

    let bytes = h.session.read_memory(start + 4, 4).unwrap();
    assert_eq!(bytes, vec![4, 5, 6, 7]);

    assert!(h.session.read_memory(Address::new(page * 64), 8).is_err());
    assert!(matches!(
        h.session.read_memory(start, MAX_READ_LEN + 1),
        Err(DebuggerError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.session.read_memory(start, usize::MAX),
        Err(DebuggerError::InvalidArgument(_))
    ));
}

#[test]
fn test_handled_exception_resumes_with_a_message()
{
    let h = harness();
    let before = h.process.continues();

    h.process.emit(RuntimeEvent::Exception {
        thread: MAIN_THREAD,
        stage: ExceptionStage::FirstChance,
        type_name: Some("System.FormatException".into()),
        module_name: Some("App.dll".into()),
    });
    h.process.wait_for_continues(before + 1);

    h.sink.wait_for(|n| {
        matches!(n, Notification::Message { text } if text == "Exception thrown: 'System.FormatException' in App.dll\n")
    });
    assert_eq!(h.session.current_thread(), None);
}

#[test]
fn test_unhandled_exception_stops()
{
    let h = harness();

    h.process.emit(RuntimeEvent::Exception {
        thread: MAIN_THREAD,
        stage: ExceptionStage::Unhandled,
        type_name: Some("System.NullReferenceException".into()),
        module_name: Some("App.dll".into()),
    });

    h.sink.wait_for(|n| {
        matches!(n, Notification::Stopped {
            reason: StopReason::ExceptionReceived {
                stage: ExceptionStage::Unhandled
            },
            ..
        })
    });
    assert_eq!(h.session.current_thread(), Some(MAIN_THREAD));
}

#[test]
fn test_thread_lifecycle_notifications()
{
    let h = harness();
    let worker = manadbg_core::types::ThreadId(7);
    h.stop_at(worker, 0);

    h.process.emit(RuntimeEvent::ExitThread { thread: worker });
    h.sink
        .wait_for(|n| matches!(n, Notification::ThreadExited { thread } if *thread == worker));

    assert_eq!(h.session.current_thread(), None);
}

#[test]
fn test_debuggee_exit_ends_the_session()
{
    let h = harness();

    h.process.emit(RuntimeEvent::ExitProcess { exit_code: 3 });
    h.sink.wait_for(|n| {
        matches!(n, Notification::Stopped {
            reason: StopReason::Exited(3),
            thread: None,
            ..
        })
    });

    assert!(h.session.has_exited());
    assert_eq!(h.session.exit_code(), Some(3));
    assert!(matches!(h.session.continue_execution(), Err(DebuggerError::NotAttached)));
}

#[test]
fn test_exit_during_evaluation_fails_the_wait()
{
    let h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    h.stop_at(MAIN_THREAD, 8);
    let this = h.inspector().object("App.Program");
    h.inspector()
        .add_property(&this, "Slow", MethodHandle(5), CallBehavior::Hang);
    h.inspector().set_this(MAIN_THREAD, 0, this);

    let result = std::thread::scope(|scope| {
        let evaluation = scope.spawn(|| h.session.evaluate("Slow", 0));
        wait_until("call issued", || (!h.inspector().issued_calls().is_empty()).then_some(()));
        h.process.emit(RuntimeEvent::ExitProcess { exit_code: 0 });
        evaluation.join().unwrap()
    });

    assert!(matches!(result, Err(DebuggerError::Evaluation(EvalError::ProcessExited))));
}

#[test]
fn test_terminate_waits_for_exit()
{
    let mut h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    h.session.insert_breakpoint("Program.cs", 10).unwrap();

    assert!(h.session.terminate().unwrap());

    assert!(h.process.is_terminated());
    assert_eq!(h.session.exit_code(), Some(137));
    assert!(h.process.native_breakpoints().iter().all(|(.., active)| !active));
    assert!(matches!(h.session.threads(), Err(DebuggerError::NotAttached)));
}

#[test]
fn test_terminate_gives_up_after_the_wait_limit()
{
    let mut h = Harness::with_config(FakeSymbols::default(), SessionConfig {
        eval_timeout: Duration::from_secs(1),
        exit_poll_interval: Duration::from_millis(5),
        exit_wait_limit: Duration::from_millis(50),
    });
    h.process.set_exit_on_terminate(None);

    assert!(!h.session.terminate().unwrap());
    assert!(!h.session.has_exited());
}

#[test]
fn test_detach_leaves_the_debuggee_running()
{
    let mut h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    h.session.insert_breakpoint("Program.cs", 10).unwrap();

    h.session.detach().unwrap();

    assert!(h.process.is_detached());
    assert!(!h.process.is_terminated());
    assert!(h.process.native_breakpoints().iter().all(|(.., active)| !active));
    assert!(matches!(h.session.continue_execution(), Err(DebuggerError::NotAttached)));
    // Nothing left to detach from.
    h.session.shutdown().unwrap();
}

#[test]
fn test_runtime_messages_are_forwarded()
{
    let h = harness();

    h.process.emit(RuntimeEvent::LogMessage {
        message: "hello from Debug.WriteLine".into(),
    });
    h.process.emit(RuntimeEvent::LoadClass);

    h.sink
        .wait_for(|n| matches!(n, Notification::Message { text } if text == "hello from Debug.WriteLine"));
    h.sink
        .wait_for(|n| matches!(n, Notification::Message { text } if text == "event received LoadClass"));
}
