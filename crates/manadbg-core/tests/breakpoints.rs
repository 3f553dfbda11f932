//! Tests for breakpoint binding through the session

mod support;

use manadbg_core::breakpoints::{BreakpointId, BreakpointState};
use manadbg_core::events::{Notification, RuntimeEvent, StopReason};
use manadbg_core::runtime::NativeBreakpoint;
use manadbg_core::types::IlOffset;
use support::{program_symbols, FakeSymbols, Harness, APP_MODULE, MAIN, MAIN_THREAD};

fn harness() -> Harness
{
    Harness::new(
        FakeSymbols::default()
            .with("App.dll", program_symbols())
            .with("App.Copy.dll", program_symbols()),
    )
}

#[test]
fn test_breakpoint_before_load_is_pending_then_bound_once()
{
    let h = harness();

    let bp = h.session.insert_breakpoint("Program.cs", 10).unwrap();
    assert_eq!(bp.state, BreakpointState::Pending);
    assert!(h.process.native_breakpoints().is_empty());

    h.load_module(APP_MODULE.0, "App.dll");
    let bound = h.session.breakpoints();
    assert_eq!(bound.len(), 1);
    assert!(bound[0].is_bound());
    assert_eq!(bound[0].fullname(), "/src/App/Program.cs");

    let natives = h.process.native_breakpoints();
    assert_eq!(natives.len(), 1);
    assert_eq!(natives[0].1, MAIN);
    assert_eq!(natives[0].2, IlOffset(8));

    // A second module with the same source must not bind it again.
    h.load_module(2, "App.Copy.dll");
    assert_eq!(h.process.native_breakpoints().len(), 1);
    assert_eq!(
        h.sink
            .count(|n| matches!(n, Notification::BreakpointModified { bound: true, .. })),
        1
    );
}

#[test]
fn test_breakpoint_after_load_binds_immediately()
{
    let h = harness();
    h.load_module(APP_MODULE.0, "App.dll");

    let bp = h.session.insert_breakpoint("/src/App/Program.cs", 11).unwrap();
    match bp.state {
        BreakpointState::Bound(binding) => {
            assert_eq!(binding.function, MAIN);
            assert_eq!(binding.il_offset, IlOffset(20));
        }
        BreakpointState::Pending => panic!("expected a bound breakpoint"),
    }
}

#[test]
fn test_breakpoint_ids_are_unique_and_duplicates_reuse_them()
{
    let h = harness();

    let first = h.session.insert_breakpoint("Program.cs", 9).unwrap();
    let second = h.session.insert_breakpoint("Program.cs", 10).unwrap();
    let again = h.session.insert_breakpoint("Program.cs", 9).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.id, again.id);
    assert_eq!(h.session.breakpoints().len(), 2);
}

#[test]
fn test_delete_unknown_breakpoint_is_a_no_op()
{
    let h = harness();
    h.session.insert_breakpoint("Program.cs", 9).unwrap();

    h.session.delete_breakpoint(BreakpointId::from_raw(99)).unwrap();
    assert_eq!(h.session.breakpoints().len(), 1);
}

#[test]
fn test_delete_deactivates_native_breakpoint()
{
    let h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    let bp = h.session.insert_breakpoint("Program.cs", 10).unwrap();

    h.session.delete_breakpoint(bp.id).unwrap();

    assert!(h.session.breakpoints().is_empty());
    let natives = h.process.native_breakpoints();
    assert_eq!(natives.len(), 1);
    assert!(!natives[0].3, "native breakpoint should be inactive");
}

#[test]
fn test_delete_after_exit_succeeds()
{
    let h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    let bp = h.session.insert_breakpoint("Program.cs", 10).unwrap();

    h.process.emit(RuntimeEvent::ExitProcess { exit_code: 0 });
    h.sink.wait_for(|n| {
        matches!(n, Notification::Stopped {
            reason: StopReason::Exited(0),
            ..
        })
    });

    h.session.delete_breakpoint(BreakpointId::from_raw(99)).unwrap();
    h.session.delete_breakpoint(bp.id).unwrap();
    assert!(h.session.breakpoints().is_empty());
}

#[test]
fn test_unload_returns_breakpoint_to_pending()
{
    let h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    let bp = h.session.insert_breakpoint("Program.cs", 10).unwrap();
    assert!(bp.is_bound());

    let before = h.process.continues();
    h.process.emit(RuntimeEvent::UnloadModule { module: APP_MODULE });
    h.process.wait_for_continues(before + 1);

    let listed = h.session.breakpoints();
    assert_eq!(listed[0].state, BreakpointState::Pending);
    h.sink
        .wait_for(|n| matches!(n, Notification::BreakpointModified { bound: false, id, .. } if *id == bp.id));
}

#[test]
fn test_breakpoint_hit_stops_and_counts()
{
    let h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    let bp = h.session.insert_breakpoint("Program.cs", 10).unwrap();
    let (native, ..) = h.process.native_breakpoints()[0];

    h.process.set_active_frame(MAIN_THREAD, MAIN, IlOffset(8));
    h.process.emit(RuntimeEvent::Breakpoint {
        thread: MAIN_THREAD,
        breakpoint: native,
    });

    let stop = h
        .sink
        .wait_for(|n| matches!(n, Notification::Stopped { reason: StopReason::BreakpointHit { .. }, .. }));
    let Notification::Stopped { reason, thread, frame } = stop else {
        unreachable!()
    };
    assert_eq!(reason, StopReason::BreakpointHit { id: bp.id });
    assert_eq!(thread, Some(MAIN_THREAD));
    let location = frame.and_then(|frame| frame.location).unwrap();
    assert_eq!(location.line, 10);
    assert_eq!(h.session.current_thread(), Some(MAIN_THREAD));
    assert_eq!(h.session.breakpoints()[0].hit_count, 1);
}

#[test]
fn test_unknown_native_breakpoint_resumes()
{
    let h = harness();
    let before = h.process.continues();

    h.process.emit(RuntimeEvent::Breakpoint {
        thread: MAIN_THREAD,
        breakpoint: NativeBreakpoint(404),
    });
    h.process.wait_for_continues(before + 1);

    assert_eq!(h.session.current_thread(), None);
    assert_eq!(h.sink.count(|n| matches!(n, Notification::Stopped { .. })), 0);
}

#[test]
fn test_invalid_location_is_rejected()
{
    let h = harness();
    assert!(h.session.insert_breakpoint("", 3).is_err());
    assert!(h.session.insert_breakpoint("Program.cs", 0).is_err());
    assert!(h.session.breakpoints().is_empty());
}

#[test]
fn test_disable_all_deactivates_everything()
{
    let h = harness();
    h.load_module(APP_MODULE.0, "App.dll");
    h.session.insert_breakpoint("Program.cs", 9).unwrap();
    h.session.insert_breakpoint("Program.cs", 12).unwrap();

    h.session.disable_all().unwrap();

    assert!(h.session.breakpoints().is_empty());
    assert!(h.process.native_breakpoints().iter().all(|(.., active)| !active));
    // Ids keep counting after a clear.
    let next = h.session.insert_breakpoint("Program.cs", 11).unwrap();
    assert_eq!(next.id.raw(), 3);
}
