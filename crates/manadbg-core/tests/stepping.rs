//! Tests for stepping and the current thread

mod support;

use manadbg_core::error::DebuggerError;
use manadbg_core::events::{Notification, RuntimeEvent, StopReason};
use manadbg_core::runtime::{InterceptMask, RawFrame, WalkStep};
use manadbg_core::stepping::{StepMode, StepPlan};
use manadbg_core::types::{FunctionRef, IlOffset, IlRange, MethodToken, ThreadId};
use support::{program_symbols, FakeSymbols, Harness, StepCall, APP_MODULE, MAIN, MAIN_THREAD};

fn stopped_harness() -> Harness
{
    let h = Harness::new(FakeSymbols::default().with("App.dll", program_symbols()));
    h.load_module(APP_MODULE.0, "App.dll");
    h.stop_at(MAIN_THREAD, 8);
    h
}

#[test]
fn test_step_without_current_thread_fails()
{
    let h = Harness::new(FakeSymbols::default());
    assert!(matches!(h.session.step(StepMode::Over), Err(DebuggerError::NoCurrentThread)));
}

#[test]
fn test_step_over_uses_sequence_point_range()
{
    let h = stopped_harness();
    let before = h.process.continues();

    let plan = h.session.step(StepMode::Over).unwrap();

    let range = IlRange {
        start: IlOffset(8),
        end: IlOffset(20),
    };
    assert_eq!(plan, StepPlan::Range(range));
    assert_eq!(h.process.continues(), before + 1);
    assert_eq!(h.process.step_log(), vec![
        (MAIN_THREAD, StepCall::Mask(InterceptMask::USER_STEP)),
        (MAIN_THREAD, StepCall::Range {
            step_in: false,
            ranges: vec![range]
        }),
    ]);
}

#[test]
fn test_step_in_on_last_line_runs_to_end_of_method()
{
    let h = stopped_harness();
    h.process.set_active_frame(MAIN_THREAD, MAIN, IlOffset(33));

    let plan = h.session.step(StepMode::In).unwrap();

    assert_eq!(
        plan,
        StepPlan::Range(IlRange {
            start: IlOffset(31),
            end: IlOffset(40),
        })
    );
}

#[test]
fn test_step_without_symbols_is_a_single_instruction()
{
    let h = stopped_harness();
    let unknown = FunctionRef {
        module: APP_MODULE,
        token: MethodToken(0x0600_0099),
    };
    h.process.set_active_frame(MAIN_THREAD, unknown, IlOffset(4));

    let plan = h.session.step(StepMode::In).unwrap();

    assert_eq!(plan, StepPlan::Instruction);
    assert_eq!(h.process.step_log().last(), Some(&(MAIN_THREAD, StepCall::Single { step_in: true })));
}

#[test]
fn test_step_out()
{
    let h = stopped_harness();

    let plan = h.session.step(StepMode::Out).unwrap();

    assert_eq!(plan, StepPlan::Out);
    assert_eq!(h.process.step_log().last(), Some(&(MAIN_THREAD, StepCall::Out)));
}

#[test]
fn test_new_step_replaces_active_stepper()
{
    let h = stopped_harness();

    h.session.step(StepMode::Over).unwrap();
    h.session.step(StepMode::Out).unwrap();

    assert!(h.process.step_log().contains(&(MAIN_THREAD, StepCall::Deactivate)));
}

#[test]
fn test_step_complete_reports_end_stepping_range()
{
    let h = stopped_harness();
    h.session.step(StepMode::Over).unwrap();

    h.process.set_active_frame(MAIN_THREAD, MAIN, IlOffset(20));
    h.process.emit(RuntimeEvent::StepComplete { thread: MAIN_THREAD });

    let stop = h.sink.wait_for(|n| match n {
        Notification::Stopped {
            reason: StopReason::EndSteppingRange,
            frame: Some(frame),
            ..
        } => frame.location.as_ref().is_some_and(|location| location.line == 11),
        _ => false,
    });
    assert!(matches!(stop, Notification::Stopped { thread: Some(MAIN_THREAD), .. }));
}

#[test]
fn test_frames_follow_the_thread_of_the_latest_stop()
{
    let h = stopped_harness();
    let worker = ThreadId(202);
    h.process.set_stack(worker, vec![WalkStep::Frame(RawFrame::Il {
        function: Some(MAIN),
        il_offset: IlOffset(31),
    })]);

    h.stop_at(worker, 31);

    assert_eq!(h.session.current_thread(), Some(worker));
    let frames = h.session.list_frames().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].location.as_ref().map(|l| l.line), Some(12));
}
