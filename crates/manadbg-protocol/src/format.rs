//! # Record Formatting
//!
//! Conversion from engine types to MI records.

use manadbg_core::breakpoints::Breakpoint;
use manadbg_core::events::{Notification, StopReason};
use manadbg_core::types::{Address, SourceLocation, StackFrame, ThreadId, ThreadInfo, Value};

use crate::record::{MiValue, Record, Results};

/// `line` and `fullname` of a source location.
fn location_fields(location: &SourceLocation) -> Results
{
    Results::new()
        .with("line", MiValue::text(location.line))
        .with("fullname", location.file.as_str())
}

fn frame_location(frame: Option<&StackFrame>) -> Results
{
    frame
        .and_then(|frame| frame.location.as_ref())
        .map(location_fields)
        .unwrap_or_default()
}

/// `bkpt={...}` tuple of a breakpoint.
#[must_use]
pub fn breakpoint(bp: &Breakpoint) -> MiValue
{
    let mut results = Results::new()
        .with("number", MiValue::text(bp.id.raw()))
        .with("type", "breakpoint")
        .with("disp", "keep")
        .with("enabled", if bp.enabled { "y" } else { "n" });
    if bp.is_bound() {
        results.push("line", MiValue::text(bp.location.line));
        results.push("fullname", bp.fullname());
    } else {
        results.push("addr", "<PENDING>");
        results.push("pending", bp.location.to_string());
    }
    results.push("times", MiValue::text(bp.hit_count));
    results.push("original-location", bp.location.to_string());
    results.into_tuple()
}

/// Reply body of `break-insert`.
#[must_use]
pub fn breakpoint_inserted(bp: &Breakpoint) -> Results
{
    Results::new().with("bkpt", breakpoint(bp))
}

/// Reply body of `break-list`.
#[must_use]
pub fn breakpoint_table(breakpoints: &[Breakpoint]) -> Results
{
    let body = breakpoints.iter().map(|bp| ("bkpt".to_string(), breakpoint(bp))).collect();
    let table = Results::new()
        .with("nr_rows", MiValue::text(breakpoints.len()))
        .with("body", MiValue::ResultList(body));
    Results::new().with("BreakpointTable", table)
}

/// Reply body of `thread-info`.
#[must_use]
pub fn threads(threads: &[ThreadInfo], current: Option<ThreadId>) -> Results
{
    let list = threads
        .iter()
        .map(|thread| {
            Results::new()
                .with("id", MiValue::text(thread.id.raw()))
                .with("name", thread.name.as_deref().unwrap_or("<No name>"))
                .with("state", MiValue::text(thread.state))
                .into_tuple()
        })
        .collect();
    let mut results = Results::new().with("threads", MiValue::List(list));
    if let Some(current) = current {
        results.push("current-thread-id", MiValue::text(current.raw()));
    }
    results
}

/// `frame={...}` tuple; frames without a source location only carry
/// `level` and `func`.
#[must_use]
pub fn frame(frame: &StackFrame) -> MiValue
{
    let mut results = Results::new().with("level", MiValue::text(frame.index));
    if let Some(location) = &frame.location {
        results.extend(location_fields(location));
    }
    results.push("func", frame.display_name());
    results.into_tuple()
}

/// Reply body of `stack-list-frames`.
#[must_use]
pub fn stack(frames: &[StackFrame]) -> Results
{
    let list = frames.iter().map(|f| ("frame".to_string(), frame(f))).collect();
    Results::new().with("stack", MiValue::ResultList(list))
}

/// Reply body of `stack-list-variables`.
#[must_use]
pub fn variables(variables: &[(String, Value)]) -> Results
{
    let list = variables
        .iter()
        .map(|(name, value)| {
            Results::new()
                .with("name", name.as_str())
                .with("value", MiValue::text(value))
                .into_tuple()
        })
        .collect();
    Results::new().with("variables", MiValue::List(list))
}

/// Reply body of `data-evaluate-expression`.
#[must_use]
pub fn evaluation(value: &Value) -> Results
{
    Results::new().with("value", MiValue::text(value))
}

/// Reply body of `data-read-memory-bytes`.
#[must_use]
pub fn memory(address: Address, bytes: &[u8]) -> Results
{
    let contents: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    let block = Results::new()
        .with("begin", address.to_string())
        .with("offset", "0x0000000000000000")
        .with("end", (address + bytes.len() as u64).to_string())
        .with("contents", contents);
    Results::new().with("memory", MiValue::List(vec![block.into_tuple()]))
}

/// Asynchronous record for a notification.
#[must_use]
pub fn notification(notification: &Notification) -> Record
{
    match notification {
        Notification::LibraryLoaded { module, symbols_loaded } => {
            let mut results = Results::new().with("target-name", module.name.as_str());
            if !module.path.is_empty() {
                results.push("host-name", module.path.as_str());
            }
            results.push("symbols-loaded", if *symbols_loaded { "1" } else { "0" });
            Record::NotifyAsync {
                class: "library-loaded",
                results,
            }
        }
        Notification::ThreadCreated { thread } => Record::NotifyAsync {
            class: "thread-created",
            results: Results::new().with("id", MiValue::text(thread.raw())),
        },
        Notification::ThreadExited { thread } => Record::NotifyAsync {
            class: "thread-exited",
            results: Results::new().with("id", MiValue::text(thread.raw())),
        },
        Notification::Stopped { reason, thread, frame } => Record::ExecAsync {
            class: "stopped",
            results: stopped(*reason, *thread, frame.as_ref()),
        },
        Notification::BreakpointModified { id, location, bound } => {
            let mut bkpt = Results::new()
                .with("number", MiValue::text(id.raw()))
                .with("type", "breakpoint")
                .with("disp", "keep")
                .with("enabled", "y");
            if *bound {
                bkpt.extend(location_fields(location));
            } else {
                bkpt.push("addr", "<PENDING>");
                bkpt.push("pending", location.to_string());
            }
            Record::NotifyAsync {
                class: "breakpoint-modified",
                results: Results::new().with("bkpt", bkpt),
            }
        }
        Notification::Message { text } => Record::NotifyAsync {
            class: "message",
            results: Results::new().with("text", text.as_str()).with("send-to", "output-window"),
        },
    }
}

/// `*stopped` record body.
fn stopped(reason: StopReason, thread: Option<ThreadId>, frame: Option<&StackFrame>) -> Results
{
    let mut results = Results::new();
    match reason {
        StopReason::Exited(code) => {
            results.push("reason", "exited");
            results.push("exit-code", MiValue::text(code));
            return results;
        }
        StopReason::BreakpointHit { .. } => results.push("reason", "breakpoint-hit"),
        StopReason::EndSteppingRange => results.push("reason", "end-stepping-range"),
        StopReason::ExceptionReceived { stage } => {
            results.push("reason", "exception-received");
            results.push("exception-stage", MiValue::text(stage));
        }
        StopReason::Interrupted => {
            results.push("reason", "signal-received");
            results.push("signal-name", "SIGINT");
        }
    }
    if let Some(thread) = thread {
        results.push("thread-id", MiValue::text(thread.raw()));
    }
    results.push("stopped-threads", "all");
    if let StopReason::BreakpointHit { id } = reason {
        results.push("bkptno", MiValue::text(id.raw()));
    }
    results.extend(frame_location(frame));
    results
}
