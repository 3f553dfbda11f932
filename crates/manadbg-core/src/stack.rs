//! Stack walking and frame classification.
//!
//! Frames are classified in a fixed order: end of stack, native, runtime
//! unwindable, then an attempt at an IL interpretation. A frame that cannot
//! be resolved is still reported, with its own index, and the walk goes on.
//! Nothing is cached; every listing walks the stack again.

use tracing::trace;

use crate::error::Result;
use crate::runtime::{RawFrame, RuntimeProcess, WalkStep};
use crate::symbols::SymbolStore;
use crate::types::{FrameKind, StackFrame, ThreadId};

/// Walks the stacks of stopped threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct StackWalker;

impl StackWalker
{
    /// All frames of `thread`, innermost first.
    pub fn frames(&self, process: &dyn RuntimeProcess, symbols: &SymbolStore, thread: ThreadId) -> Result<Vec<StackFrame>>
    {
        let mut walk = process.stack_walk(thread)?;
        let mut frames = Vec::new();

        loop {
            let index = frames.len();
            let frame = match walk.next_frame()? {
                WalkStep::EndOfStack => break,
                WalkStep::Unresolvable => StackFrame::bare(index, FrameKind::Native),
                WalkStep::Frame(raw) => classify(index, raw, symbols),
            };
            trace!("Frame {index}: {} {}", frame.kind, frame.display_name());
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Innermost frame of `thread`, with its source location.
    pub fn top_frame(&self, process: &dyn RuntimeProcess, symbols: &SymbolStore, thread: ThreadId) -> Result<Option<StackFrame>>
    {
        let Some((function, offset)) = process.active_frame(thread)? else {
            return Ok(None);
        };
        Ok(Some(StackFrame {
            index: 0,
            kind: FrameKind::ManagedIl,
            function: Some(function),
            il_offset: Some(offset),
            location: symbols.location_of(function, offset),
            method: symbols.method_name(function),
        }))
    }
}

fn classify(index: usize, raw: RawFrame, symbols: &SymbolStore) -> StackFrame
{
    match raw {
        RawFrame::Native => StackFrame::bare(index, FrameKind::Native),
        RawFrame::RuntimeUnwindable => StackFrame::bare(index, FrameKind::RuntimeUnwindable),
        RawFrame::Il { function: None, .. } => StackFrame::bare(index, FrameKind::Stub),
        RawFrame::Il {
            function: Some(function),
            il_offset,
        } => StackFrame {
            index,
            kind: FrameKind::ManagedIl,
            function: Some(function),
            il_offset: Some(il_offset),
            location: symbols.location_of(function, il_offset),
            method: symbols.method_name(function),
        },
        RawFrame::Other => StackFrame::bare(index, FrameKind::Unresolvable),
    }
}
