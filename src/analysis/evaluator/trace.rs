use crate::analysis::frame::{Frame, Slot, Stack, Variables};
use std::collections::{BTreeMap, BTreeSet};

/// What the evaluator found out about one reachable instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry<'g> {
    /// Generalization of every state in which the instruction gets executed
    pub before: Frame<'g>,

    /// State right after the instruction completes normally
    pub after: Frame<'g>,

    /// Is this the target of a `jsr`?
    pub subroutine_start: bool,

    /// Offsets where execution can continue normally
    pub successors: BTreeSet<usize>,

    /// Handlers which can catch an exception thrown by the instruction
    pub exception_handlers: BTreeSet<usize>,

    /// Number of stack slots popped by the instruction
    pub consumed: usize,

    /// Number of stack slots pushed by the instruction
    pub produced: usize,
}

/// Result of evaluating one method body
///
/// Instructions which don't appear in the trace can never be executed. The trace is immutable
/// once produced, and queries about untraced offsets answer `None` (or `false`).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EvaluationTrace<'g> {
    pub(super) entries: BTreeMap<usize, TraceEntry<'g>>,
    pub(super) evaluations: usize,
}

impl<'g> EvaluationTrace<'g> {
    pub fn entry(&self, offset: usize) -> Option<&TraceEntry<'g>> {
        self.entries.get(&offset)
    }

    /// Can the instruction at this offset ever be executed?
    pub fn is_traced(&self, offset: usize) -> bool {
        self.entries.contains_key(&offset)
    }

    pub fn is_subroutine_start(&self, offset: usize) -> bool {
        self.entry(offset).map_or(false, |entry| entry.subroutine_start)
    }

    pub fn stack_before(&self, offset: usize) -> Option<&Stack<'g>> {
        self.entry(offset).map(|entry| &entry.before.stack)
    }

    pub fn stack_after(&self, offset: usize) -> Option<&Stack<'g>> {
        self.entry(offset).map(|entry| &entry.after.stack)
    }

    pub fn variables_before(&self, offset: usize) -> Option<&Variables<'g>> {
        self.entry(offset).map(|entry| &entry.before.locals)
    }

    pub fn variables_after(&self, offset: usize) -> Option<&Variables<'g>> {
        self.entry(offset).map(|entry| &entry.after.locals)
    }

    /// Stack slot before the instruction, where depth 0 is the top of the stack
    pub fn stack_top_before(&self, offset: usize, depth: usize) -> Option<&Slot<'g>> {
        self.stack_before(offset)
            .and_then(|stack| stack.top(depth).ok())
    }

    /// Every place control can go after the instruction (including exception handlers)
    pub fn successors(&self, offset: usize) -> BTreeSet<usize> {
        self.entry(offset)
            .map(|entry| {
                entry
                    .successors
                    .union(&entry.exception_handlers)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Offsets of reachable instructions, in ascending order
    pub fn traced_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TraceEntry<'g>)> {
        self.entries.iter().map(|(offset, entry)| (*offset, entry))
    }

    /// Total number of instruction evaluations it took to reach the fixed point
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
