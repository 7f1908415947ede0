//! Backward analysis deciding which instructions of a method body must be kept
//!
//! Starting from instructions with effects visible outside the method (returns, throws, stores
//! to the heap, calls, monitors), necessity flows backwards to:
//!
//!   - the producers of stack entries and local variables a necessary instruction reads
//!   - the branches that decide whether a necessary instruction runs (control dependences)
//!   - every producer of a stack entry, once one of them is kept, so that the stack stays
//!     consistent at every merge point
//!
//! Stack entries are tracked by their index from the bottom of the stack, which the evaluator
//! guarantees to be the same along every path into an instruction.

mod post_dominators;

use super::evaluator::{EvaluationTrace, PartialEvaluator};
use super::invocation::InvocationUnit;
use super::value::Origin;
use super::{Error, UsageMarkerSettings};
use crate::jvm::code::{Code, Instruction, InvokeType, MethodBody};
use crate::jvm::ConstantData;
use log::{debug, warn};
use post_dominators::{control_dependences, Graph};
use std::collections::{BTreeMap, BTreeSet};

pub struct InstructionUsageMarker {
    settings: UsageMarkerSettings,
}

impl InstructionUsageMarker {
    pub fn new(settings: UsageMarkerSettings) -> InstructionUsageMarker {
        InstructionUsageMarker { settings }
    }

    pub fn settings(&self) -> &UsageMarkerSettings {
        &self.settings
    }

    /// Mark the necessary instructions of a method body
    ///
    /// A trace from an earlier evaluation of the same body can be passed in, in which case the
    /// method is only evaluated again if the settings ask for it. If the evaluation gets
    /// aborted for being too complex, every instruction is considered necessary.
    pub fn mark<'g, U: InvocationUnit<'g>>(
        &self,
        body: &MethodBody<'_, 'g>,
        evaluator: &mut PartialEvaluator<'g, U>,
        previous: Option<&EvaluationTrace<'g>>,
    ) -> Result<InstructionUsage, Error> {
        let evaluated;
        let trace = match previous {
            Some(trace) if !self.settings.run_evaluator => trace,
            _ => match evaluator.evaluate(body) {
                Ok(trace) => {
                    evaluated = trace;
                    &evaluated
                }
                Err(Error::ExcessiveComplexity {
                    method,
                    evaluations,
                }) => {
                    warn!(
                        "Keeping all of {} (gave up after {} evaluations)",
                        method, evaluations
                    );
                    return Ok(InstructionUsage::all_necessary(body.code));
                }
                Err(err) => return Err(err),
            },
        };

        let usage = self.mark_trace(body, trace);
        debug!(
            "Marked {} of {} reachable instructions in {} as necessary",
            usage.necessary.len(),
            usage.traced.len(),
            body.name(),
        );
        Ok(usage)
    }

    /// Is the instruction necessary no matter what happens around it?
    fn is_seed(&self, body: &MethodBody<'_, '_>, offset: usize, instruction: &Instruction) -> bool {
        use Instruction::*;

        match instruction {
            IReturn | LReturn | FReturn | DReturn | AReturn | Return | AThrow => true,
            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => true,
            PutField(_) | PutStatic(_) => true,
            MonitorEnter | MonitorExit => true,
            Invoke(InvokeType::Special, index)
                if self.settings.ensure_safety_for_verifier
                    && is_constructor_call(body, *index) =>
            {
                true
            }
            Invoke(_, _) | InvokeDynamic(_) => self.settings.mark_external_side_effects,
            CheckCast(_) => self.settings.ensure_safety_for_verifier,

            // Removing these would let execution fall into the next instruction
            Goto(target) => body.code.next_offset(offset) != Some(*target),
            Jsr(_) | Ret(_) | TableSwitch { .. } | LookupSwitch { .. } => true,
            _ => false,
        }
    }

    fn mark_trace<'g>(
        &self,
        body: &MethodBody<'_, 'g>,
        trace: &EvaluationTrace<'g>,
    ) -> InstructionUsage {
        let code = body.code;
        let graph: Graph = trace
            .traced_offsets()
            .map(|offset| (offset, trace.successors(offset)))
            .collect();
        let control_dependences = control_dependences(&graph);

        let mut necessary: BTreeSet<usize> = trace
            .traced_offsets()
            .filter(|offset| {
                code.instruction_at(*offset)
                    .map_or(false, |instruction| self.is_seed(body, *offset, instruction))
            })
            .collect();

        let mut stack_before: BTreeMap<usize, Vec<bool>> = BTreeMap::new();
        let mut stack_after: BTreeMap<usize, Vec<bool>> = BTreeMap::new();
        let mut unwanted: BTreeMap<usize, Vec<bool>> = BTreeMap::new();
        for (offset, entry) in trace.iter() {
            stack_before.insert(offset, vec![false; entry.before.stack.size()]);
            stack_after.insert(offset, vec![false; entry.after.stack.size()]);
            unwanted.insert(offset, vec![false; entry.before.stack.size()]);
        }

        // Going backwards through the code converges faster
        let offsets: Vec<usize> = trace.traced_offsets().collect();
        let mut changed = true;
        while changed {
            changed = false;
            for offset in offsets.iter().rev().copied() {
                let (entry, instruction) = match (trace.entry(offset), code.instruction_at(offset)) {
                    (Some(entry), Some(instruction)) => (entry, instruction),
                    _ => continue,
                };

                // Stack entries needed by the normal successors
                let mut needed_after = stack_after.get(&offset).cloned().unwrap_or_default();
                for successor in &entry.successors {
                    if let Some(needed) = stack_before.get(successor) {
                        for (slot, needed) in needed_after.iter_mut().zip(needed) {
                            *slot |= *needed;
                        }
                    }
                }
                let produced_from = needed_after.len().saturating_sub(entry.produced);
                if needed_after[produced_from..].iter().any(|needed| *needed) {
                    changed |= necessary.insert(offset);
                }

                // Values pushed by a kept instruction must still get popped. Caught exceptions
                // get pushed no matter what, so they count as kept.
                let height_before = entry.before.stack.size();
                let consumed_from = height_before.saturating_sub(entry.consumed);
                if !necessary.contains(&offset) {
                    for index in consumed_from..height_before {
                        let origins = match entry.before.stack.get(index) {
                            Some(slot) => &slot.producers,
                            None => continue,
                        };
                        let is_kept = origins.iter().any(|origin| match origin {
                            Origin::Instruction(producer) => necessary.contains(producer),
                            _ => true,
                        });
                        if !is_kept {
                            continue;
                        }
                        let producers: Vec<usize> = origins
                            .iter()
                            .filter_map(|origin| match origin {
                                Origin::Instruction(producer) => Some(*producer),
                                _ => None,
                            })
                            .collect();
                        if matches!(instruction, Instruction::Pop | Instruction::Pop2) {
                            changed |= necessary.insert(offset);
                        } else {
                            for producer in producers {
                                changed |= necessary.insert(producer);
                            }
                            if let Some(slot) = unwanted
                                .get_mut(&offset)
                                .and_then(|unwanted| unwanted.get_mut(index))
                            {
                                changed |= !*slot;
                                *slot = true;
                            }
                        }
                    }
                }

                let is_necessary = necessary.contains(&offset);
                let mut needed_before = stack_before.get(&offset).cloned().unwrap_or_default();
                for (index, slot) in needed_before.iter_mut().enumerate() {
                    *slot |= if index < consumed_from {
                        needed_after.get(index).copied().unwrap_or(false)
                    } else {
                        is_necessary
                    };
                }

                if is_necessary {
                    if let Some((local, _)) = instruction.reads_local() {
                        if let Ok(slot) = entry.before.locals.load(local) {
                            for origin in &slot.producers {
                                if let Origin::Instruction(producer) = origin {
                                    changed |= necessary.insert(*producer);
                                }
                            }
                        }
                    }
                    if let Some(branches) = control_dependences.get(&offset) {
                        for branch in branches {
                            changed |= necessary.insert(*branch);
                        }
                    }
                }

                if stack_after.get(&offset) != Some(&needed_after) {
                    stack_after.insert(offset, needed_after);
                    changed = true;
                }
                if stack_before.get(&offset) != Some(&needed_before) {
                    stack_before.insert(offset, needed_before);
                    changed = true;
                }
            }
        }

        InstructionUsage {
            all_necessary: false,
            traced: offsets.into_iter().collect(),
            necessary,
            stack_before,
            stack_after,
            unwanted,
        }
    }
}

fn is_constructor_call(body: &MethodBody<'_, '_>, index: u16) -> bool {
    matches!(
        body.constants.get(index),
        Some(ConstantData::Method(method)) if method.name.is_init()
    )
}

/// Which instructions and stack entries of a method body are necessary
///
/// Stack entry indices in queries count from the top of the stack (0 is the top).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionUsage {
    all_necessary: bool,
    traced: BTreeSet<usize>,
    necessary: BTreeSet<usize>,
    stack_before: BTreeMap<usize, Vec<bool>>,
    stack_after: BTreeMap<usize, Vec<bool>>,
    unwanted: BTreeMap<usize, Vec<bool>>,
}

impl InstructionUsage {
    /// Usage in which nothing can be removed
    pub fn all_necessary(code: &Code<'_>) -> InstructionUsage {
        let offsets: BTreeSet<usize> = code.iter().map(|(offset, _)| offset).collect();
        InstructionUsage {
            all_necessary: true,
            traced: offsets.clone(),
            necessary: offsets,
            stack_before: BTreeMap::new(),
            stack_after: BTreeMap::new(),
            unwanted: BTreeMap::new(),
        }
    }

    /// Did the marking give up, keeping everything?
    pub fn is_all_necessary(&self) -> bool {
        self.all_necessary
    }

    pub fn is_instruction_necessary(&self, offset: usize) -> bool {
        self.necessary.contains(&offset)
    }

    pub fn is_traced(&self, offset: usize) -> bool {
        self.traced.contains(&offset)
    }

    pub fn necessary_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.necessary.iter().copied()
    }

    fn from_top(entries: Option<&Vec<bool>>, index: usize) -> bool {
        entries
            .and_then(|entries| entries.len().checked_sub(index + 1).map(|i| entries[i]))
            .unwrap_or(false)
    }

    /// Is the stack entry right before the instruction used later on?
    pub fn is_stack_entry_necessary_before(&self, offset: usize, index: usize) -> bool {
        self.all_necessary || Self::from_top(self.stack_before.get(&offset), index)
    }

    /// Is the stack entry right after the instruction used later on?
    pub fn is_stack_entry_necessary_after(&self, offset: usize, index: usize) -> bool {
        self.all_necessary || Self::from_top(self.stack_after.get(&offset), index)
    }

    /// Does the stack entry need to be popped in place of the (removed) instruction?
    ///
    /// This happens when the instruction is unnecessary but the value it would have consumed
    /// still gets pushed by a necessary instruction.
    pub fn is_stack_entry_unwanted_before(&self, offset: usize, index: usize) -> bool {
        !self.all_necessary && Self::from_top(self.unwanted.get(&offset), index)
    }

    /// Does removing the instruction require popping some of the values it consumed?
    pub fn is_extra_push_pop_instruction_necessary(&self, offset: usize) -> bool {
        !self.all_necessary
            && self
                .unwanted
                .get(&offset)
                .map_or(false, |unwanted| unwanted.iter().any(|slot| *slot))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::{BasicInvocationUnit, EvaluatorSettings, ValueFactory};
    use crate::jvm::class_graph::{ClassGraph, ClassGraphArenas, ClassId, MethodData, MethodId};
    use crate::jvm::code::Instruction::*;
    use crate::jvm::{ConstantPool, MethodAccessFlags, MethodRef, Name, UnqualifiedName};

    fn static_method<'g>(
        class_graph: &ClassGraph<'g>,
        class: ClassId<'g>,
        name: &str,
        descriptor: &str,
    ) -> MethodId<'g> {
        class_graph.add_method(MethodData {
            class,
            name: UnqualifiedName::from_str(name).unwrap(),
            descriptor: class_graph.parse_method_descriptor(descriptor).unwrap(),
            access_flags: MethodAccessFlags::STATIC,
            retained: false,
        })
    }

    fn mark<'g>(
        class_graph: &ClassGraph<'g>,
        body: &MethodBody<'_, 'g>,
        settings: UsageMarkerSettings,
    ) -> InstructionUsage {
        let evaluator_settings = EvaluatorSettings::default();
        let factory = ValueFactory::new(evaluator_settings.precision, class_graph);
        let unit = BasicInvocationUnit::new(factory);
        let mut evaluator = PartialEvaluator::new(evaluator_settings, class_graph, unit);
        InstructionUsageMarker::new(settings)
            .mark(body, &mut evaluator, None)
            .unwrap()
    }

    #[test]
    fn ignored_call_results() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let method = static_method(&class_graph, java.lang.object, "test", "()I");
        let callee = static_method(&class_graph, java.lang.object, "next", "()I");

        let mut constants = ConstantPool::new();
        let next = constants.push(ConstantData::Method(MethodRef::resolved(callee)));

        // 0: invokestatic, 3: istore_0, 4: iconst_1, 5: ireturn
        let code = Code::assemble(
            vec![
                Invoke(InvokeType::Static, next),
                IStore(0),
                IConst1,
                IReturn,
            ],
            vec![],
            1,
            1,
        )
        .unwrap();
        let body = MethodBody::new(method, &code, &constants);
        let usage = mark(&class_graph, &body, UsageMarkerSettings::default());

        assert_eq!(usage.necessary_offsets().collect::<Vec<_>>(), vec![0, 4, 5]);
        assert!(!usage.is_instruction_necessary(3), "the stored value is never read");
        assert!(usage.is_stack_entry_unwanted_before(3, 0));
        assert!(usage.is_extra_push_pop_instruction_necessary(3));
        assert!(!usage.is_stack_entry_necessary_after(0, 0));
        assert!(usage.is_stack_entry_necessary_before(5, 0));

        // Without side effects, the call goes too
        let usage = mark(
            &class_graph,
            &body,
            UsageMarkerSettings {
                mark_external_side_effects: false,
                ..UsageMarkerSettings::default()
            },
        );
        assert_eq!(usage.necessary_offsets().collect::<Vec<_>>(), vec![4, 5]);
        assert!(!usage.is_extra_push_pop_instruction_necessary(3));
    }

    #[test]
    fn pops_of_kept_values_are_kept() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let method = static_method(&class_graph, java.lang.object, "test", "()V");
        let callee = static_method(&class_graph, java.lang.object, "next", "()J");

        let mut constants = ConstantPool::new();
        let next = constants.push(ConstantData::Method(MethodRef::resolved(callee)));

        // 0: invokestatic, 3: pop2, 4: return
        let code = Code::assemble(
            vec![Invoke(InvokeType::Static, next), Pop2, Return],
            vec![],
            2,
            0,
        )
        .unwrap();
        let body = MethodBody::new(method, &code, &constants);
        let usage = mark(&class_graph, &body, UsageMarkerSettings::default());
        assert!(usage.is_instruction_necessary(3));
        assert!(!usage.is_extra_push_pop_instruction_necessary(3));
    }

    #[test]
    fn unreachable_code_is_unnecessary() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let method = static_method(&class_graph, java.lang.object, "test", "()I");

        let code = Code::assemble(vec![IConst0, IReturn, IConst1, IReturn], vec![], 1, 0).unwrap();
        let constants = ConstantPool::new();
        let body = MethodBody::new(method, &code, &constants);
        let usage = mark(&class_graph, &body, UsageMarkerSettings::default());
        assert!(usage.is_instruction_necessary(1));
        assert!(!usage.is_traced(2));
        assert!(!usage.is_instruction_necessary(3));
    }
}
