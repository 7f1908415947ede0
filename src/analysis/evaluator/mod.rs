//! Forward abstract interpretation of one method body
//!
//! The evaluator walks the method from its entry, executing each instruction on abstract
//! values, and merges the states flowing into each instruction until nothing changes anymore.
//! Values crossing the method boundary are obtained from (and reported to) an
//! [`InvocationUnit`].
//!
//! Subroutines (`jsr`/`ret`) are evaluated context-insensitively: the states of every `jsr` to
//! the same subroutine are merged at its start, and every `ret` returns to all of the return
//! addresses its variable can hold.

mod execute;
mod trace;

pub use trace::*;

use super::frame::{Frame, Slot, Stack};
use super::invocation::{InvocationContext, InvocationUnit};
use super::value::{Nullability, Origin, ReferenceValue};
use super::{Error, EvaluationErrorKind, EvaluatorSettings, ValueFactory};
use crate::jvm::class_graph::{Assignable, ClassGraph, ClassRef};
use crate::jvm::code::{ExceptionHandler, MethodBody};
use crate::jvm::{MethodRef, RefType};
use crate::util::Width;
use log::{debug, error, trace};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

pub struct PartialEvaluator<'g, U> {
    settings: EvaluatorSettings,
    factory: ValueFactory<'g>,
    unit: U,
}

impl<'g, U: InvocationUnit<'g>> PartialEvaluator<'g, U> {
    pub fn new(
        settings: EvaluatorSettings,
        class_graph: &ClassGraph<'g>,
        unit: U,
    ) -> PartialEvaluator<'g, U> {
        let factory = ValueFactory::new(settings.precision, class_graph);
        PartialEvaluator {
            settings,
            factory,
            unit,
        }
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    pub fn factory(&self) -> &ValueFactory<'g> {
        &self.factory
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    pub fn unit_mut(&mut self) -> &mut U {
        &mut self.unit
    }

    pub fn into_unit(self) -> U {
        self.unit
    }

    /// Evaluate a method body until the states at every instruction stabilize
    ///
    /// The invocation unit is notified before the evaluation starts and after it ends, along
    /// with whether the evaluation completed.
    pub fn evaluate(&mut self, body: &MethodBody<'_, 'g>) -> Result<EvaluationTrace<'g>, Error> {
        debug!("Evaluating {}", body.name());
        self.unit.method_started(body);
        let result = self.evaluate_body(*body);
        self.unit.method_finished(body, result.is_ok());

        match &result {
            Ok(trace) => debug!(
                "Evaluated {} ({} evaluations, {} reachable instructions)",
                body.name(),
                trace.evaluations(),
                trace.len(),
            ),
            Err(err @ Error::Evaluation { .. }) => error!("Failed to evaluate: {:?}", err),
            Err(err) => debug!("Gave up on {}: {:?}", body.name(), err),
        }
        result
    }

    fn evaluate_body(&mut self, body: MethodBody<'_, 'g>) -> Result<EvaluationTrace<'g>, Error> {
        let code = body.code;
        let fail = |offset: usize, kind: EvaluationErrorKind| Error::Evaluation {
            method: body.name(),
            offset,
            kind,
        };

        if code.is_empty() {
            return Err(fail(0, EvaluationErrorKind::FallsOffEnd));
        }
        let entry = self.entry_frame(body).map_err(|kind| fail(0, kind))?;

        let mut trace = EvaluationTrace::default();
        let mut visits: BTreeMap<usize, u32> = BTreeMap::new();
        let mut subroutines: BTreeSet<usize> = BTreeSet::new();
        let mut worklist: Vec<(usize, Frame<'g>)> = vec![(0, entry)];

        while let Some((offset, incoming)) = worklist.pop() {
            let instruction = code
                .instruction_at(offset)
                .ok_or_else(|| fail(offset, EvaluationErrorKind::InvalidBranchTarget(offset)))?;

            // Merge into the state already recorded, stopping if nothing new comes in
            let visit_count = visits.entry(offset).or_insert(0);
            let before = match trace.entries.get(&offset) {
                None => incoming,
                Some(entry) => {
                    let widen = *visit_count >= self.settings.widening_threshold;
                    let merged = entry
                        .before
                        .generalize(&incoming, widen)
                        .map_err(|kind| fail(offset, kind))?;
                    if merged == entry.before {
                        continue;
                    }
                    merged
                }
            };
            *visit_count += 1;

            trace.evaluations += 1;
            if trace.evaluations > self.settings.maximum_evaluations {
                return Err(Error::ExcessiveComplexity {
                    method: body.name(),
                    evaluations: trace.evaluations,
                });
            }

            let effect = execute::execute(
                &self.settings,
                &self.factory,
                &mut self.unit,
                body,
                offset,
                instruction,
                &before,
            )
            .map_err(|kind| fail(offset, kind))?;
            trace!("{:>5}: {:?} -> {:?}", offset, instruction, effect.after.stack);

            for successor in &effect.successors {
                if *successor == code.len() {
                    return Err(fail(offset, EvaluationErrorKind::FallsOffEnd));
                } else if code.instruction_at(*successor).is_none() {
                    return Err(fail(
                        offset,
                        EvaluationErrorKind::InvalidBranchTarget(*successor),
                    ));
                }
            }

            let mut exception_handlers = BTreeSet::new();
            if self.settings.include_exception_handler_edges && effect.may_throw {
                let thrown = effect
                    .thrown
                    .as_ref()
                    .and_then(|thrown| thrown.ref_type.as_ref().map(|typ| (typ, thrown)));
                for handler in code.handlers_covering(offset) {
                    let (may_catch, must_catch) = match thrown {
                        None => (true, handler.catch_type.is_none()),
                        Some((thrown_type, thrown)) => catches(thrown_type, thrown, handler),
                    };
                    if may_catch {
                        exception_handlers.insert(handler.handler);
                        let mut stack = Stack::new();
                        stack.push(Slot::produced_by(
                            self.factory.caught_exception(handler.catch_type.as_ref()),
                            Origin::CaughtException(handler.handler),
                        ));
                        let handler_frame = Frame {
                            locals: before.locals.clone(),
                            stack,
                        };
                        worklist.push((handler.handler, handler_frame));
                    }
                    if must_catch {
                        break;
                    }
                }
            }

            for successor in &effect.successors {
                worklist.push((*successor, effect.after.clone()));
            }
            if let Some(subroutine) = effect.subroutine {
                subroutines.insert(subroutine);
            }

            let entry = TraceEntry {
                before,
                after: effect.after,
                subroutine_start: false,
                successors: effect.successors,
                exception_handlers,
                consumed: effect.consumed,
                produced: effect.produced,
            };
            match trace.entries.entry(offset) {
                Entry::Vacant(vacant) => {
                    vacant.insert(entry);
                }
                Entry::Occupied(mut occupied) => {
                    let previous = occupied.get_mut();
                    let mut entry = entry;
                    entry.successors.extend(previous.successors.iter().copied());
                    entry
                        .exception_handlers
                        .extend(previous.exception_handlers.iter().copied());
                    *previous = entry;
                }
            }
        }

        for subroutine in subroutines {
            if let Some(entry) = trace.entries.get_mut(&subroutine) {
                entry.subroutine_start = true;
            }
        }

        Ok(trace)
    }

    /// State on entry: parameters in the first local variables, and an empty stack
    fn entry_frame(&mut self, body: MethodBody<'_, 'g>) -> Result<Frame<'g>, EvaluationErrorKind> {
        let method = body.method;
        let has_this = !method.is_static();
        if method.descriptor.parameter_length(has_this) > body.code.max_locals as usize {
            return Err(EvaluationErrorKind::TooManyParameters);
        }

        let mut frame = Frame::new(body.code.max_locals);
        let method_ref = MethodRef::resolved(method);
        let context = InvocationContext {
            method,
            offset: None,
        };
        let parameter_count = method.descriptor.parameters.len() + usize::from(has_this);
        let mut local: u16 = 0;
        for parameter in 0..parameter_count {
            let parameter_type = method
                .parameter_type(parameter)
                .ok_or(EvaluationErrorKind::TooManyParameters)?;
            let value = if has_this && parameter == 0 && self.settings.evaluate_this_precisely {
                let class = ClassRef::resolved(method.class);
                let may_be_extension = !class.is_final();
                self.factory
                    .reference(RefType::Object(class), Nullability::NotNull, may_be_extension)
            } else {
                self.unit
                    .parameter_value(context, &method_ref, parameter, &parameter_type)
            };
            let value = if value.computational_type()
                == Some(execute::computational_type(&parameter_type))
            {
                value
            } else {
                self.factory.unknown(&parameter_type)
            };
            frame
                .locals
                .store(local, Slot::produced_by(value, Origin::Parameter(parameter)))?;
            local += parameter_type.width() as u16;
        }
        Ok(frame)
    }
}

/// Can the handler catch the exception thrown, and is it certain to catch it?
fn catches<'g>(
    thrown_type: &RefType<ClassRef<'g>>,
    thrown: &ReferenceValue<'g>,
    handler: &ExceptionHandler<'g>,
) -> (bool, bool) {
    let catch_type = match &handler.catch_type {
        None => return (true, true),
        Some(catch_type) => RefType::Object(catch_type.clone()),
    };
    if thrown_type.is_assignable(&catch_type) {
        (true, true)
    } else if catch_type.is_assignable(thrown_type) {
        (thrown.may_be_extension, false)
    } else {
        // Subclasses of an unresolved class could be caught by anything
        let resolved = match (thrown_type, &catch_type) {
            (RefType::Object(thrown), RefType::Object(caught)) => {
                thrown.is_resolved() && caught.is_resolved()
            }
            _ => true,
        };
        (!resolved, false)
    }
}
