//! Interprocedural policies of the partial evaluator
//!
//! Whenever the evaluator reads or writes a value that crosses the boundary of the method being
//! analysed (a field, an argument, or a return value), it asks its [`InvocationUnit`]. Units
//! compose by owning a delegate, so a tracing unit can wrap a storing unit which wraps a basic
//! unit.

mod basic;
mod storing;
mod tracing;

pub use basic::*;
pub use storing::*;
pub use tracing::*;

use super::value::Value;
use crate::jvm::class_graph::{ClassRef, MethodId};
use crate::jvm::code::MethodBody;
use crate::jvm::{FieldRef, FieldType, MethodRef};

/// Where in the program a query comes from
#[derive(Clone, Copy, Debug)]
pub struct InvocationContext<'g> {
    /// Method being evaluated
    pub method: MethodId<'g>,

    /// Offset of the instruction making the query, or `None` when seeding the method's own
    /// parameters on entry
    pub offset: Option<usize>,
}

pub trait InvocationUnit<'g> {
    /// Value read from a field by `getfield` or `getstatic`
    fn field_value(&mut self, context: InvocationContext<'g>, field: &FieldRef<'g>) -> Value<'g>;

    /// Value written to a field by `putfield` or `putstatic`
    fn set_field_value(
        &mut self,
        context: InvocationContext<'g>,
        field: &FieldRef<'g>,
        value: &Value<'g>,
    );

    /// Value of a parameter of the method, on entry
    ///
    /// The parameter index counts `this` (as 0) for instance methods, and counts wide
    /// parameters once.
    fn parameter_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        index: usize,
        parameter_type: &FieldType<ClassRef<'g>>,
    ) -> Value<'g>;

    /// Argument passed to a method at a call site
    fn set_parameter_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        index: usize,
        value: &Value<'g>,
    );

    /// Value returned by a call to a non-`void` method
    fn return_value(&mut self, context: InvocationContext<'g>, method: &MethodRef<'g>) -> Value<'g>;

    /// Value returned by the method being evaluated
    fn set_return_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        value: &Value<'g>,
    );

    /// Called before the evaluation of a method body starts
    fn method_started(&mut self, _body: &MethodBody<'_, 'g>) {}

    /// Called once the evaluation of a method body is over, whether or not it completed
    fn method_finished(&mut self, _body: &MethodBody<'_, 'g>, _completed: bool) {}
}
