use super::{InvocationContext, InvocationUnit};
use crate::analysis::value::Value;
use crate::analysis::ValueFactory;
use crate::jvm::class_graph::ClassRef;
use crate::jvm::{FieldRef, FieldType, MethodRef};

/// Invocation unit that knows nothing beyond declared types
pub struct BasicInvocationUnit<'g> {
    factory: ValueFactory<'g>,
}

impl<'g> BasicInvocationUnit<'g> {
    pub fn new(factory: ValueFactory<'g>) -> BasicInvocationUnit<'g> {
        BasicInvocationUnit { factory }
    }

    pub fn factory(&self) -> &ValueFactory<'g> {
        &self.factory
    }
}

impl<'g> InvocationUnit<'g> for BasicInvocationUnit<'g> {
    fn field_value(&mut self, _context: InvocationContext<'g>, field: &FieldRef<'g>) -> Value<'g> {
        self.factory.unknown(&field.descriptor)
    }

    fn set_field_value(&mut self, _: InvocationContext<'g>, _: &FieldRef<'g>, _: &Value<'g>) {}

    fn parameter_value(
        &mut self,
        _context: InvocationContext<'g>,
        _method: &MethodRef<'g>,
        _index: usize,
        parameter_type: &FieldType<ClassRef<'g>>,
    ) -> Value<'g> {
        self.factory.unknown(parameter_type)
    }

    fn set_parameter_value(
        &mut self,
        _: InvocationContext<'g>,
        _: &MethodRef<'g>,
        _: usize,
        _: &Value<'g>,
    ) {
    }

    fn return_value(&mut self, _context: InvocationContext<'g>, method: &MethodRef<'g>) -> Value<'g> {
        match &method.descriptor.return_type {
            Some(return_type) => self.factory.unknown(return_type),
            None => Value::top(),
        }
    }

    fn set_return_value(&mut self, _: InvocationContext<'g>, _: &MethodRef<'g>, _: &Value<'g>) {}
}
