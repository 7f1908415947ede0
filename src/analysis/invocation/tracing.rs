use super::{InvocationContext, InvocationUnit};
use crate::analysis::value::{Origin, Value};
use crate::jvm::class_graph::ClassRef;
use crate::jvm::code::MethodBody;
use crate::jvm::{FieldRef, FieldType, MethodRef};

/// Invocation unit that attaches provenance to every value entering the method
///
/// Parameters on entry are traced to their parameter index. Field reads, return values of
/// calls, and arguments seen at call sites are traced to the instruction that produced them.
/// Everything else about the values is left to the delegate.
pub struct ParameterTracingInvocationUnit<U> {
    delegate: U,
}

impl<U> ParameterTracingInvocationUnit<U> {
    pub fn new(delegate: U) -> ParameterTracingInvocationUnit<U> {
        ParameterTracingInvocationUnit { delegate }
    }

    pub fn delegate(&self) -> &U {
        &self.delegate
    }

    pub fn into_inner(self) -> U {
        self.delegate
    }
}

fn origin(context: &InvocationContext<'_>, parameter: usize) -> Origin {
    match context.offset {
        Some(offset) => Origin::Instruction(offset),
        None => Origin::Parameter(parameter),
    }
}

impl<'g, U: InvocationUnit<'g>> InvocationUnit<'g> for ParameterTracingInvocationUnit<U> {
    fn field_value(&mut self, context: InvocationContext<'g>, field: &FieldRef<'g>) -> Value<'g> {
        let value = self.delegate.field_value(context, field);
        match context.offset {
            Some(offset) => value.traced(Origin::Instruction(offset)),
            None => value,
        }
    }

    fn set_field_value(
        &mut self,
        context: InvocationContext<'g>,
        field: &FieldRef<'g>,
        value: &Value<'g>,
    ) {
        self.delegate.set_field_value(context, field, value)
    }

    fn parameter_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        index: usize,
        parameter_type: &FieldType<ClassRef<'g>>,
    ) -> Value<'g> {
        self.delegate
            .parameter_value(context, method, index, parameter_type)
            .traced(origin(&context, index))
    }

    fn set_parameter_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        index: usize,
        value: &Value<'g>,
    ) {
        self.delegate
            .set_parameter_value(context, method, index, value)
    }

    fn return_value(&mut self, context: InvocationContext<'g>, method: &MethodRef<'g>) -> Value<'g> {
        let value = self.delegate.return_value(context, method);
        match context.offset {
            Some(offset) => value.traced(Origin::Instruction(offset)),
            None => value,
        }
    }

    fn set_return_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        value: &Value<'g>,
    ) {
        self.delegate.set_return_value(context, method, value)
    }

    fn method_started(&mut self, body: &MethodBody<'_, 'g>) {
        self.delegate.method_started(body)
    }

    fn method_finished(&mut self, body: &MethodBody<'_, 'g>, completed: bool) {
        self.delegate.method_finished(body, completed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::value::{Origins, ValueKind};
    use crate::analysis::{BasicInvocationUnit, Precision, ValueFactory};
    use crate::jvm::class_graph::{ClassGraph, ClassGraphArenas, MethodData};
    use crate::jvm::{MethodAccessFlags, Name, UnqualifiedName};

    #[test]
    fn parameters_are_traced_to_their_index() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let method = class_graph.add_method(MethodData {
            class: java.lang.object,
            name: UnqualifiedName::from_str("sum").unwrap(),
            descriptor: class_graph.parse_method_descriptor("(IJ)J").unwrap(),
            access_flags: MethodAccessFlags::STATIC,
            retained: false,
        });
        let method_ref = MethodRef::resolved(method);

        let factory = ValueFactory::new(Precision::Particular, &class_graph);
        let mut basic = BasicInvocationUnit::new(factory.clone());
        let mut tracing = ParameterTracingInvocationUnit::new(BasicInvocationUnit::new(factory));

        let entry = InvocationContext {
            method,
            offset: None,
        };
        let long_type = FieldType::long();
        let plain = basic.parameter_value(entry, &method_ref, 1, &long_type);
        let traced = tracing.parameter_value(entry, &method_ref, 1, &long_type);
        assert_eq!(traced.kind, plain.kind);
        assert_eq!(traced.untraced(), plain);
        assert_eq!(traced.provenance(), Some(&Origins::from([Origin::Parameter(1)])));

        let call_site = InvocationContext {
            method,
            offset: Some(12),
        };
        let returned = tracing.return_value(call_site, &method_ref);
        assert!(matches!(returned.kind, ValueKind::Long(_)));
        assert_eq!(
            returned.provenance(),
            Some(&Origins::from([Origin::Instruction(12)]))
        );
    }
}
