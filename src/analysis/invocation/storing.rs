use super::{InvocationContext, InvocationUnit};
use crate::analysis::value::Value;
use crate::analysis::{StorageChannels, ValueFactory};
use crate::jvm::class_graph::{ClassRef, FieldId, MethodId};
use crate::jvm::code::{Instruction, MethodBody};
use crate::jvm::{ConstantData, FieldRef, FieldType, MethodRef};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

/// Field or method whose values get recorded
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Member<'g> {
    Field(FieldId<'g>),
    Method(MethodId<'g>),
}

/// Which value of a member is being recorded
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Channel {
    FieldValue,

    /// Parameter by index (`this` is 0 for instance methods)
    Parameter(usize),
    ReturnValue,
}

/// Generalization of every value observed for each member, across all evaluated methods
///
/// The table is owned by whatever drives the analyses and can be shared between threads
/// evaluating different methods. Entries only ever get more general. Writers to the same entry
/// are serialized by the map's per-shard locking.
#[derive(Debug, Default)]
pub struct SideTable<'g> {
    entries: DashMap<(Member<'g>, Channel), Value<'g>>,
}

impl<'g> SideTable<'g> {
    pub fn new() -> SideTable<'g> {
        SideTable::default()
    }

    /// Generalize the entry with the value (creating the entry if there is none)
    pub fn generalize(&self, member: Member<'g>, channel: Channel, value: &Value<'g>) {
        let value = value.untraced();
        match self.entries.entry((member, channel)) {
            Entry::Occupied(mut occupied) => {
                let generalized = occupied.get().generalize(&value);
                if &generalized != occupied.get() {
                    occupied.insert(generalized);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
        }
    }

    pub fn get(&self, member: Member<'g>, channel: Channel) -> Option<Value<'g>> {
        self.entries
            .get(&(member, channel))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Invocation unit that records field values, arguments, and return values into a side table
///
/// Values observed while evaluating a method are only committed to the table once the
/// evaluation completes. If it gets aborted, every entry the method could have written to is
/// generalized to an unknown value of the declared type instead. Members which are retained (or
/// unresolved) are never recorded, since code outside the analysis can access them. Neither are
/// methods that could be overridden.
pub struct StoringInvocationUnit<'t, 'g, U> {
    delegate: U,
    table: &'t SideTable<'g>,
    channels: StorageChannels,
    factory: ValueFactory<'g>,
    pending: Vec<(Member<'g>, Channel, Value<'g>)>,
}

impl<'t, 'g, U: InvocationUnit<'g>> StoringInvocationUnit<'t, 'g, U> {
    pub fn new(
        delegate: U,
        table: &'t SideTable<'g>,
        channels: StorageChannels,
        factory: ValueFactory<'g>,
    ) -> StoringInvocationUnit<'t, 'g, U> {
        StoringInvocationUnit {
            delegate,
            table,
            channels,
            factory,
            pending: vec![],
        }
    }

    pub fn delegate(&self) -> &U {
        &self.delegate
    }

    pub fn into_inner(self) -> U {
        self.delegate
    }

    pub fn table(&self) -> &'t SideTable<'g> {
        self.table
    }

    fn field_member(field: &FieldRef<'g>) -> Option<Member<'g>> {
        field
            .field
            .filter(|_| !field.is_retained())
            .map(Member::Field)
    }

    /// Calls to overridable methods may dispatch to an override, so those aren't recorded
    fn method_member(method: &MethodRef<'g>) -> Option<Member<'g>> {
        method
            .method
            .filter(|resolved| !method.is_retained() && !resolved.is_overridable())
            .map(Member::Method)
    }

    fn record(&mut self, member: Option<Member<'g>>, channel: Channel, value: &Value<'g>) {
        if let Some(member) = member {
            self.pending.push((member, channel, value.untraced()));
        }
    }

    fn read_back(&self, member: Option<Member<'g>>, channel: Channel) -> Option<Value<'g>> {
        if !self.channels.read_back {
            return None;
        }
        self.table.get(member?, channel)
    }

    /// Generalize every entry the method body could write to into an unknown value
    fn give_up_on(&self, body: &MethodBody<'_, 'g>) {
        for (_, instruction) in body.code.iter() {
            match instruction {
                Instruction::PutField(index) | Instruction::PutStatic(index)
                    if self.channels.fields =>
                {
                    if let Some(ConstantData::Field(field)) = body.constants.get(*index) {
                        if let Some(member) = Self::field_member(field) {
                            let unknown = self.factory.unknown(&field.descriptor);
                            self.table.generalize(member, Channel::FieldValue, &unknown);
                        }
                    }
                }
                Instruction::Invoke(_, index) if self.channels.parameters => {
                    if let Some(ConstantData::Method(method)) = body.constants.get(*index) {
                        if let (Some(member), Some(method)) =
                            (Self::method_member(method), method.method)
                        {
                            let count = method.descriptor.parameters.len()
                                + usize::from(!method.is_static());
                            for parameter in 0..count {
                                if let Some(parameter_type) = method.parameter_type(parameter) {
                                    let unknown = self.factory.unknown(&parameter_type);
                                    let channel = Channel::Parameter(parameter);
                                    self.table.generalize(member, channel, &unknown);
                                }
                            }
                        }
                    }
                }
                _ => (),
            }
        }

        let own_method = MethodRef::resolved(body.method);
        if let (true, Some(member), Some(return_type)) = (
            self.channels.return_values,
            Self::method_member(&own_method),
            &body.method.descriptor.return_type,
        ) {
            let unknown = self.factory.unknown(return_type);
            self.table
                .generalize(member, Channel::ReturnValue, &unknown);
        }
    }
}

impl<'t, 'g, U: InvocationUnit<'g>> InvocationUnit<'g> for StoringInvocationUnit<'t, 'g, U> {
    fn field_value(&mut self, context: InvocationContext<'g>, field: &FieldRef<'g>) -> Value<'g> {
        let value = self.delegate.field_value(context, field);
        if !self.channels.fields {
            return value;
        }
        match self.read_back(Self::field_member(field), Channel::FieldValue) {
            // Fields can always be read before any write, so include the initial value
            Some(stored) => stored.generalize(&self.factory.default_value(&field.descriptor)),
            None => value,
        }
    }

    fn set_field_value(
        &mut self,
        context: InvocationContext<'g>,
        field: &FieldRef<'g>,
        value: &Value<'g>,
    ) {
        self.delegate.set_field_value(context, field, value);
        if self.channels.fields {
            self.record(Self::field_member(field), Channel::FieldValue, value);
        }
    }

    fn parameter_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        index: usize,
        parameter_type: &FieldType<ClassRef<'g>>,
    ) -> Value<'g> {
        let value = self
            .delegate
            .parameter_value(context, method, index, parameter_type);
        if !self.channels.parameters {
            return value;
        }
        self.read_back(Self::method_member(method), Channel::Parameter(index))
            .unwrap_or(value)
    }

    fn set_parameter_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        index: usize,
        value: &Value<'g>,
    ) {
        self.delegate
            .set_parameter_value(context, method, index, value);
        if self.channels.parameters {
            self.record(Self::method_member(method), Channel::Parameter(index), value);
        }
    }

    fn return_value(&mut self, context: InvocationContext<'g>, method: &MethodRef<'g>) -> Value<'g> {
        let value = self.delegate.return_value(context, method);
        if !self.channels.return_values {
            return value;
        }
        self.read_back(Self::method_member(method), Channel::ReturnValue)
            .unwrap_or(value)
    }

    fn set_return_value(
        &mut self,
        context: InvocationContext<'g>,
        method: &MethodRef<'g>,
        value: &Value<'g>,
    ) {
        self.delegate.set_return_value(context, method, value);
        if self.channels.return_values {
            self.record(Self::method_member(method), Channel::ReturnValue, value);
        }
    }

    fn method_started(&mut self, body: &MethodBody<'_, 'g>) {
        self.pending.clear();
        self.delegate.method_started(body);
    }

    fn method_finished(&mut self, body: &MethodBody<'_, 'g>, completed: bool) {
        self.delegate.method_finished(body, completed);
        let pending = std::mem::take(&mut self.pending);
        if completed {
            for (member, channel, value) in &pending {
                self.table.generalize(*member, *channel, value);
            }
        } else {
            debug!(
                "Discarding {} recorded values from {}",
                pending.len(),
                body.name()
            );
            self.give_up_on(body);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::value::IntValue;
    use crate::analysis::{BasicInvocationUnit, Precision};
    use crate::jvm::class_graph::{ClassData, ClassGraph, ClassGraphArenas, FieldData};
    use crate::jvm::code::Code;
    use crate::jvm::{
        BinaryName, ClassAccessFlags, ConstantPool, FieldAccessFlags, Name, UnqualifiedName,
    };

    #[test]
    fn table_entries_only_grow() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let table = SideTable::new();
        let java = class_graph.insert_java_library_types();
        let field = class_graph.add_field(FieldData {
            class: java.lang.object,
            name: UnqualifiedName::from_str("count").unwrap(),
            descriptor: FieldType::int(),
            access_flags: FieldAccessFlags::STATIC,
            retained: false,
        });
        let member = Member::Field(field);

        assert!(table.is_empty());
        table.generalize(member, Channel::FieldValue, &Value::from(IntValue::Particular(2)));
        table.generalize(member, Channel::FieldValue, &Value::from(IntValue::Particular(7)));
        table.generalize(member, Channel::FieldValue, &Value::from(IntValue::Particular(4)));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(member, Channel::FieldValue),
            Some(Value::from(IntValue::Range(2, 7)))
        );
        assert_eq!(table.get(member, Channel::ReturnValue), None);
    }

    #[test]
    fn retained_fields_are_skipped() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let table = SideTable::new();
        let java = class_graph.insert_java_library_types();
        let class = class_graph.add_class(ClassData::new(
            BinaryName::from_str("me/alec/Counter").unwrap(),
            java.lang.object,
            ClassAccessFlags::PUBLIC,
        ));
        let add_field = |name: &str, retained: bool| {
            FieldRef::resolved(class_graph.add_field(FieldData {
                class,
                name: UnqualifiedName::from_str(name).unwrap(),
                descriptor: FieldType::int(),
                access_flags: FieldAccessFlags::STATIC,
                retained,
            }))
        };
        let internal = add_field("internal", false);
        let exported = add_field("exported", true);

        let method = class_graph.add_method(crate::jvm::class_graph::MethodData {
            class,
            name: UnqualifiedName::CLINIT,
            descriptor: class_graph.parse_method_descriptor("()V").unwrap(),
            access_flags: crate::jvm::MethodAccessFlags::STATIC,
            retained: false,
        });
        let code = Code::assemble(vec![Instruction::Return], vec![], 0, 0).unwrap();
        let constants = ConstantPool::new();
        let body = MethodBody::new(method, &code, &constants);
        let context = InvocationContext {
            method,
            offset: Some(0),
        };

        let factory = ValueFactory::new(Precision::Particular, &class_graph);
        let basic = BasicInvocationUnit::new(factory.clone());
        let mut unit = StoringInvocationUnit::new(basic, &table, StorageChannels::default(), factory);
        unit.method_started(&body);
        unit.set_field_value(context, &internal, &Value::from(IntValue::Particular(1)));
        unit.set_field_value(context, &exported, &Value::from(IntValue::Particular(1)));
        assert!(table.is_empty(), "nothing is committed before the method finishes");
        unit.method_finished(&body, true);

        assert_eq!(table.len(), 1);
        let internal_member = internal.field.map(Member::Field).unwrap();
        assert_eq!(
            table.get(internal_member, Channel::FieldValue),
            Some(Value::from(IntValue::Particular(1)))
        );
    }
}
