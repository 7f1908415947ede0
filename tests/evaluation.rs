mod common;

use common::{basic_evaluator, init_logging, static_method};
use jvmopt::analysis::value::{
    DoubleValue, FloatValue, IntValue, LongValue, Nullability, Origin, ReferenceConstant,
    ReferenceValue, Value, ValueKind, MAX_ALTERNATIVES,
};
use jvmopt::analysis::{
    BasicInvocationUnit, Channel, EvaluatorSettings, Member, ParameterTracingInvocationUnit,
    PartialEvaluator, Precision, SideTable, StorageChannels, StoringInvocationUnit, ValueFactory,
};
use jvmopt::jvm::class_graph::{
    ClassData, ClassGraph, ClassGraphArenas, ClassRef, FieldData, MethodData,
};
use jvmopt::jvm::code::{
    Code, ExceptionHandler, Instruction::*, InvokeType, MethodBody, OrdComparison,
};
use jvmopt::jvm::{
    BinaryName, ClassAccessFlags, ConstantData, ConstantPool, FieldAccessFlags, FieldRef,
    FieldType, MethodAccessFlags, MethodRef, Name, RefType, UnqualifiedName,
};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::thread;

#[test]
fn null_dereference_goes_to_the_handler() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let method = static_method(&class_graph, java.lang.object, "length", "()I");
    let null_pointer_exception = class_graph.class_ref(BinaryName::NULLPOINTEREXCEPTION);

    // 0: aconst_null, 1: arraylength, 2: ireturn, 3: astore_0, 4: iconst_0, 5: ireturn
    let code = Code::assemble(
        vec![AConstNull, ArrayLength, IReturn, AStore(0), IConst0, IReturn],
        vec![ExceptionHandler {
            start: 0,
            end: 2,
            handler: 3,
            catch_type: Some(null_pointer_exception.clone()),
        }],
        1,
        1,
    )
    .unwrap();
    let constants = ConstantPool::new();
    let body = MethodBody::new(method, &code, &constants);

    let mut evaluator = basic_evaluator(&class_graph, EvaluatorSettings::default());
    let trace = evaluator.evaluate(&body).unwrap();

    assert!(!trace.is_traced(2), "`arraylength` on null always throws");
    assert!(trace.is_traced(3));
    assert!(trace.is_traced(5));

    let caught = trace.stack_top_before(3, 0).unwrap();
    assert_eq!(caught.producers.iter().collect::<Vec<_>>(), vec![&Origin::CaughtException(3)]);
    assert_eq!(
        caught.value.reference().ref_type,
        Some(RefType::Object(null_pointer_exception))
    );
    assert_eq!(trace.stack_before(3).unwrap().size(), 1);
}

#[test]
fn tracing_only_adds_provenance() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let method = static_method(&class_graph, java.lang.object, "clamp", "(IJ)J");

    // 0: iload_0, 1: ifge 6, 4: lconst_0, 5: lreturn, 6: lload_1, 7: lreturn
    let code = Code::assemble(
        vec![
            ILoad(0),
            If(OrdComparison::GE, 4),
            LConst0,
            LReturn,
            LLoad(1),
            LReturn,
        ],
        vec![],
        2,
        3,
    )
    .unwrap();
    let constants = ConstantPool::new();
    let body = MethodBody::new(method, &code, &constants);

    let settings = EvaluatorSettings::default();
    let mut plain = basic_evaluator(&class_graph, settings.clone());
    let factory = ValueFactory::new(settings.precision, &class_graph);
    let mut traced = PartialEvaluator::new(
        settings,
        &class_graph,
        ParameterTracingInvocationUnit::new(BasicInvocationUnit::new(factory)),
    );

    let plain = plain.evaluate(&body).unwrap();
    let traced = traced.evaluate(&body).unwrap();
    assert_eq!(
        plain.traced_offsets().collect::<Vec<_>>(),
        traced.traced_offsets().collect::<Vec<_>>()
    );
    for (offset, entry) in plain.iter() {
        let other = traced.entry(offset).unwrap();
        assert_eq!(entry.successors, other.successors);
        for (slot, other_slot) in entry.before.stack.iter().zip(other.before.stack.iter()) {
            assert_eq!(slot.value.untraced(), other_slot.value.untraced());
            assert_eq!(slot.producers, other_slot.producers);
        }
    }

    let long = traced.stack_top_before(7, 0).unwrap();
    assert_eq!(long.value.long(), LongValue::Unknown);
    assert_eq!(
        long.value.provenance().map(|origins| origins.iter().copied().collect::<Vec<_>>()),
        Some(vec![Origin::Parameter(1)])
    );
}

#[test]
fn side_table_generalizes_stores() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let field = class_graph.add_field(FieldData {
        class: java.lang.object,
        name: UnqualifiedName::from_str("limit").unwrap(),
        descriptor: FieldType::int(),
        access_flags: FieldAccessFlags::STATIC,
        retained: false,
    });
    let method = static_method(&class_graph, java.lang.object, "update", "()V");

    let mut constants = ConstantPool::new();
    let field_index = constants.push(ConstantData::Field(FieldRef::resolved(field)));

    // 0: iconst_3, 1: putstatic, 4: iconst_5, 5: putstatic, 8: return
    let code = Code::assemble(
        vec![
            IConst3,
            PutStatic(field_index),
            IConst5,
            PutStatic(field_index),
            Return,
        ],
        vec![],
        1,
        0,
    )
    .unwrap();
    let body = MethodBody::new(method, &code, &constants);

    let table = SideTable::new();
    let settings = EvaluatorSettings {
        precision: Precision::Particular,
        ..EvaluatorSettings::default()
    };
    let factory = ValueFactory::new(settings.precision, &class_graph);
    let unit = StoringInvocationUnit::new(
        BasicInvocationUnit::new(factory.clone()),
        &table,
        StorageChannels::default(),
        factory,
    );
    let mut evaluator = PartialEvaluator::new(settings, &class_graph, unit);
    evaluator.evaluate(&body).unwrap();

    let stored = table.get(Member::Field(field), Channel::FieldValue).unwrap();
    assert_eq!(stored.int(), IntValue::Range(3, 5));
    assert!(stored.is_specific());
    assert!(!stored.is_particular());
    assert_eq!(stored.provenance(), None);
}

fn storing_evaluator<'t, 'g>(
    class_graph: &ClassGraph<'g>,
    table: &'t SideTable<'g>,
    channels: StorageChannels,
) -> PartialEvaluator<'g, StoringInvocationUnit<'t, 'g, BasicInvocationUnit<'g>>> {
    let settings = EvaluatorSettings {
        precision: Precision::Particular,
        ..EvaluatorSettings::default()
    };
    let factory = ValueFactory::new(settings.precision, class_graph);
    let unit = StoringInvocationUnit::new(
        BasicInvocationUnit::new(factory.clone()),
        table,
        channels,
        factory,
    );
    PartialEvaluator::new(settings, class_graph, unit)
}

#[test]
fn side_table_generalizes_arguments() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let method = static_method(&class_graph, java.lang.object, "caller", "()V");
    let sink = static_method(&class_graph, java.lang.object, "sink", "(I)V");

    let mut constants = ConstantPool::new();
    let sink_index = constants.push(ConstantData::Method(MethodRef::resolved(sink)));

    // 0: iconst_3, 1: invokestatic, 4: iconst_5, 5: invokestatic, 8: return
    let code = Code::assemble(
        vec![
            IConst3,
            Invoke(InvokeType::Static, sink_index),
            IConst5,
            Invoke(InvokeType::Static, sink_index),
            Return,
        ],
        vec![],
        1,
        0,
    )
    .unwrap();
    let body = MethodBody::new(method, &code, &constants);

    let table = SideTable::new();
    let mut evaluator = storing_evaluator(&class_graph, &table, StorageChannels::default());
    evaluator.evaluate(&body).unwrap();

    let argument = table.get(Member::Method(sink), Channel::Parameter(0)).unwrap();
    assert_eq!(argument.int(), IntValue::Range(3, 5));
    assert!(argument.is_specific());
    assert!(!argument.is_particular());
    assert_eq!(table.get(Member::Method(sink), Channel::Parameter(1)), None);
}

#[test]
fn overridable_methods_are_not_read_back() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let shape = class_graph.add_class(ClassData::new(
        BinaryName::from_str("me/alec/Shape").unwrap(),
        java.lang.object,
        ClassAccessFlags::PUBLIC,
    ));
    let square = class_graph.add_class(ClassData::new(
        BinaryName::from_str("me/alec/Square").unwrap(),
        shape,
        ClassAccessFlags::PUBLIC,
    ));
    let instance_method = |class, name: &str, access_flags| {
        class_graph.add_method(MethodData {
            class,
            name: UnqualifiedName::from_str(name).unwrap(),
            descriptor: class_graph.parse_method_descriptor("()I").unwrap(),
            access_flags,
            retained: false,
        })
    };
    let shape_sides = instance_method(shape, "sides", MethodAccessFlags::PUBLIC);
    let square_sides = instance_method(square, "sides", MethodAccessFlags::PUBLIC);
    let shape_kind = instance_method(
        shape,
        "kind",
        MethodAccessFlags::PUBLIC | MethodAccessFlags::FINAL,
    );
    let caller = instance_method(shape, "describe", MethodAccessFlags::PUBLIC);

    let constants = ConstantPool::new();
    let returns = |value| Code::assemble(vec![value, IReturn], vec![], 1, 1).unwrap();
    let shape_sides_code = returns(IConst3);
    let square_sides_code = returns(IConst4);
    let shape_kind_code = returns(IConst3);

    let table = SideTable::new();
    let mut recording = storing_evaluator(&class_graph, &table, StorageChannels::default());
    for (method, code) in [
        (shape_sides, &shape_sides_code),
        (square_sides, &square_sides_code),
        (shape_kind, &shape_kind_code),
    ] {
        recording
            .evaluate(&MethodBody::new(method, code, &constants))
            .unwrap();
    }
    assert_eq!(table.get(Member::Method(shape_sides), Channel::ReturnValue), None);
    assert_eq!(table.get(Member::Method(square_sides), Channel::ReturnValue), None);
    assert_eq!(
        table.get(Member::Method(shape_kind), Channel::ReturnValue),
        Some(Value::from(IntValue::Particular(3)))
    );

    let mut reading = storing_evaluator(
        &class_graph,
        &table,
        StorageChannels {
            read_back: true,
            ..StorageChannels::default()
        },
    );
    let mut returned_by = |called| {
        let mut constants = ConstantPool::new();
        let index = constants.push(ConstantData::Method(MethodRef::resolved(called)));

        // 0: aload_0, 1: invokevirtual, 4: ireturn
        let code = Code::assemble(
            vec![ALoad(0), Invoke(InvokeType::Virtual, index), IReturn],
            vec![],
            1,
            1,
        )
        .unwrap();
        let trace = reading
            .evaluate(&MethodBody::new(caller, &code, &constants))
            .unwrap();
        trace.stack_top_before(4, 0).unwrap().value.clone()
    };

    let sides = returned_by(shape_sides);
    assert!(!sides.is_particular(), "a square has 4 sides: {:?}", sides);
    assert_eq!(returned_by(shape_kind).int(), IntValue::Particular(3));
}

#[test]
fn side_table_is_shared_between_threads() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let member = Member::Field(class_graph.add_field(FieldData {
        class: java.lang.object,
        name: UnqualifiedName::from_str("total").unwrap(),
        descriptor: FieldType::int(),
        access_flags: FieldAccessFlags::STATIC,
        retained: false,
    }));

    let table = SideTable::new();
    thread::scope(|scope| {
        for worker in 0..4 {
            let table = &table;
            scope.spawn(move || {
                for step in 0..25 {
                    let value = Value::from(IntValue::Particular(worker * 25 + step));
                    table.generalize(member, Channel::FieldValue, &value);
                }
            });
        }
    });

    assert_eq!(table.len(), 1);
    assert_eq!(
        table.get(member, Channel::FieldValue).map(|value| value.int()),
        Some(IntValue::Range(0, 99))
    );
}

#[test]
fn generalization_is_a_join() {
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let typ = |class| RefType::Object(ClassRef::resolved(class));
    let missing = |name: &str| {
        RefType::Object(ClassRef::unresolved(
            BinaryName::from_string(format!("org/lib/{}", name)).unwrap(),
        ))
    };
    let string = |contents: &'static str| ReferenceValue {
        ref_type: Some(typ(java.lang.string)),
        nullability: Nullability::NotNull,
        may_be_extension: false,
        alternatives: None,
        constant: Some(ReferenceConstant::String(Cow::Borrowed(contents))),
    };
    let many_types: BTreeSet<_> = (0..MAX_ALTERNATIVES)
        .map(|i| missing(&format!("Type{}", i)))
        .collect();

    let integer = ReferenceValue {
        ref_type: Some(typ(java.lang.integer)),
        nullability: Nullability::NotNull,
        may_be_extension: false,
        alternatives: Some(BTreeSet::from([typ(java.lang.integer)])),
        constant: None,
    };

    let references = vec![
        ReferenceValue::null(),
        ReferenceValue::unknown(),
        string("a"),
        string("b"),
        integer.clone(),
        ReferenceValue {
            ref_type: Some(typ(java.lang.number)),
            nullability: Nullability::Maybe,
            may_be_extension: true,
            alternatives: Some(BTreeSet::from([typ(java.lang.number)])),
            constant: None,
        },
        ReferenceValue {
            ref_type: Some(typ(java.lang.object)),
            nullability: Nullability::NotNull,
            may_be_extension: false,
            alternatives: None,
            constant: None,
        },
        ReferenceValue {
            ref_type: Some(missing("Plugin")),
            nullability: Nullability::Maybe,
            may_be_extension: true,
            alternatives: None,
            constant: None,
        },
        ReferenceValue {
            ref_type: Some(typ(java.lang.object)),
            nullability: Nullability::Maybe,
            may_be_extension: true,
            alternatives: Some(many_types),
            constant: None,
        },
    ];

    let mut values: Vec<Value> = vec![
        Value::unreachable(),
        Value::top(),
        Value::from(IntValue::Particular(1)),
        Value::from(IntValue::Particular(-4)),
        Value::from(IntValue::Range(0, 10)),
        Value::from(IntValue::Unknown),
        Value::from(LongValue::Particular(1)),
        Value::from(LongValue::Range(-3, 3)),
        Value::from(FloatValue::from_float(1.5)),
        Value::from(FloatValue::Unknown),
        Value::from(DoubleValue::from_float(-0.0)),
        Value::from(DoubleValue::from_float(2.0)),
        Value::new(ValueKind::ReturnAddress(BTreeSet::from([4]))),
        Value::new(ValueKind::ReturnAddress(BTreeSet::from([7, 9]))),
    ];
    values.extend(references.into_iter().map(Value::from));

    for a in &values {
        assert_eq!(&a.generalize(a), a, "{:?} is idempotent", a);
        for b in &values {
            let ab = a.generalize(b);
            assert_eq!(ab, b.generalize(a), "{:?} and {:?} commute", a, b);
            assert_eq!(ab.generalize(a), ab, "{:?} covers {:?}", ab, a);
            assert_eq!(ab.generalize(b), ab, "{:?} covers {:?}", ab, b);
            for c in &values {
                assert_eq!(
                    ab.generalize(c),
                    a.generalize(&b.generalize(c)),
                    "associativity of {:?}, {:?}, {:?}",
                    a,
                    b,
                    c
                );
            }
        }
    }

    // Joining a string constant with a different type forgets the contents
    let joined = Value::from(string("a")).generalize(&Value::from(integer));
    assert_eq!(joined.reference().constant, None);
    assert_eq!(
        joined.reference().ref_type,
        Some(typ(java.lang.object)),
        "strings and integers only share `java/lang/Object`"
    );
}
