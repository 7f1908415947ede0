use super::value::*;
use crate::jvm::class_graph::{ClassGraph, ClassRef};
use crate::jvm::{BaseType, BinaryName, FieldType, RefType};
use std::borrow::Cow;
use std::collections::BTreeSet;

/// How much information values carry
///
/// Each level includes everything the previous levels track.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Precision {
    /// Only computational types
    Basic,

    /// Reference types and nullability
    Typed,

    /// Constants and integer ranges
    Particular,

    /// Sets of possible reference types
    MultiTyped,
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Particular
    }
}

/// Constructor for all values, limited to a given precision
#[derive(Clone, Debug)]
pub struct ValueFactory<'g> {
    precision: Precision,
    string: ClassRef<'g>,
    class: ClassRef<'g>,
    throwable: ClassRef<'g>,
    method_handle: ClassRef<'g>,
    method_type: ClassRef<'g>,
}

impl<'g> ValueFactory<'g> {
    pub fn new(precision: Precision, class_graph: &ClassGraph<'g>) -> ValueFactory<'g> {
        ValueFactory {
            precision,
            string: class_graph.class_ref(BinaryName::STRING),
            class: class_graph.class_ref(BinaryName::CLASS),
            throwable: class_graph.class_ref(BinaryName::THROWABLE),
            method_handle: class_graph.class_ref(BinaryName::METHODHANDLE),
            method_type: class_graph.class_ref(BinaryName::METHODTYPE),
        }
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Some value of the given type
    pub fn unknown(&self, field_type: &FieldType<ClassRef<'g>>) -> Value<'g> {
        match field_type {
            FieldType::Base(BaseType::Int) => Value::from(IntValue::Unknown),
            FieldType::Base(BaseType::Boolean) => self.integer_range(0, 1),
            FieldType::Base(BaseType::Byte) => self.integer_range(i8::MIN as i32, i8::MAX as i32),
            FieldType::Base(BaseType::Char) => self.integer_range(0, u16::MAX as i32),
            FieldType::Base(BaseType::Short) => {
                self.integer_range(i16::MIN as i32, i16::MAX as i32)
            }
            FieldType::Base(BaseType::Long) => Value::from(LongValue::Unknown),
            FieldType::Base(BaseType::Float) => Value::from(FloatValue::Unknown),
            FieldType::Base(BaseType::Double) => Value::from(DoubleValue::Unknown),
            FieldType::Ref(ref_type) => self.unknown_reference(ref_type),
        }
    }

    /// Initial value of a field of the given type
    pub fn default_value(&self, field_type: &FieldType<ClassRef<'g>>) -> Value<'g> {
        match field_type {
            FieldType::Base(BaseType::Long) => self.long(0),
            FieldType::Base(BaseType::Float) => self.float(0.0),
            FieldType::Base(BaseType::Double) => self.double(0.0),
            FieldType::Base(_) => self.integer(0),
            FieldType::Ref(_) => self.null(),
        }
    }

    /// Some reference of the given type (possibly `null`)
    pub fn unknown_reference(&self, ref_type: &RefType<ClassRef<'g>>) -> Value<'g> {
        let may_be_extension = match ref_type {
            RefType::Object(class) => !class.is_final(),
            RefType::ObjectArray(array) => !array.element_type.is_final(),
            RefType::PrimitiveArray(_) => false,
        };
        self.reference(ref_type.clone(), Nullability::Maybe, may_be_extension)
    }

    /// Some reference about which nothing is known
    pub fn unknown_object(&self) -> Value<'g> {
        Value::from(ReferenceValue::unknown())
    }

    pub fn integer(&self, value: i32) -> Value<'g> {
        self.limit(Value::from(IntValue::Particular(value)))
    }

    pub fn integer_range(&self, min: i32, max: i32) -> Value<'g> {
        self.limit(Value::from(IntValue::range(min, max)))
    }

    pub fn long(&self, value: i64) -> Value<'g> {
        self.limit(Value::from(LongValue::Particular(value)))
    }

    pub fn float(&self, value: f32) -> Value<'g> {
        self.limit(Value::from(FloatValue::from_float(value)))
    }

    pub fn double(&self, value: f64) -> Value<'g> {
        self.limit(Value::from(DoubleValue::from_float(value)))
    }

    pub fn null(&self) -> Value<'g> {
        self.limit(Value::from(ReferenceValue::null()))
    }

    /// Freshly allocated object or array, whose type is known exactly
    pub fn new_instance(&self, ref_type: RefType<ClassRef<'g>>) -> Value<'g> {
        self.reference(ref_type, Nullability::NotNull, false)
    }

    pub fn reference(
        &self,
        ref_type: RefType<ClassRef<'g>>,
        nullability: Nullability,
        may_be_extension: bool,
    ) -> Value<'g> {
        let alternatives = if self.precision >= Precision::MultiTyped {
            Some(BTreeSet::from([ref_type.clone()]))
        } else {
            None
        };
        self.limit(Value::from(ReferenceValue {
            ref_type: Some(ref_type),
            nullability,
            may_be_extension,
            alternatives,
            constant: None,
        }))
    }

    fn constant(&self, class: &ClassRef<'g>, constant: ReferenceConstant<'g>) -> Value<'g> {
        let Value { kind, provenance } =
            self.reference(RefType::Object(class.clone()), Nullability::NotNull, false);
        let kind = match kind {
            ValueKind::Reference(reference) if self.precision >= Precision::Particular => {
                ValueKind::Reference(ReferenceValue {
                    constant: Some(constant),
                    ..reference
                })
            }
            other => other,
        };
        Value { kind, provenance }
    }

    /// String literal
    pub fn string(&self, value: Cow<'static, str>) -> Value<'g> {
        self.constant(&self.string, ReferenceConstant::String(value))
    }

    /// Class literal
    pub fn class_literal(&self, ref_type: RefType<ClassRef<'g>>) -> Value<'g> {
        self.constant(&self.class, ReferenceConstant::Class(ref_type))
    }

    pub fn method_handle(&self) -> Value<'g> {
        self.reference(
            RefType::Object(self.method_handle.clone()),
            Nullability::NotNull,
            true,
        )
    }

    pub fn method_type(&self) -> Value<'g> {
        self.reference(
            RefType::Object(self.method_type.clone()),
            Nullability::NotNull,
            false,
        )
    }

    /// Exception caught by a handler (`None` catches any `Throwable`)
    pub fn caught_exception(&self, catch_type: Option<&ClassRef<'g>>) -> Value<'g> {
        let class = catch_type.unwrap_or(&self.throwable).clone();
        self.reference(RefType::Object(class), Nullability::NotNull, true)
    }

    pub fn return_address(&self, offset: usize) -> Value<'g> {
        Value::new(ValueKind::ReturnAddress(BTreeSet::from([offset])))
    }

    /// Drop whatever the precision doesn't allow for
    pub fn limit(&self, value: Value<'g>) -> Value<'g> {
        let Value { kind, provenance } = value;
        let particular = self.precision >= Precision::Particular;
        let kind = match kind {
            ValueKind::Integer(_) if !particular => ValueKind::Integer(IntegerValue::Unknown),
            ValueKind::Long(_) if !particular => ValueKind::Long(IntegerValue::Unknown),
            ValueKind::Float(_) if !particular => ValueKind::Float(FloatingValue::Unknown),
            ValueKind::Double(_) if !particular => ValueKind::Double(FloatingValue::Unknown),
            ValueKind::Reference(mut reference) => {
                if !particular {
                    reference.constant = None;
                }
                if self.precision < Precision::Typed {
                    reference = ReferenceValue::unknown();
                }
                if self.precision < Precision::MultiTyped {
                    reference.alternatives = None;
                }
                ValueKind::Reference(reference)
            }
            other => other,
        };
        Value { kind, provenance }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassGraphArenas;

    #[test]
    fn unknowns_of_small_types_are_ranges() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        class_graph.insert_java_library_types();

        let factory = ValueFactory::new(Precision::Particular, &class_graph);
        assert_eq!(factory.unknown(&FieldType::boolean()).int(), IntValue::Range(0, 1));
        assert_eq!(factory.unknown(&FieldType::char()).int(), IntValue::Range(0, 0xffff));
        assert_eq!(factory.unknown(&FieldType::int()).int(), IntValue::Unknown);

        let basic = ValueFactory::new(Precision::Basic, &class_graph);
        assert_eq!(basic.unknown(&FieldType::boolean()).int(), IntValue::Unknown);
        assert_eq!(basic.integer(3).int(), IntValue::Unknown);
    }

    #[test]
    fn references_by_precision() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let number = RefType::Object(ClassRef::resolved(java.lang.number));

        let typed = ValueFactory::new(Precision::Typed, &class_graph);
        let value = typed.new_instance(number.clone()).reference();
        assert_eq!(value.ref_type, Some(number.clone()));
        assert_eq!(value.nullability, Nullability::NotNull);
        assert_eq!(value.alternatives, None);
        assert_eq!(typed.string(Cow::Borrowed("hi")).reference().constant, None);

        let multi = ValueFactory::new(Precision::MultiTyped, &class_graph);
        let value = multi.new_instance(number.clone()).reference();
        assert_eq!(value.alternatives, Some(BTreeSet::from([number.clone()])));
        assert!(multi.string(Cow::Borrowed("hi")).is_particular());

        let basic = ValueFactory::new(Precision::Basic, &class_graph);
        assert_eq!(basic.new_instance(number).reference(), ReferenceValue::unknown());
        assert!(!basic.null().is_specific());
    }

    #[test]
    fn array_extension() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types();
        let factory = ValueFactory::new(Precision::Particular, &class_graph);

        let ints = factory.unknown_reference(&RefType::array(FieldType::int()));
        assert!(!ints.reference().may_be_extension);

        let strings = RefType::array(FieldType::object(ClassRef::resolved(java.lang.string)));
        assert!(!factory.unknown_reference(&strings).reference().may_be_extension);

        let numbers = RefType::array(FieldType::object(ClassRef::resolved(java.lang.number)));
        assert!(factory.unknown_reference(&numbers).reference().may_be_extension);

        let exception = factory.caught_exception(None).reference();
        assert_eq!(
            exception.ref_type,
            Some(RefType::Object(ClassRef::resolved(java.lang.throwable)))
        );
        assert_eq!(exception.nullability, Nullability::NotNull);
    }
}
