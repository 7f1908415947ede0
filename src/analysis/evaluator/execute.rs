use crate::analysis::frame::{Frame, Slot};
use crate::analysis::invocation::{InvocationContext, InvocationUnit};
use crate::analysis::value::*;
use crate::analysis::{EvaluationErrorKind, EvaluatorSettings, ValueFactory};
use crate::jvm::class_graph::ClassRef;
use crate::jvm::code::{EqComparison, Instruction, InvokeType, MethodBody, OrdComparison};
use crate::jvm::{ConstantData, FieldRef, FieldType, MethodRef, RefType};
use crate::util::Width;
use std::collections::BTreeSet;

/// Outcome of abstractly executing one instruction
pub struct Effect<'g> {
    /// State right after the instruction completes normally
    pub after: Frame<'g>,

    /// Number of stack slots popped
    pub consumed: usize,

    /// Number of stack slots pushed
    pub produced: usize,

    /// Offsets where execution can continue normally
    pub successors: BTreeSet<usize>,

    /// Can the instruction transfer control to an exception handler?
    pub may_throw: bool,

    /// Exception explicitly thrown by `athrow`
    pub thrown: Option<ReferenceValue<'g>>,

    /// Start of the subroutine entered by a `jsr`
    pub subroutine: Option<usize>,
}

/// Abstract machine executing a single instruction on a copy of the frame before it
struct Machine<'a, 'g, U> {
    settings: &'a EvaluatorSettings,
    factory: &'a ValueFactory<'g>,
    unit: &'a mut U,
    body: MethodBody<'a, 'g>,
    offset: usize,
    next: usize,
    frame: Frame<'g>,
    consumed: usize,
    produced: usize,
    successors: BTreeSet<usize>,
    falls: bool,
    may_throw: bool,
    thrown: Option<ReferenceValue<'g>>,
    subroutine: Option<usize>,
}

/// Execute the instruction at the given offset
pub fn execute<'a, 'g, U: InvocationUnit<'g>>(
    settings: &'a EvaluatorSettings,
    factory: &'a ValueFactory<'g>,
    unit: &'a mut U,
    body: MethodBody<'a, 'g>,
    offset: usize,
    instruction: &Instruction,
    before: &Frame<'g>,
) -> Result<Effect<'g>, EvaluationErrorKind> {
    let next = body
        .code
        .next_offset(offset)
        .unwrap_or_else(|| body.code.len());
    let mut machine = Machine {
        settings,
        factory,
        unit,
        body,
        offset,
        next,
        frame: before.clone(),
        consumed: 0,
        produced: 0,
        successors: BTreeSet::new(),
        falls: instruction.falls_through(),
        may_throw: instruction.can_throw(),
        thrown: None,
        subroutine: None,
    };
    machine.step(instruction)?;
    if machine.falls {
        machine.successors.insert(next);
    }
    Ok(Effect {
        after: machine.frame,
        consumed: machine.consumed,
        produced: machine.produced,
        successors: machine.successors,
        may_throw: machine.may_throw,
        thrown: machine.thrown,
        subroutine: machine.subroutine,
    })
}

pub fn computational_type<C>(field_type: &FieldType<C>) -> ComputationalType {
    use crate::jvm::BaseType;
    match field_type {
        FieldType::Base(BaseType::Long) => ComputationalType::Long,
        FieldType::Base(BaseType::Float) => ComputationalType::Float,
        FieldType::Base(BaseType::Double) => ComputationalType::Double,
        FieldType::Base(_) => ComputationalType::Int,
        FieldType::Ref(_) => ComputationalType::Reference,
    }
}

impl<'a, 'g, U: InvocationUnit<'g>> Machine<'a, 'g, U> {
    fn context(&self) -> InvocationContext<'g> {
        InvocationContext {
            method: self.body.method,
            offset: Some(self.offset),
        }
    }

    fn constant(&self, index: u16) -> Result<&'a ConstantData<'g>, EvaluationErrorKind> {
        let constants = self.body.constants;
        constants
            .get(index)
            .ok_or(EvaluationErrorKind::MissingConstant(index))
    }

    fn field_ref(&self, index: u16) -> Result<&'a FieldRef<'g>, EvaluationErrorKind> {
        match self.constant(index)? {
            ConstantData::Field(field) => Ok(field),
            _ => Err(EvaluationErrorKind::InvalidConstant(index)),
        }
    }

    fn method_ref(&self, index: u16) -> Result<&'a MethodRef<'g>, EvaluationErrorKind> {
        match self.constant(index)? {
            ConstantData::Method(method) => Ok(method),
            _ => Err(EvaluationErrorKind::InvalidConstant(index)),
        }
    }

    fn class_ref(&self, index: u16) -> Result<&'a RefType<ClassRef<'g>>, EvaluationErrorKind> {
        match self.constant(index)? {
            ConstantData::Class(ref_type) => Ok(ref_type),
            _ => Err(EvaluationErrorKind::InvalidConstant(index)),
        }
    }

    fn unknown(&self, computational_type: ComputationalType) -> Value<'g> {
        match computational_type {
            ComputationalType::Int => Value::from(IntValue::Unknown),
            ComputationalType::Long => Value::from(LongValue::Unknown),
            ComputationalType::Float => Value::from(FloatValue::Unknown),
            ComputationalType::Double => Value::from(DoubleValue::Unknown),
            ComputationalType::Reference => self.factory.unknown_object(),
            ComputationalType::ReturnAddress => Value::top(),
        }
    }

    /// Replace values of the wrong type by an unknown of the expected type
    fn coerce(&self, value: Value<'g>, expected: ComputationalType) -> Value<'g> {
        if value.computational_type() == Some(expected) {
            value
        } else {
            self.unknown(expected)
        }
    }

    /// Pop one value of the given width
    fn pop(&mut self, width: usize) -> Result<Slot<'g>, EvaluationErrorKind> {
        let slot = self.frame.stack.pop1()?;
        if width == 2 {
            self.frame.stack.pop1()?;
        }
        self.consumed += width;
        Ok(slot)
    }

    fn pop1(&mut self) -> Result<Slot<'g>, EvaluationErrorKind> {
        self.pop(1)
    }

    fn pop_int(&mut self) -> Result<IntValue, EvaluationErrorKind> {
        Ok(self.pop(1)?.value.int())
    }

    fn pop_long(&mut self) -> Result<LongValue, EvaluationErrorKind> {
        Ok(self.pop(2)?.value.long())
    }

    fn pop_float(&mut self) -> Result<FloatValue, EvaluationErrorKind> {
        Ok(self.pop(1)?.value.float())
    }

    fn pop_double(&mut self) -> Result<DoubleValue, EvaluationErrorKind> {
        Ok(self.pop(2)?.value.double())
    }

    fn pop_reference(&mut self) -> Result<ReferenceValue<'g>, EvaluationErrorKind> {
        Ok(self.pop(1)?.value.reference())
    }

    fn push(&mut self, value: Value<'g>) {
        let value = self.factory.limit(value);
        self.produced += value.width();
        self.frame
            .stack
            .push(Slot::produced_by(value, Origin::Instruction(self.offset)));
    }

    fn push_typed(&mut self, value: Value<'g>, field_type: &FieldType<ClassRef<'g>>) {
        if value.computational_type() == Some(computational_type(field_type)) {
            self.push(value);
        } else {
            let unknown = self.factory.unknown(field_type);
            self.push(unknown);
        }
    }

    /// Push a copy of exactly one slot (for the `dup` family and `swap`)
    fn push1(&mut self, slot: &Slot<'g>) {
        self.produced += 1;
        self.frame.stack.push1(Slot::produced_by(
            slot.value.clone(),
            Origin::Instruction(self.offset),
        ));
    }

    fn load(&mut self, index: u16, expected: ComputationalType) -> Result<(), EvaluationErrorKind> {
        let value = self.frame.locals.load(index)?.value.clone();
        let value = self.coerce(value, expected);
        self.push(value);
        Ok(())
    }

    fn store(&mut self, index: u16, value: Value<'g>) -> Result<(), EvaluationErrorKind> {
        let slot = Slot::produced_by(self.factory.limit(value), Origin::Instruction(self.offset));
        self.frame.locals.store(index, slot)
    }

    fn pop_store(
        &mut self,
        index: u16,
        expected: ComputationalType,
    ) -> Result<(), EvaluationErrorKind> {
        let width = if matches!(expected, ComputationalType::Long | ComputationalType::Double) {
            2
        } else {
            1
        };
        let value = self.pop(width)?.value;
        let value = self.coerce(value, expected);
        self.store(index, value)
    }

    /// Account for a dereference of the given reference
    ///
    /// `only_null_pointer` is set when a `NullPointerException` is the only exception the
    /// instruction can throw.
    fn dereference(&mut self, reference: &ReferenceValue<'g>, only_null_pointer: bool) {
        if !self.settings.predict_null_pointer_exceptions {
            return;
        }
        match reference.is_null() {
            Tristate::Always => self.falls = false,
            Tristate::Never if only_null_pointer => self.may_throw = false,
            _ => (),
        }
    }

    /// Conditional jump to the target, which is taken depending on the outcome
    fn branch(&mut self, target: usize, taken: Tristate) {
        if self.settings.evaluate_all_code {
            self.successors.insert(target);
            return;
        }
        match taken {
            Tristate::Always => {
                self.successors.insert(target);
                self.falls = false;
            }
            Tristate::Never => (),
            Tristate::Maybe => {
                self.successors.insert(target);
            }
        }
    }

    /// Jump to the switch targets whose keys the value can match
    fn switch(&mut self, key: IntValue, default: usize, cases: Vec<(i64, usize)>) {
        if self.settings.evaluate_all_code {
            self.successors.insert(default);
            self.successors
                .extend(cases.into_iter().map(|(_, target)| target));
            return;
        }

        let (min, max) = key.bounds();
        let (min, max) = (min as i64, max as i64);
        let mut matched: i64 = 0;
        for (case, target) in cases {
            if min <= case && case <= max {
                matched += 1;
                self.successors.insert(target);
            }
        }
        if matched < max - min + 1 {
            self.successors.insert(default);
        }
    }

    fn step(&mut self, instruction: &Instruction) -> Result<(), EvaluationErrorKind> {
        use ComputationalType as CT;
        use Instruction::*;

        match instruction {
            Nop => (),
            AConstNull => self.push(self.factory.null()),
            IConstM1 => self.push(self.factory.integer(-1)),
            IConst0 => self.push(self.factory.integer(0)),
            IConst1 => self.push(self.factory.integer(1)),
            IConst2 => self.push(self.factory.integer(2)),
            IConst3 => self.push(self.factory.integer(3)),
            IConst4 => self.push(self.factory.integer(4)),
            IConst5 => self.push(self.factory.integer(5)),
            LConst0 => self.push(self.factory.long(0)),
            LConst1 => self.push(self.factory.long(1)),
            FConst0 => self.push(self.factory.float(0.0)),
            FConst1 => self.push(self.factory.float(1.0)),
            FConst2 => self.push(self.factory.float(2.0)),
            DConst0 => self.push(self.factory.double(0.0)),
            DConst1 => self.push(self.factory.double(1.0)),
            BiPush(value) => self.push(self.factory.integer(*value as i32)),
            SiPush(value) => self.push(self.factory.integer(*value as i32)),
            Ldc(index) => {
                let value = match self.constant(*index)? {
                    ConstantData::Integer(value) => self.factory.integer(*value),
                    ConstantData::Float(value) => self.factory.float(*value),
                    ConstantData::String(value) => self.factory.string(value.clone()),
                    ConstantData::Class(ref_type) => self.factory.class_literal(ref_type.clone()),
                    ConstantData::MethodHandle(_) => self.factory.method_handle(),
                    ConstantData::MethodType(_) => self.factory.method_type(),
                    _ => return Err(EvaluationErrorKind::InvalidConstant(*index)),
                };
                self.push(value);
            }
            Ldc2(index) => {
                let value = match self.constant(*index)? {
                    ConstantData::Long(value) => self.factory.long(*value),
                    ConstantData::Double(value) => self.factory.double(*value),
                    _ => return Err(EvaluationErrorKind::InvalidConstant(*index)),
                };
                self.push(value);
            }

            ILoad(index) => self.load(*index, CT::Int)?,
            LLoad(index) => self.load(*index, CT::Long)?,
            FLoad(index) => self.load(*index, CT::Float)?,
            DLoad(index) => self.load(*index, CT::Double)?,
            ALoad(index) => self.load(*index, CT::Reference)?,

            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => {
                self.pop_int()?;
                let array = self.pop_reference()?;
                self.dereference(&array, false);
                let value = match instruction {
                    IALoad => self.factory.unknown(&FieldType::int()),
                    LALoad => self.factory.unknown(&FieldType::long()),
                    FALoad => self.factory.unknown(&FieldType::float()),
                    DALoad => self.factory.unknown(&FieldType::double()),
                    // Also used for `boolean[]`, whose range fits inside that of `byte`
                    BALoad => self.factory.unknown(&FieldType::byte()),
                    CALoad => self.factory.unknown(&FieldType::char()),
                    SALoad => self.factory.unknown(&FieldType::short()),
                    _ => match array.array_element_type() {
                        Some(FieldType::Ref(ref_type)) => self.factory.unknown_reference(&ref_type),
                        _ => self.factory.unknown_object(),
                    },
                };
                self.push(value);
            }

            IStore(index) => self.pop_store(*index, CT::Int)?,
            LStore(index) => self.pop_store(*index, CT::Long)?,
            FStore(index) => self.pop_store(*index, CT::Float)?,
            DStore(index) => self.pop_store(*index, CT::Double)?,
            AStore(index) => {
                // `astore` is also how subroutines save their return address
                let value = self.pop1()?.value;
                let value = match value.computational_type() {
                    Some(CT::ReturnAddress) => value,
                    _ => self.coerce(value, CT::Reference),
                };
                self.store(*index, value)?;
            }

            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
                let width = if matches!(instruction, LAStore | DAStore) {
                    2
                } else {
                    1
                };
                self.pop(width)?;
                self.pop_int()?;
                let array = self.pop_reference()?;
                self.dereference(&array, false);
            }

            Pop => {
                self.pop1()?;
            }
            Pop2 => {
                self.pop1()?;
                self.pop1()?;
            }
            Dup => {
                let value1 = self.pop1()?;
                self.push1(&value1);
                self.push1(&value1);
            }
            DupX1 => {
                let value1 = self.pop1()?;
                let value2 = self.pop1()?;
                self.push1(&value1);
                self.push1(&value2);
                self.push1(&value1);
            }
            DupX2 => {
                let value1 = self.pop1()?;
                let value2 = self.pop1()?;
                let value3 = self.pop1()?;
                self.push1(&value1);
                self.push1(&value3);
                self.push1(&value2);
                self.push1(&value1);
            }
            Dup2 => {
                let value1 = self.pop1()?;
                let value2 = self.pop1()?;
                self.push1(&value2);
                self.push1(&value1);
                self.push1(&value2);
                self.push1(&value1);
            }
            Dup2X1 => {
                let value1 = self.pop1()?;
                let value2 = self.pop1()?;
                let value3 = self.pop1()?;
                self.push1(&value2);
                self.push1(&value1);
                self.push1(&value3);
                self.push1(&value2);
                self.push1(&value1);
            }
            Dup2X2 => {
                let value1 = self.pop1()?;
                let value2 = self.pop1()?;
                let value3 = self.pop1()?;
                let value4 = self.pop1()?;
                self.push1(&value2);
                self.push1(&value1);
                self.push1(&value4);
                self.push1(&value3);
                self.push1(&value2);
                self.push1(&value1);
            }
            Swap => {
                let value1 = self.pop1()?;
                let value2 = self.pop1()?;
                self.push1(&value1);
                self.push1(&value2);
            }

            IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor => {
                let value2 = self.pop_int()?;
                let value1 = self.pop_int()?;
                if matches!(instruction, IDiv | IRem) && value2.is_zero() {
                    self.falls = false;
                }
                self.push(Value::from(match instruction {
                    IAdd => value1.add(&value2),
                    ISub => value1.sub(&value2),
                    IMul => value1.mul(&value2),
                    IDiv => value1.div(&value2),
                    IRem => value1.rem(&value2),
                    IAnd => value1.and(&value2),
                    IOr => value1.or(&value2),
                    _ => value1.xor(&value2),
                }));
            }
            LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor => {
                let value2 = self.pop_long()?;
                let value1 = self.pop_long()?;
                if matches!(instruction, LDiv | LRem) && value2.is_zero() {
                    self.falls = false;
                }
                self.push(Value::from(match instruction {
                    LAdd => value1.add(&value2),
                    LSub => value1.sub(&value2),
                    LMul => value1.mul(&value2),
                    LDiv => value1.div(&value2),
                    LRem => value1.rem(&value2),
                    LAnd => value1.and(&value2),
                    LOr => value1.or(&value2),
                    _ => value1.xor(&value2),
                }));
            }
            FAdd | FSub | FMul | FDiv | FRem => {
                let value2 = self.pop_float()?;
                let value1 = self.pop_float()?;
                self.push(Value::from(match instruction {
                    FAdd => value1.add(&value2),
                    FSub => value1.sub(&value2),
                    FMul => value1.mul(&value2),
                    FDiv => value1.div(&value2),
                    _ => value1.rem(&value2),
                }));
            }
            DAdd | DSub | DMul | DDiv | DRem => {
                let value2 = self.pop_double()?;
                let value1 = self.pop_double()?;
                self.push(Value::from(match instruction {
                    DAdd => value1.add(&value2),
                    DSub => value1.sub(&value2),
                    DMul => value1.mul(&value2),
                    DDiv => value1.div(&value2),
                    _ => value1.rem(&value2),
                }));
            }
            INeg => {
                let value = self.pop_int()?;
                self.push(Value::from(value.neg()));
            }
            LNeg => {
                let value = self.pop_long()?;
                self.push(Value::from(value.neg()));
            }
            FNeg => {
                let value = self.pop_float()?;
                self.push(Value::from(value.neg()));
            }
            DNeg => {
                let value = self.pop_double()?;
                self.push(Value::from(value.neg()));
            }
            ISh(shift_type) => {
                let count = self.pop_int()?;
                let value = self.pop_int()?;
                self.push(Value::from(value.shift(*shift_type, &count)));
            }
            LSh(shift_type) => {
                let count = self.pop_int()?;
                let value = self.pop_long()?;
                self.push(Value::from(value.shift(*shift_type, &count)));
            }
            IInc(index, increment) => {
                let current = self.frame.locals.load(*index)?.value.int();
                let incremented = current.add(&IntValue::Particular(*increment as i32));
                self.store(*index, Value::from(incremented))?;
            }

            I2L => {
                let value = self.pop_int()?;
                self.push(Value::from(value.to_long()));
            }
            I2F => {
                let value = self.pop_int()?;
                self.push(Value::from(value.to_float()));
            }
            I2D => {
                let value = self.pop_int()?;
                self.push(Value::from(value.to_double()));
            }
            L2I => {
                let value = self.pop_long()?;
                self.push(Value::from(value.to_int()));
            }
            L2F => {
                let value = self.pop_long()?;
                self.push(Value::from(value.to_float()));
            }
            L2D => {
                let value = self.pop_long()?;
                self.push(Value::from(value.to_double()));
            }
            F2I => {
                let value = self.pop_float()?;
                self.push(Value::from(value.to_int()));
            }
            F2L => {
                let value = self.pop_float()?;
                self.push(Value::from(value.to_long()));
            }
            F2D => {
                let value = self.pop_float()?;
                self.push(Value::from(value.to_double()));
            }
            D2I => {
                let value = self.pop_double()?;
                self.push(Value::from(value.to_int()));
            }
            D2L => {
                let value = self.pop_double()?;
                self.push(Value::from(value.to_long()));
            }
            D2F => {
                let value = self.pop_double()?;
                self.push(Value::from(value.to_float()));
            }
            I2B => {
                let value = self.pop_int()?;
                self.push(Value::from(value.to_byte()));
            }
            I2C => {
                let value = self.pop_int()?;
                self.push(Value::from(value.to_char()));
            }
            I2S => {
                let value = self.pop_int()?;
                self.push(Value::from(value.to_short()));
            }

            LCmp => {
                let value2 = self.pop_long()?;
                let value1 = self.pop_long()?;
                self.push(Value::from(value1.three_way_compare(&value2)));
            }
            FCmp(mode) => {
                let value2 = self.pop_float()?;
                let value1 = self.pop_float()?;
                self.push(Value::from(value1.compare(*mode, &value2)));
            }
            DCmp(mode) => {
                let value2 = self.pop_double()?;
                let value1 = self.pop_double()?;
                self.push(Value::from(value1.compare(*mode, &value2)));
            }

            If(comparison, target) => {
                let value = self.pop_int()?;
                let taken = value.compare(*comparison, &IntValue::Particular(0));
                self.branch(*target, taken);
            }
            IfICmp(comparison, target) => {
                let value2 = self.pop_int()?;
                let value1 = self.pop_int()?;
                self.branch(*target, value1.compare(*comparison, &value2));
            }
            IfACmp(comparison, target) => {
                let value2 = self.pop_reference()?;
                let value1 = self.pop_reference()?;
                let same = value1.same_object(&value2);
                let taken = match comparison {
                    EqComparison::EQ => same,
                    EqComparison::NE => !same,
                };
                self.branch(*target, taken);
            }
            IfNull(comparison, target) => {
                let value = self.pop_reference()?;
                let taken = match comparison {
                    EqComparison::EQ => value.is_null(),
                    EqComparison::NE => !value.is_null(),
                };
                self.branch(*target, taken);
            }
            Goto(target) => {
                self.successors.insert(*target);
            }
            Jsr(target) => {
                let return_address = self.factory.return_address(self.next);
                self.push(return_address);
                self.successors.insert(*target);
                self.subroutine = Some(*target);
            }
            Ret(index) => {
                let value = self.frame.locals.load(*index)?.value.clone();
                match value.return_addresses() {
                    Some(addresses) => self.successors.extend(addresses.iter().copied()),
                    None => return Err(EvaluationErrorKind::NotReturnAddress(*index)),
                }
            }
            TableSwitch {
                default,
                low,
                targets,
            } => {
                let key = self.pop_int()?;
                let cases = targets
                    .iter()
                    .enumerate()
                    .map(|(index, target)| (*low as i64 + index as i64, *target))
                    .collect();
                self.switch(key, *default, cases);
            }
            LookupSwitch { default, targets } => {
                let key = self.pop_int()?;
                let cases = targets
                    .iter()
                    .map(|(case, target)| (*case as i64, *target))
                    .collect();
                self.switch(key, *default, cases);
            }

            IReturn | LReturn | FReturn | DReturn | AReturn => {
                let width = if matches!(instruction, LReturn | DReturn) {
                    2
                } else {
                    1
                };
                let value = self.pop(width)?.value;
                let context = self.context();
                let method = MethodRef::resolved(self.body.method);
                self.unit.set_return_value(context, &method, &value);
            }
            Return => (),

            GetStatic(index) => {
                let field = self.field_ref(*index)?;
                let context = self.context();
                let value = self.unit.field_value(context, field);
                self.push_typed(value, &field.descriptor);
            }
            PutStatic(index) => {
                let field = self.field_ref(*index)?;
                let value = self.pop(field.descriptor.width())?.value;
                let context = self.context();
                self.unit.set_field_value(context, field, &value);
            }
            GetField(index) => {
                let field = self.field_ref(*index)?;
                let object = self.pop_reference()?;
                self.dereference(&object, true);
                let context = self.context();
                let value = self.unit.field_value(context, field);
                self.push_typed(value, &field.descriptor);
            }
            PutField(index) => {
                let field = self.field_ref(*index)?;
                let value = self.pop(field.descriptor.width())?.value;
                let object = self.pop_reference()?;
                self.dereference(&object, true);
                if self.falls {
                    let context = self.context();
                    self.unit.set_field_value(context, field, &value);
                }
            }
            Invoke(invoke_type, index) => {
                let method = self.method_ref(*index)?;
                let mut arguments = vec![];
                for parameter in method.descriptor.parameters.iter().rev() {
                    arguments.push(self.pop(parameter.width())?.value);
                }
                if !matches!(invoke_type, InvokeType::Static) {
                    let receiver = self.pop1()?.value;
                    self.dereference(&receiver.reference(), false);
                    arguments.push(receiver);
                }
                arguments.reverse();

                let context = self.context();
                if self.falls {
                    for (parameter, argument) in arguments.iter().enumerate() {
                        self.unit
                            .set_parameter_value(context, method, parameter, argument);
                    }
                }
                if let Some(return_type) = &method.descriptor.return_type {
                    let value = self.unit.return_value(context, method);
                    self.push_typed(value, return_type);
                }
            }
            InvokeDynamic(index) => {
                let call_site = match self.constant(*index)? {
                    ConstantData::InvokeDynamic(call_site) => call_site,
                    _ => return Err(EvaluationErrorKind::InvalidConstant(*index)),
                };
                for parameter in call_site.descriptor.parameters.iter().rev() {
                    self.pop(parameter.width())?;
                }
                if let Some(return_type) = &call_site.descriptor.return_type {
                    self.push(self.factory.unknown(return_type));
                }
            }

            New(index) => {
                let ref_type = self.class_ref(*index)?;
                self.push(self.factory.new_instance(ref_type.clone()));
            }
            NewArray(base_type) => {
                let count = self.pop_int()?;
                if count.compare(OrdComparison::LT, &IntValue::Particular(0)) == Tristate::Always {
                    self.falls = false;
                }
                let array_type = RefType::array(FieldType::Base(*base_type));
                self.push(self.factory.new_instance(array_type));
            }
            ANewArray(index) => {
                let element_type = self.class_ref(*index)?;
                let count = self.pop_int()?;
                if count.compare(OrdComparison::LT, &IntValue::Particular(0)) == Tristate::Always {
                    self.falls = false;
                }
                let array_type = RefType::array(FieldType::Ref(element_type.clone()));
                self.push(self.factory.new_instance(array_type));
            }
            MultiANewArray(index, dimensions) => {
                let ref_type = self.class_ref(*index)?;
                for _ in 0..*dimensions {
                    let count = self.pop_int()?;
                    if count.compare(OrdComparison::LT, &IntValue::Particular(0))
                        == Tristate::Always
                    {
                        self.falls = false;
                    }
                }
                self.push(self.factory.new_instance(ref_type.clone()));
            }
            ArrayLength => {
                let array = self.pop_reference()?;
                self.dereference(&array, true);
                self.push(self.factory.integer_range(0, i32::MAX));
            }
            AThrow => {
                let exception = self.pop_reference()?;
                if exception.is_null() != Tristate::Always {
                    self.thrown = Some(exception);
                }
            }
            CheckCast(index) => {
                let ref_type = self.class_ref(*index)?;
                let Value { kind, provenance } = self.pop1()?.value;
                let reference = self.coerce(Value::new(kind), CT::Reference).reference();
                if self.settings.predict_null_pointer_exceptions
                    && reference.is_null() == Tristate::Always
                {
                    self.may_throw = false;
                }
                self.push(Value {
                    kind: ValueKind::Reference(reference.cast(ref_type)),
                    provenance,
                });
            }
            InstanceOf(index) => {
                let ref_type = self.class_ref(*index)?;
                let reference = self.pop_reference()?;
                self.push(Value::from(reference.instance_of(ref_type)));
            }
            MonitorEnter | MonitorExit => {
                let object = self.pop_reference()?;
                self.dereference(&object, false);
            }
        }

        Ok(())
    }
}
