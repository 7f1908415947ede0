//! Abstract values tracked on the operand stack and in local variables
//!
//! A [`Value`] is one tagged variant over every computational type, along with an optional
//! provenance (the set of places the value could have come from). Values are immutable: every
//! operation produces a new value.
//!
//! Values form a lattice, with [`Value::generalize`] as the join:
//!
//!   - [`ValueKind::Unreachable`] is the bottom and joins to whatever it is joined with
//!   - [`ValueKind::Top`] is the top, and is also what values of mismatched kinds join into
//!   - within one kind, particular values join into ranges (for integral types) or unknowns

mod floating;
mod integer;
mod reference;

pub use floating::*;
pub use integer::*;
pub use reference::*;

use crate::util::Width;
use std::collections::BTreeSet;
use std::ops::Not;

/// Place from which a value can originate
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Origin {
    /// Parameter of the method being analysed (`this` is parameter 0 for instance methods)
    Parameter(usize),

    /// Instruction at the given offset
    Instruction(usize),

    /// Exception caught by the handler at the given offset
    CaughtException(usize),
}

pub type Origins = BTreeSet<Origin>;

/// Outcome of a test on abstract values
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Tristate {
    Always,
    Never,
    Maybe,
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Tristate {
        if value {
            Tristate::Always
        } else {
            Tristate::Never
        }
    }
}

impl Not for Tristate {
    type Output = Tristate;

    fn not(self) -> Tristate {
        match self {
            Tristate::Always => Tristate::Never,
            Tristate::Never => Tristate::Always,
            Tristate::Maybe => Tristate::Maybe,
        }
    }
}

/// Type of a value, as far as the JVM instruction set is concerned
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ComputationalType {
    Int,
    Long,
    Float,
    Double,
    Reference,
    ReturnAddress,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ValueKind<'g> {
    /// No value can reach this point
    Unreachable,

    /// Any value at all (including the second half of a `long` or `double`)
    Top,

    Integer(IntValue),
    Long(LongValue),
    Float(FloatValue),
    Double(DoubleValue),
    Reference(ReferenceValue<'g>),

    /// Offsets to which a `ret` could return
    ReturnAddress(BTreeSet<usize>),
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Value<'g> {
    pub kind: ValueKind<'g>,

    /// Places the value may have come from, if it is being traced
    pub provenance: Option<Origins>,
}

impl<'g> Value<'g> {
    pub fn new(kind: ValueKind<'g>) -> Value<'g> {
        Value {
            kind,
            provenance: None,
        }
    }

    pub fn top() -> Value<'g> {
        Value::new(ValueKind::Top)
    }

    pub fn unreachable() -> Value<'g> {
        Value::new(ValueKind::Unreachable)
    }

    /// Least value that is at least as general as both values
    pub fn generalize(&self, other: &Value<'g>) -> Value<'g> {
        let kind = match (&self.kind, &other.kind) {
            (ValueKind::Unreachable, kind) | (kind, ValueKind::Unreachable) => kind.clone(),
            (ValueKind::Integer(i1), ValueKind::Integer(i2)) => {
                ValueKind::Integer(i1.generalize(i2))
            }
            (ValueKind::Long(l1), ValueKind::Long(l2)) => ValueKind::Long(l1.generalize(l2)),
            (ValueKind::Float(f1), ValueKind::Float(f2)) => ValueKind::Float(f1.generalize(f2)),
            (ValueKind::Double(d1), ValueKind::Double(d2)) => {
                ValueKind::Double(d1.generalize(d2))
            }
            (ValueKind::Reference(r1), ValueKind::Reference(r2)) => {
                ValueKind::Reference(r1.generalize(r2))
            }
            (ValueKind::ReturnAddress(a1), ValueKind::ReturnAddress(a2)) => {
                ValueKind::ReturnAddress(a1.union(a2).copied().collect())
            }
            _ => ValueKind::Top,
        };
        let provenance = match (&self.provenance, &other.provenance) {
            (None, None) => None,
            (Some(origins), None) | (None, Some(origins)) => Some(origins.clone()),
            (Some(origins1), Some(origins2)) => Some(origins1.union(origins2).copied().collect()),
        };
        Value { kind, provenance }
    }

    /// Forget enough about the value that repeated generalization must converge
    pub fn widen(&self) -> Value<'g> {
        let kind = match &self.kind {
            ValueKind::Integer(_) => ValueKind::Integer(IntegerValue::Unknown),
            ValueKind::Long(_) => ValueKind::Long(IntegerValue::Unknown),
            ValueKind::Float(_) => ValueKind::Float(FloatingValue::Unknown),
            ValueKind::Double(_) => ValueKind::Double(FloatingValue::Unknown),
            ValueKind::Reference(reference) => ValueKind::Reference(reference.widen()),
            other => other.clone(),
        };
        Value {
            kind,
            provenance: self.provenance.clone(),
        }
    }

    /// Is this exactly one concrete value?
    pub fn is_particular(&self) -> bool {
        match &self.kind {
            ValueKind::Integer(int) => int.is_particular(),
            ValueKind::Long(long) => long.is_particular(),
            ValueKind::Float(float) => float.is_particular(),
            ValueKind::Double(double) => double.is_particular(),
            ValueKind::Reference(reference) => reference.is_particular(),
            ValueKind::ReturnAddress(addresses) => addresses.len() == 1,
            ValueKind::Unreachable | ValueKind::Top => false,
        }
    }

    /// Is anything known about the value beyond its type?
    pub fn is_specific(&self) -> bool {
        match &self.kind {
            ValueKind::Integer(int) => int.is_specific(),
            ValueKind::Long(long) => long.is_specific(),
            ValueKind::Float(float) => float.is_particular(),
            ValueKind::Double(double) => double.is_particular(),
            ValueKind::Reference(reference) => reference.is_specific(),
            ValueKind::ReturnAddress(_) => true,
            ValueKind::Unreachable | ValueKind::Top => false,
        }
    }

    /// Does the value take up two slots?
    pub fn is_category2(&self) -> bool {
        matches!(self.kind, ValueKind::Long(_) | ValueKind::Double(_))
    }

    pub fn computational_type(&self) -> Option<ComputationalType> {
        match &self.kind {
            ValueKind::Integer(_) => Some(ComputationalType::Int),
            ValueKind::Long(_) => Some(ComputationalType::Long),
            ValueKind::Float(_) => Some(ComputationalType::Float),
            ValueKind::Double(_) => Some(ComputationalType::Double),
            ValueKind::Reference(_) => Some(ComputationalType::Reference),
            ValueKind::ReturnAddress(_) => Some(ComputationalType::ReturnAddress),
            ValueKind::Unreachable | ValueKind::Top => None,
        }
    }

    /// Same value, also originating from the given place
    pub fn traced(&self, origin: Origin) -> Value<'g> {
        let mut provenance = self.provenance.clone().unwrap_or_default();
        provenance.insert(origin);
        Value {
            kind: self.kind.clone(),
            provenance: Some(provenance),
        }
    }

    /// Same value, without any provenance
    pub fn untraced(&self) -> Value<'g> {
        Value::new(self.kind.clone())
    }

    pub fn provenance(&self) -> Option<&Origins> {
        self.provenance.as_ref()
    }

    /// Value as an `int` (unknown if it isn't one)
    pub fn int(&self) -> IntValue {
        match self.kind {
            ValueKind::Integer(int) => int,
            _ => IntegerValue::Unknown,
        }
    }

    pub fn long(&self) -> LongValue {
        match self.kind {
            ValueKind::Long(long) => long,
            _ => IntegerValue::Unknown,
        }
    }

    pub fn float(&self) -> FloatValue {
        match self.kind {
            ValueKind::Float(float) => float,
            _ => FloatingValue::Unknown,
        }
    }

    pub fn double(&self) -> DoubleValue {
        match self.kind {
            ValueKind::Double(double) => double,
            _ => FloatingValue::Unknown,
        }
    }

    /// Value as a reference (unknown if it isn't one)
    pub fn reference(&self) -> ReferenceValue<'g> {
        match &self.kind {
            ValueKind::Reference(reference) => reference.clone(),
            _ => ReferenceValue::unknown(),
        }
    }

    pub fn return_addresses(&self) -> Option<&BTreeSet<usize>> {
        match &self.kind {
            ValueKind::ReturnAddress(addresses) => Some(addresses),
            _ => None,
        }
    }
}

impl<'g> Width for Value<'g> {
    fn width(&self) -> usize {
        if self.is_category2() {
            2
        } else {
            1
        }
    }
}

impl<'g> From<IntValue> for Value<'g> {
    fn from(int: IntValue) -> Value<'g> {
        Value::new(ValueKind::Integer(int))
    }
}

impl<'g> From<LongValue> for Value<'g> {
    fn from(long: LongValue) -> Value<'g> {
        Value::new(ValueKind::Long(long))
    }
}

impl<'g> From<FloatValue> for Value<'g> {
    fn from(float: FloatValue) -> Value<'g> {
        Value::new(ValueKind::Float(float))
    }
}

impl<'g> From<DoubleValue> for Value<'g> {
    fn from(double: DoubleValue) -> Value<'g> {
        Value::new(ValueKind::Double(double))
    }
}

impl<'g> From<ReferenceValue<'g>> for Value<'g> {
    fn from(reference: ReferenceValue<'g>) -> Value<'g> {
        Value::new(ValueKind::Reference(reference))
    }
}
