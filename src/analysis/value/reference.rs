use super::{IntValue, IntegerValue, Tristate};
use crate::jvm::class_graph::{common_superclass, Assignable, ClassRef};
use crate::jvm::{FieldType, RefType};
use std::borrow::Cow;
use std::collections::BTreeSet;

/// Past this many alternatives, a multi-typed value forgets its alternatives
pub const MAX_ALTERNATIVES: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Nullability {
    Null,
    NotNull,
    Maybe,
}

impl Nullability {
    pub fn generalize(self, other: Nullability) -> Nullability {
        if self == other {
            self
        } else {
            Nullability::Maybe
        }
    }
}

/// Exactly known object (beyond `null`)
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ReferenceConstant<'g> {
    String(Cow<'static, str>),
    Class(RefType<ClassRef<'g>>),
}

/// Abstract reference
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ReferenceValue<'g> {
    /// Static type of the reference, or `None` if nothing is known about the type
    pub ref_type: Option<RefType<ClassRef<'g>>>,

    pub nullability: Nullability,

    /// Could the runtime type be a strict subtype of `ref_type`?
    pub may_be_extension: bool,

    /// Possible types of the reference, for multi-typed values
    ///
    /// `None` means the alternatives are not being tracked (or there were too many of them).
    pub alternatives: Option<BTreeSet<RefType<ClassRef<'g>>>>,

    pub constant: Option<ReferenceConstant<'g>>,
}

impl<'g> ReferenceValue<'g> {
    /// Reference about which nothing is known
    pub fn unknown() -> ReferenceValue<'g> {
        ReferenceValue {
            ref_type: None,
            nullability: Nullability::Maybe,
            may_be_extension: true,
            alternatives: None,
            constant: None,
        }
    }

    /// The `null` literal, which has no type of its own
    pub fn null() -> ReferenceValue<'g> {
        ReferenceValue {
            ref_type: None,
            nullability: Nullability::Null,
            may_be_extension: false,
            alternatives: None,
            constant: None,
        }
    }

    fn is_null_literal(&self) -> bool {
        self.nullability == Nullability::Null && self.ref_type.is_none()
    }

    pub fn generalize(&self, other: &ReferenceValue<'g>) -> ReferenceValue<'g> {
        let nullability = self.nullability.generalize(other.nullability);
        let constant = if self.constant == other.constant {
            self.constant.clone()
        } else {
            None
        };

        // `null` fits in any type
        if self.is_null_literal() || other.is_null_literal() {
            let typed = if self.is_null_literal() { other } else { self };
            return ReferenceValue {
                ref_type: typed.ref_type.clone(),
                nullability,
                may_be_extension: typed.may_be_extension,
                alternatives: typed.alternatives.clone(),
                constant,
            };
        }

        let alternatives = match (&self.alternatives, &other.alternatives) {
            (Some(alts1), Some(alts2)) => {
                let union: BTreeSet<_> = alts1.union(alts2).cloned().collect();
                Some(union).filter(|union| union.len() <= MAX_ALTERNATIVES)
            }
            _ => None,
        };

        let (ref_type, may_be_extension) = match (&self.ref_type, &other.ref_type) {
            (Some(type1), Some(type2)) if type1 == type2 => (
                Some(type1.clone()),
                self.may_be_extension || other.may_be_extension,
            ),
            (Some(type1), Some(type2)) => (common_superclass(type1, type2), true),
            _ => (None, true),
        };

        ReferenceValue {
            ref_type,
            nullability,
            may_be_extension,
            alternatives,
            constant,
        }
    }

    /// Drop everything that can keep growing
    pub fn widen(&self) -> ReferenceValue<'g> {
        ReferenceValue {
            alternatives: None,
            constant: None,
            ..self.clone()
        }
    }

    /// Is this exactly one object (or `null`)?
    pub fn is_particular(&self) -> bool {
        self.nullability == Nullability::Null || self.constant.is_some()
    }

    /// Is anything known beyond the declared type?
    pub fn is_specific(&self) -> bool {
        self.nullability != Nullability::Maybe
            || self.constant.is_some()
            || (self.ref_type.is_some() && !self.may_be_extension)
    }

    pub fn is_null(&self) -> Tristate {
        match self.nullability {
            Nullability::Null => Tristate::Always,
            Nullability::NotNull => Tristate::Never,
            Nullability::Maybe => Tristate::Maybe,
        }
    }

    /// Do the two references point to the same object?
    pub fn same_object(&self, other: &ReferenceValue<'g>) -> Tristate {
        match (self.nullability, other.nullability) {
            (Nullability::Null, Nullability::Null) => Tristate::Always,
            (Nullability::Null, Nullability::NotNull) | (Nullability::NotNull, Nullability::Null) => {
                Tristate::Never
            }
            _ => Tristate::Maybe,
        }
    }

    /// Type of the elements, if this is known to be an array
    pub fn array_element_type(&self) -> Option<FieldType<ClassRef<'g>>> {
        self.ref_type.as_ref().and_then(RefType::array_element)
    }

    /// Result of `instanceof`
    pub fn instance_of(&self, ref_type: &RefType<ClassRef<'g>>) -> IntValue {
        match (self.nullability, &self.ref_type) {
            (Nullability::Null, _) => IntegerValue::Particular(0),
            (Nullability::NotNull, Some(own_type)) if own_type.is_assignable(ref_type) => {
                IntegerValue::Particular(1)
            }
            _ => IntegerValue::Range(0, 1),
        }
    }

    /// Value after a successful `checkcast`
    pub fn cast(&self, ref_type: &RefType<ClassRef<'g>>) -> ReferenceValue<'g> {
        if self.nullability == Nullability::Null {
            return self.clone();
        }
        if let Some(own_type) = &self.ref_type {
            if own_type.is_assignable(ref_type) {
                return self.clone();
            }
        }
        ReferenceValue {
            ref_type: Some(ref_type.clone()),
            nullability: self.nullability,
            may_be_extension: true,
            alternatives: self.alternatives.as_ref().map(|_| {
                let mut alternatives = BTreeSet::new();
                alternatives.insert(ref_type.clone());
                alternatives
            }),
            constant: self.constant.clone(),
        }
    }
}
