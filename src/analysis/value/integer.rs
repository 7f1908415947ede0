use super::{DoubleValue, FloatValue, FloatingValue, Tristate};
use crate::jvm::code::{OrdComparison, ShiftType};
use std::fmt::Debug;
use std::hash::Hash;

/// Arithmetic on the JVM's two integral computational types
///
/// Every operation follows the JVM semantics: overflow wraps and shift counts are masked.
pub trait JvmInteger: Copy + Ord + Hash + Debug {
    const MIN: Self;
    const MAX: Self;
    const ZERO: Self;

    fn wrapping_add(self, other: Self) -> Self;
    fn wrapping_sub(self, other: Self) -> Self;
    fn wrapping_mul(self, other: Self) -> Self;
    fn wrapping_div(self, other: Self) -> Self;
    fn wrapping_rem(self, other: Self) -> Self;
    fn wrapping_neg(self) -> Self;
    fn checked_add(self, other: Self) -> Option<Self>;
    fn checked_sub(self, other: Self) -> Option<Self>;
    fn and(self, other: Self) -> Self;
    fn or(self, other: Self) -> Self;
    fn xor(self, other: Self) -> Self;
    fn shift(self, shift_type: ShiftType, count: i32) -> Self;
}

macro_rules! jvm_integer {
    ($int:ty, $unsigned:ty, $shift_mask:expr) => {
        impl JvmInteger for $int {
            const MIN: Self = <$int>::MIN;
            const MAX: Self = <$int>::MAX;
            const ZERO: Self = 0;

            fn wrapping_add(self, other: Self) -> Self {
                <$int>::wrapping_add(self, other)
            }
            fn wrapping_sub(self, other: Self) -> Self {
                <$int>::wrapping_sub(self, other)
            }
            fn wrapping_mul(self, other: Self) -> Self {
                <$int>::wrapping_mul(self, other)
            }
            fn wrapping_div(self, other: Self) -> Self {
                <$int>::wrapping_div(self, other)
            }
            fn wrapping_rem(self, other: Self) -> Self {
                <$int>::wrapping_rem(self, other)
            }
            fn wrapping_neg(self) -> Self {
                <$int>::wrapping_neg(self)
            }
            fn checked_add(self, other: Self) -> Option<Self> {
                <$int>::checked_add(self, other)
            }
            fn checked_sub(self, other: Self) -> Option<Self> {
                <$int>::checked_sub(self, other)
            }
            fn and(self, other: Self) -> Self {
                self & other
            }
            fn or(self, other: Self) -> Self {
                self | other
            }
            fn xor(self, other: Self) -> Self {
                self ^ other
            }
            fn shift(self, shift_type: ShiftType, count: i32) -> Self {
                let count = (count & $shift_mask) as u32;
                match shift_type {
                    ShiftType::Left => self.wrapping_shl(count),
                    ShiftType::ArithmeticRight => self.wrapping_shr(count),
                    ShiftType::LogicalRight => ((self as $unsigned) >> count) as $int,
                }
            }
        }
    };
}

jvm_integer!(i32, u32, 0x1f);
jvm_integer!(i64, u64, 0x3f);

/// Abstract `int` or `long`
///
/// Ranges are inclusive on both ends and are always normalized: a range with equal bounds is a
/// particular value and a range covering every value is unknown.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IntegerValue<T> {
    Unknown,
    Range(T, T),
    Particular(T),
}

pub type IntValue = IntegerValue<i32>;
pub type LongValue = IntegerValue<i64>;

impl<T: JvmInteger> IntegerValue<T> {
    /// Value somewhere between the two bounds (inclusive)
    pub fn range(min: T, max: T) -> IntegerValue<T> {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        if min == max {
            IntegerValue::Particular(min)
        } else if min == T::MIN && max == T::MAX {
            IntegerValue::Unknown
        } else {
            IntegerValue::Range(min, max)
        }
    }

    /// Smallest and largest possible values
    pub fn bounds(&self) -> (T, T) {
        match *self {
            IntegerValue::Unknown => (T::MIN, T::MAX),
            IntegerValue::Range(min, max) => (min, max),
            IntegerValue::Particular(value) => (value, value),
        }
    }

    pub fn particular(&self) -> Option<T> {
        match *self {
            IntegerValue::Particular(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_particular(&self) -> bool {
        matches!(self, IntegerValue::Particular(_))
    }

    /// Is anything known about the value?
    pub fn is_specific(&self) -> bool {
        !matches!(self, IntegerValue::Unknown)
    }

    pub fn generalize(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        let (min1, max1) = self.bounds();
        let (min2, max2) = other.bounds();
        IntegerValue::range(min1.min(min2), max1.max(max2))
    }

    pub fn add(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        if let (Some(a), Some(b)) = (self.particular(), other.particular()) {
            return IntegerValue::Particular(a.wrapping_add(b));
        }
        let (min1, max1) = self.bounds();
        let (min2, max2) = other.bounds();
        match (min1.checked_add(min2), max1.checked_add(max2)) {
            (Some(min), Some(max)) => IntegerValue::range(min, max),
            _ => IntegerValue::Unknown,
        }
    }

    pub fn sub(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        if let (Some(a), Some(b)) = (self.particular(), other.particular()) {
            return IntegerValue::Particular(a.wrapping_sub(b));
        }
        let (min1, max1) = self.bounds();
        let (min2, max2) = other.bounds();
        match (min1.checked_sub(max2), max1.checked_sub(min2)) {
            (Some(min), Some(max)) => IntegerValue::range(min, max),
            _ => IntegerValue::Unknown,
        }
    }

    pub fn mul(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) => IntegerValue::Particular(a.wrapping_mul(b)),
            (Some(zero), _) | (_, Some(zero)) if zero == T::ZERO => IntegerValue::Particular(zero),
            _ => IntegerValue::Unknown,
        }
    }

    /// Quotient, or unknown if the division may throw
    pub fn div(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) if b != T::ZERO => IntegerValue::Particular(a.wrapping_div(b)),
            _ => IntegerValue::Unknown,
        }
    }

    /// Remainder, or unknown if the division may throw
    pub fn rem(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) if b != T::ZERO => IntegerValue::Particular(a.wrapping_rem(b)),
            _ => IntegerValue::Unknown,
        }
    }

    /// Is this definitely zero?
    pub fn is_zero(&self) -> bool {
        self.particular() == Some(T::ZERO)
    }

    pub fn neg(&self) -> IntegerValue<T> {
        match *self {
            IntegerValue::Particular(value) => IntegerValue::Particular(value.wrapping_neg()),
            IntegerValue::Range(min, max) if min != T::MIN => {
                IntegerValue::range(max.wrapping_neg(), min.wrapping_neg())
            }
            _ => IntegerValue::Unknown,
        }
    }

    pub fn and(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) => IntegerValue::Particular(a.and(b)),

            // Masking with a non-negative constant bounds the result
            (Some(mask), _) | (_, Some(mask)) if mask >= T::ZERO => IntegerValue::range(T::ZERO, mask),
            _ => IntegerValue::Unknown,
        }
    }

    pub fn or(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) => IntegerValue::Particular(a.or(b)),
            _ => IntegerValue::Unknown,
        }
    }

    pub fn xor(&self, other: &IntegerValue<T>) -> IntegerValue<T> {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) => IntegerValue::Particular(a.xor(b)),
            _ => IntegerValue::Unknown,
        }
    }

    pub fn shift(&self, shift_type: ShiftType, count: &IntValue) -> IntegerValue<T> {
        match (*self, count.particular()) {
            (IntegerValue::Particular(value), Some(count)) => {
                IntegerValue::Particular(value.shift(shift_type, count))
            }

            // Arithmetic right shifts are monotonic
            (IntegerValue::Range(min, max), Some(count))
                if shift_type == ShiftType::ArithmeticRight =>
            {
                IntegerValue::range(
                    min.shift(shift_type, count),
                    max.shift(shift_type, count),
                )
            }
            _ => IntegerValue::Unknown,
        }
    }

    /// Outcome of comparing this value against another one
    pub fn compare(&self, comparison: OrdComparison, other: &IntegerValue<T>) -> Tristate {
        let (min1, max1) = self.bounds();
        let (min2, max2) = other.bounds();
        match comparison {
            OrdComparison::EQ => {
                if let (Some(a), Some(b)) = (self.particular(), other.particular()) {
                    Tristate::from(a == b)
                } else if max1 < min2 || max2 < min1 {
                    Tristate::Never
                } else {
                    Tristate::Maybe
                }
            }
            OrdComparison::LT => {
                if max1 < min2 {
                    Tristate::Always
                } else if min1 >= max2 {
                    Tristate::Never
                } else {
                    Tristate::Maybe
                }
            }
            OrdComparison::GT => {
                if min1 > max2 {
                    Tristate::Always
                } else if max1 <= min2 {
                    Tristate::Never
                } else {
                    Tristate::Maybe
                }
            }
            OrdComparison::NE | OrdComparison::GE | OrdComparison::LE => {
                !self.compare(!comparison, other)
            }
        }
    }

    /// Result of `lcmp` (or the equivalent for `int`): -1, 0, or 1
    pub fn three_way_compare(&self, other: &IntegerValue<T>) -> IntValue {
        match (
            self.compare(OrdComparison::LT, other),
            self.compare(OrdComparison::GT, other),
        ) {
            (Tristate::Always, _) => IntegerValue::Particular(-1),
            (_, Tristate::Always) => IntegerValue::Particular(1),
            (Tristate::Never, Tristate::Never) => IntegerValue::Particular(0),
            (Tristate::Never, _) => IntegerValue::Range(0, 1),
            (_, Tristate::Never) => IntegerValue::Range(-1, 0),
            _ => IntegerValue::Range(-1, 1),
        }
    }
}

impl IntValue {
    /// Truncate into the range of a narrower type (`i2b`, `i2c`, `i2s`)
    fn truncate(&self, min: i32, max: i32, convert: impl Fn(i32) -> i32) -> IntValue {
        match *self {
            IntegerValue::Particular(value) => IntegerValue::Particular(convert(value)),
            IntegerValue::Range(lo, hi) if min <= lo && hi <= max => *self,
            _ => IntegerValue::range(min, max),
        }
    }

    pub fn to_byte(&self) -> IntValue {
        self.truncate(i8::MIN as i32, i8::MAX as i32, |value| value as i8 as i32)
    }

    pub fn to_char(&self) -> IntValue {
        self.truncate(u16::MIN as i32, u16::MAX as i32, |value| value as u16 as i32)
    }

    pub fn to_short(&self) -> IntValue {
        self.truncate(i16::MIN as i32, i16::MAX as i32, |value| value as i16 as i32)
    }

    pub fn to_long(&self) -> LongValue {
        match *self {
            IntegerValue::Unknown => IntegerValue::Unknown,
            IntegerValue::Range(min, max) => IntegerValue::Range(min as i64, max as i64),
            IntegerValue::Particular(value) => IntegerValue::Particular(value as i64),
        }
    }

    pub fn to_float(&self) -> FloatValue {
        match *self {
            IntegerValue::Particular(value) => FloatingValue::from_float(value as f32),
            _ => FloatingValue::Unknown,
        }
    }

    pub fn to_double(&self) -> DoubleValue {
        match *self {
            IntegerValue::Particular(value) => FloatingValue::from_float(value as f64),
            _ => FloatingValue::Unknown,
        }
    }
}

impl LongValue {
    pub fn to_int(&self) -> IntValue {
        match *self {
            IntegerValue::Particular(value) => IntegerValue::Particular(value as i32),
            IntegerValue::Range(min, max) if i32::MIN as i64 <= min && max <= i32::MAX as i64 => {
                IntegerValue::Range(min as i32, max as i32)
            }
            _ => IntegerValue::Unknown,
        }
    }

    pub fn to_float(&self) -> FloatValue {
        match *self {
            IntegerValue::Particular(value) => FloatingValue::from_float(value as f32),
            _ => FloatingValue::Unknown,
        }
    }

    pub fn to_double(&self) -> DoubleValue {
        match *self {
            IntegerValue::Particular(value) => FloatingValue::from_float(value as f64),
            _ => FloatingValue::Unknown,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalized_ranges() {
        assert_eq!(IntValue::range(4, 4), IntegerValue::Particular(4));
        assert_eq!(IntValue::range(9, 2), IntegerValue::Range(2, 9));
        assert_eq!(IntValue::range(i32::MIN, i32::MAX), IntegerValue::Unknown);
        assert_eq!(
            IntValue::Particular(3).generalize(&IntValue::Particular(5)),
            IntegerValue::Range(3, 5)
        );
        assert_eq!(
            IntValue::Range(3, 5).generalize(&IntValue::Unknown),
            IntegerValue::Unknown
        );
    }

    #[test]
    fn wrapping_arithmetic() {
        let max = IntValue::Particular(i32::MAX);
        let one = IntValue::Particular(1);
        assert_eq!(max.add(&one), IntegerValue::Particular(i32::MIN));
        assert_eq!(
            IntValue::Particular(i32::MIN).div(&IntValue::Particular(-1)),
            IntegerValue::Particular(i32::MIN)
        );
        assert_eq!(
            IntValue::Particular(i32::MIN).rem(&IntValue::Particular(-1)),
            IntegerValue::Particular(0)
        );
        assert_eq!(
            IntValue::Particular(7).div(&IntValue::Particular(0)),
            IntegerValue::Unknown
        );
        assert_eq!(
            LongValue::Particular(-7).rem(&LongValue::Particular(2)),
            IntegerValue::Particular(-1)
        );
    }

    #[test]
    fn range_arithmetic() {
        let small = IntValue::Range(0, 10);
        assert_eq!(small.add(&IntValue::Particular(5)), IntegerValue::Range(5, 15));
        assert_eq!(small.sub(&IntValue::Range(1, 2)), IntegerValue::Range(-2, 9));
        assert_eq!(
            IntValue::Range(0, i32::MAX).add(&IntValue::Particular(1)),
            IntegerValue::Unknown
        );
        assert_eq!(small.neg(), IntegerValue::Range(-10, 0));
        assert_eq!(small.mul(&IntValue::Particular(0)), IntegerValue::Particular(0));
        assert_eq!(small.mul(&IntValue::Particular(2)), IntegerValue::Unknown);
        assert_eq!(
            IntValue::Unknown.and(&IntValue::Particular(0xff)),
            IntegerValue::Range(0, 0xff)
        );
    }

    #[test]
    fn shifts_mask_their_count() {
        let one = IntValue::Particular(1);
        assert_eq!(
            one.shift(ShiftType::Left, &IntValue::Particular(33)),
            IntegerValue::Particular(2)
        );
        assert_eq!(
            LongValue::Particular(1).shift(ShiftType::Left, &IntValue::Particular(33)),
            IntegerValue::Particular(1 << 33)
        );
        assert_eq!(
            IntValue::Particular(-1).shift(ShiftType::LogicalRight, &IntValue::Particular(28)),
            IntegerValue::Particular(0xf)
        );
        assert_eq!(
            IntValue::Range(-16, 16).shift(ShiftType::ArithmeticRight, &IntValue::Particular(2)),
            IntegerValue::Range(-4, 4)
        );
    }

    #[test]
    fn comparisons() {
        let small = IntValue::Range(0, 10);
        let zero = IntValue::Particular(0);
        assert_eq!(small.compare(OrdComparison::GE, &zero), Tristate::Always);
        assert_eq!(small.compare(OrdComparison::LT, &zero), Tristate::Never);
        assert_eq!(small.compare(OrdComparison::EQ, &zero), Tristate::Maybe);
        assert_eq!(
            small.compare(OrdComparison::NE, &IntValue::Particular(11)),
            Tristate::Always
        );
        assert_eq!(
            LongValue::Particular(3).three_way_compare(&LongValue::Particular(3)),
            IntegerValue::Particular(0)
        );
        assert_eq!(
            LongValue::Range(0, 3).three_way_compare(&LongValue::Particular(3)),
            IntegerValue::Range(-1, 0)
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(IntValue::Particular(200).to_byte(), IntegerValue::Particular(-56));
        assert_eq!(IntValue::Unknown.to_char(), IntegerValue::Range(0, 0xffff));
        assert_eq!(IntValue::Range(-3, 3).to_short(), IntegerValue::Range(-3, 3));
        assert_eq!(
            LongValue::Particular(1 << 32 | 5).to_int(),
            IntegerValue::Particular(5)
        );
        assert_eq!(LongValue::Range(0, 1 << 40).to_int(), IntegerValue::Unknown);
        assert_eq!(IntValue::Range(-1, 1).to_long(), IntegerValue::Range(-1, 1));
    }
}
