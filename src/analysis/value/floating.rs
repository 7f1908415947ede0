use super::{IntValue, IntegerValue, LongValue};
use crate::jvm::code::CompareMode;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Bit representation of one of the JVM's floating point computational types
///
/// Floating point values are tracked through their bits so that abstract values can be compared
/// and hashed exactly (`NaN` equals itself, `0.0` and `-0.0` differ).
pub trait FloatBits: Copy + Ord + Hash + Debug {
    type Float: Copy
        + PartialOrd
        + Add<Output = Self::Float>
        + Sub<Output = Self::Float>
        + Mul<Output = Self::Float>
        + Div<Output = Self::Float>
        + Rem<Output = Self::Float>
        + Neg<Output = Self::Float>;

    fn to_float(self) -> Self::Float;
    fn from_float(float: Self::Float) -> Self;
    fn is_nan(float: Self::Float) -> bool;
}

impl FloatBits for u32 {
    type Float = f32;

    fn to_float(self) -> f32 {
        f32::from_bits(self)
    }
    fn from_float(float: f32) -> u32 {
        float.to_bits()
    }
    fn is_nan(float: f32) -> bool {
        float.is_nan()
    }
}

impl FloatBits for u64 {
    type Float = f64;

    fn to_float(self) -> f64 {
        f64::from_bits(self)
    }
    fn from_float(float: f64) -> u64 {
        float.to_bits()
    }
    fn is_nan(float: f64) -> bool {
        float.is_nan()
    }
}

/// Abstract `float` or `double`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FloatingValue<B> {
    Unknown,
    Particular(B),
}

pub type FloatValue = FloatingValue<u32>;
pub type DoubleValue = FloatingValue<u64>;

impl<B: FloatBits> FloatingValue<B> {
    pub fn from_float(float: B::Float) -> FloatingValue<B> {
        FloatingValue::Particular(B::from_float(float))
    }

    pub fn particular(&self) -> Option<B::Float> {
        match *self {
            FloatingValue::Particular(bits) => Some(bits.to_float()),
            FloatingValue::Unknown => None,
        }
    }

    pub fn is_particular(&self) -> bool {
        matches!(self, FloatingValue::Particular(_))
    }

    pub fn generalize(&self, other: &FloatingValue<B>) -> FloatingValue<B> {
        if self == other {
            *self
        } else {
            FloatingValue::Unknown
        }
    }

    fn binary(
        &self,
        other: &FloatingValue<B>,
        op: impl Fn(B::Float, B::Float) -> B::Float,
    ) -> FloatingValue<B> {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) => FloatingValue::from_float(op(a, b)),
            _ => FloatingValue::Unknown,
        }
    }

    pub fn add(&self, other: &FloatingValue<B>) -> FloatingValue<B> {
        self.binary(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &FloatingValue<B>) -> FloatingValue<B> {
        self.binary(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &FloatingValue<B>) -> FloatingValue<B> {
        self.binary(other, |a, b| a * b)
    }

    pub fn div(&self, other: &FloatingValue<B>) -> FloatingValue<B> {
        self.binary(other, |a, b| a / b)
    }

    /// Truncated remainder (`fmod`), which is what `frem`/`drem` compute
    pub fn rem(&self, other: &FloatingValue<B>) -> FloatingValue<B> {
        self.binary(other, |a, b| a % b)
    }

    pub fn neg(&self) -> FloatingValue<B> {
        match self.particular() {
            Some(a) => FloatingValue::from_float(-a),
            None => FloatingValue::Unknown,
        }
    }

    /// Result of `fcmpl`/`fcmpg` (or `dcmpl`/`dcmpg`)
    pub fn compare(&self, mode: CompareMode, other: &FloatingValue<B>) -> IntValue {
        match (self.particular(), other.particular()) {
            (Some(a), Some(b)) if B::is_nan(a) || B::is_nan(b) => match mode {
                CompareMode::L => IntegerValue::Particular(-1),
                CompareMode::G => IntegerValue::Particular(1),
            },
            (Some(a), Some(b)) if a < b => IntegerValue::Particular(-1),
            (Some(a), Some(b)) if a > b => IntegerValue::Particular(1),
            (Some(_), Some(_)) => IntegerValue::Particular(0),
            _ => IntegerValue::Range(-1, 1),
        }
    }
}

// Float to integer conversions saturate and send `NaN` to 0, exactly like `f2i` and friends

impl FloatValue {
    pub fn to_int(&self) -> IntValue {
        self.particular()
            .map_or(IntegerValue::Unknown, |a| IntegerValue::Particular(a as i32))
    }

    pub fn to_long(&self) -> LongValue {
        self.particular()
            .map_or(IntegerValue::Unknown, |a| IntegerValue::Particular(a as i64))
    }

    pub fn to_double(&self) -> DoubleValue {
        self.particular()
            .map_or(FloatingValue::Unknown, |a| FloatingValue::from_float(a as f64))
    }
}

impl DoubleValue {
    pub fn to_int(&self) -> IntValue {
        self.particular()
            .map_or(IntegerValue::Unknown, |a| IntegerValue::Particular(a as i32))
    }

    pub fn to_long(&self) -> LongValue {
        self.particular()
            .map_or(IntegerValue::Unknown, |a| IntegerValue::Particular(a as i64))
    }

    pub fn to_float(&self) -> FloatValue {
        self.particular()
            .map_or(FloatingValue::Unknown, |a| FloatingValue::from_float(a as f32))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn join_by_bits() {
        let zero = FloatValue::from_float(0.0);
        let negative_zero = FloatValue::from_float(-0.0);
        let nan = FloatValue::from_float(f32::NAN);
        assert_eq!(zero.generalize(&zero), zero);
        assert_eq!(nan.generalize(&nan), nan);
        assert_eq!(zero.generalize(&negative_zero), FloatingValue::Unknown);
    }

    #[test]
    fn arithmetic() {
        let x = DoubleValue::from_float(7.5);
        let y = DoubleValue::from_float(2.0);
        assert_eq!(x.add(&y), DoubleValue::from_float(9.5));
        assert_eq!(x.rem(&y), DoubleValue::from_float(1.5));
        assert_eq!(x.neg(), DoubleValue::from_float(-7.5));
        assert_eq!(x.div(&DoubleValue::Unknown), FloatingValue::Unknown);
        assert_eq!(
            x.div(&DoubleValue::from_float(0.0)),
            DoubleValue::from_float(f64::INFINITY)
        );
    }

    #[test]
    fn nan_comparisons() {
        let one = FloatValue::from_float(1.0);
        let nan = FloatValue::from_float(f32::NAN);
        assert_eq!(one.compare(CompareMode::L, &nan), IntegerValue::Particular(-1));
        assert_eq!(one.compare(CompareMode::G, &nan), IntegerValue::Particular(1));
        assert_eq!(one.compare(CompareMode::G, &one), IntegerValue::Particular(0));
        assert_eq!(
            one.compare(CompareMode::L, &FloatValue::Unknown),
            IntegerValue::Range(-1, 1)
        );
    }

    #[test]
    fn saturating_conversions() {
        assert_eq!(
            FloatValue::from_float(1e20).to_int(),
            IntegerValue::Particular(i32::MAX)
        );
        assert_eq!(
            DoubleValue::from_float(f64::NAN).to_long(),
            IntegerValue::Particular(0)
        );
        assert_eq!(
            DoubleValue::from_float(-3.9).to_int(),
            IntegerValue::Particular(-3)
        );
        assert_eq!(
            FloatValue::from_float(0.5).to_double(),
            DoubleValue::from_float(0.5)
        );
    }
}
