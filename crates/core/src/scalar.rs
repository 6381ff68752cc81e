//! Scalar type definitions for Strata.
//!
//! This module defines the `Scalar` enum which represents any value that can be
//! stored in a table cell, used as a pivot value, or produced by an aggregate.

use crate::types::DataType;
use alloc::string::String;
use alloc::sync::Arc;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// A value that can be stored in a table cell.
///
/// Equality is strict per variant (`Int32(1) != Int64(1)`); ordering compares
/// numeric variants by value and falls back to the variant order, so two
/// scalars compare `Equal` only when they are also `==`.
#[derive(Clone, Debug, Default)]
pub enum Scalar {
    /// Missing / invalid value
    #[default]
    None,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    /// Interned string; clones share the allocation
    Str(Arc<str>),
    /// Days since the Unix epoch
    Date(i32),
    /// Milliseconds since the Unix epoch
    Time(i64),
}

impl Scalar {
    /// Returns the data type of this scalar.
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::None => DataType::None,
            Scalar::Int8(_) => DataType::Int8,
            Scalar::Int16(_) => DataType::Int16,
            Scalar::Int32(_) => DataType::Int32,
            Scalar::Int64(_) => DataType::Int64,
            Scalar::UInt8(_) => DataType::UInt8,
            Scalar::UInt16(_) => DataType::UInt16,
            Scalar::UInt32(_) => DataType::UInt32,
            Scalar::UInt64(_) => DataType::UInt64,
            Scalar::Float32(_) => DataType::Float32,
            Scalar::Float64(_) => DataType::Float64,
            Scalar::Bool(_) => DataType::Bool,
            Scalar::Str(_) => DataType::Str,
            Scalar::Date(_) => DataType::Date,
            Scalar::Time(_) => DataType::Time,
        }
    }

    /// Returns true unless this is `Scalar::None`.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Scalar::None)
    }

    /// Returns true if this is `Scalar::None`.
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Scalar::None)
    }

    /// Returns the integer value widened to `i128`, for integer variants.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Scalar::Int8(v) => Some(*v as i128),
            Scalar::Int16(v) => Some(*v as i128),
            Scalar::Int32(v) => Some(*v as i128),
            Scalar::Int64(v) => Some(*v as i128),
            Scalar::UInt8(v) => Some(*v as i128),
            Scalar::UInt16(v) => Some(*v as i128),
            Scalar::UInt32(v) => Some(*v as i128),
            Scalar::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Returns the value as `f64` for numeric variants.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float32(v) => Some(*v as f64),
            Scalar::Float64(v) => Some(*v),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Returns the boolean value if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string slice if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true for integer and floating point variants.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.data_type().is_numeric()
    }

    /// Widens a numeric scalar to its delta representation (`Int64` or `Float64`).
    ///
    /// Non-numeric scalars widen to `None`.
    pub fn widen(&self) -> Scalar {
        match self {
            Scalar::Float32(v) => Scalar::Float64(*v as f64),
            Scalar::Float64(v) => Scalar::Float64(*v),
            other => match other.as_i128() {
                Some(v) => Scalar::Int64(clamp_i64(v)),
                None => Scalar::None,
            },
        }
    }

    /// Computes `self - prev` on widened values; `None` when either side is not numeric.
    pub fn difference(&self, prev: &Scalar) -> Scalar {
        match (self.widen(), prev.widen()) {
            (Scalar::Int64(a), Scalar::Int64(b)) => Scalar::Int64(clamp_i64(a as i128 - b as i128)),
            (a, b) => match (a.to_f64(), b.to_f64()) {
                (Some(a), Some(b)) => Scalar::Float64(a - b),
                _ => Scalar::None,
            },
        }
    }

    /// Returns the widened negation of a numeric scalar.
    pub fn negate(&self) -> Scalar {
        match self.widen() {
            Scalar::Int64(v) => Scalar::Int64(v.saturating_neg()),
            Scalar::Float64(v) => Scalar::Float64(-v),
            _ => Scalar::None,
        }
    }

    /// Returns the absolute value of a numeric scalar, keeping its variant.
    ///
    /// Non-numeric scalars are returned unchanged.
    pub fn abs(&self) -> Scalar {
        match self {
            Scalar::Int8(v) => Scalar::Int8(v.saturating_abs()),
            Scalar::Int16(v) => Scalar::Int16(v.saturating_abs()),
            Scalar::Int32(v) => Scalar::Int32(v.saturating_abs()),
            Scalar::Int64(v) => Scalar::Int64(v.saturating_abs()),
            Scalar::Float32(v) => Scalar::Float32(libm::fabsf(*v)),
            Scalar::Float64(v) => Scalar::Float64(libm::fabs(*v)),
            other => other.clone(),
        }
    }

    /// Adds two widened numeric scalars. `None` is the identity.
    pub fn add(&self, other: &Scalar) -> Scalar {
        match (self.widen(), other.widen()) {
            (Scalar::None, b) => b,
            (a, Scalar::None) => a,
            (Scalar::Int64(a), Scalar::Int64(b)) => Scalar::Int64(clamp_i64(a as i128 + b as i128)),
            (a, b) => match (a.to_f64(), b.to_f64()) {
                (Some(a), Some(b)) => Scalar::Float64(a + b),
                _ => Scalar::None,
            },
        }
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Scalar::None => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int8(_) => 2,
            Scalar::Int16(_) => 3,
            Scalar::Int32(_) => 4,
            Scalar::Int64(_) => 5,
            Scalar::UInt8(_) => 6,
            Scalar::UInt16(_) => 7,
            Scalar::UInt32(_) => 8,
            Scalar::UInt64(_) => 9,
            Scalar::Float32(_) => 10,
            Scalar::Float64(_) => 11,
            Scalar::Date(_) => 12,
            Scalar::Time(_) => 13,
            Scalar::Str(_) => 14,
        }
    }
}

fn clamp_i64(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Total order over floats: NaN sorts above every number, `-0.0 == 0.0`.
fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Bit pattern used for hashing floats: all NaNs and both zeros collapse.
fn canonical_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::None, Scalar::None) => true,
            (Scalar::Int8(a), Scalar::Int8(b)) => a == b,
            (Scalar::Int16(a), Scalar::Int16(b)) => a == b,
            (Scalar::Int32(a), Scalar::Int32(b)) => a == b,
            (Scalar::Int64(a), Scalar::Int64(b)) => a == b,
            (Scalar::UInt8(a), Scalar::UInt8(b)) => a == b,
            (Scalar::UInt16(a), Scalar::UInt16(b)) => a == b,
            (Scalar::UInt32(a), Scalar::UInt32(b)) => a == b,
            (Scalar::UInt64(a), Scalar::UInt64(b)) => a == b,
            (Scalar::Float32(a), Scalar::Float32(b)) => {
                cmp_f64(*a as f64, *b as f64) == Ordering::Equal
            }
            (Scalar::Float64(a), Scalar::Float64(b)) => cmp_f64(*a, *b) == Ordering::Equal,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::Date(a), Scalar::Date(b)) => a == b,
            (Scalar::Time(a), Scalar::Time(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Scalar::None => {}
            Scalar::Int8(v) => v.hash(state),
            Scalar::Int16(v) => v.hash(state),
            Scalar::Int32(v) => v.hash(state),
            Scalar::Int64(v) => v.hash(state),
            Scalar::UInt8(v) => v.hash(state),
            Scalar::UInt16(v) => v.hash(state),
            Scalar::UInt32(v) => v.hash(state),
            Scalar::UInt64(v) => v.hash(state),
            Scalar::Float32(v) => canonical_bits(*v as f64).hash(state),
            Scalar::Float64(v) => canonical_bits(*v).hash(state),
            Scalar::Bool(v) => v.hash(state),
            Scalar::Str(v) => v.hash(state),
            Scalar::Date(v) => v.hash(state),
            Scalar::Time(v) => v.hash(state),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_value = match (self, other) {
            (Scalar::None, Scalar::None) => Ordering::Equal,
            (Scalar::None, _) => Ordering::Less,
            (_, Scalar::None) => Ordering::Greater,
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
            (Scalar::Date(a), Scalar::Date(b)) => a.cmp(b),
            (Scalar::Time(a), Scalar::Time(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_i128(), b.as_i128()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => cmp_f64(a.to_f64().unwrap_or(f64::NAN), b.to_f64().unwrap_or(f64::NAN)),
            },
            _ => Ordering::Equal,
        };
        // Same value across different variants: fall back to the variant order
        by_value.then_with(|| self.type_order().cmp(&other.type_order()))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::None => f.write_str("null"),
            Scalar::Int8(v) => write!(f, "{}", v),
            Scalar::Int16(v) => write!(f, "{}", v),
            Scalar::Int32(v) => write!(f, "{}", v),
            Scalar::Int64(v) => write!(f, "{}", v),
            Scalar::UInt8(v) => write!(f, "{}", v),
            Scalar::UInt16(v) => write!(f, "{}", v),
            Scalar::UInt32(v) => write!(f, "{}", v),
            Scalar::UInt64(v) => write!(f, "{}", v),
            Scalar::Float32(v) => write!(f, "{}", v),
            Scalar::Float64(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Str(v) => f.write_str(v),
            Scalar::Date(v) => write!(f, "date({})", v),
            Scalar::Time(v) => write!(f, "time({})", v),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int64(v)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::UInt32(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::UInt64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float64(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(Arc::from(v))
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(Arc::from(v))
    }
}

impl From<Arc<str>> for Scalar {
    fn from(v: Arc<str>) -> Self {
        Scalar::Str(v)
    }
}

impl<T> From<Option<T>> for Scalar
where
    T: Into<Scalar>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Scalar::None,
        }
    }
}
