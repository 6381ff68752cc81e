//! Data type definitions for Strata columns.
//!
//! This module defines the column data types a master table or batch can hold.

/// Supported column data types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit floating point number
    Float32,
    /// 64-bit floating point number
    Float64,
    /// Boolean type (true/false)
    Bool,
    /// Interned UTF-8 string
    Str,
    /// Calendar date stored as days since the Unix epoch
    Date,
    /// Timestamp stored as milliseconds since the Unix epoch
    Time,
    /// Column with no values (placeholder type)
    None,
}

impl DataType {
    /// Returns true for the integer and floating point types.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Returns true for signed and unsigned integer types.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    /// Returns true for unsigned integer types.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        )
    }

    /// Returns true for floating point types.
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Returns the data type used for the delta relation of a column of this type.
    ///
    /// Integers widen to `Int64` (unsigned columns included, so a negated delta
    /// never wraps), floats widen to `Float64`, everything else has no delta.
    pub fn delta_type(&self) -> DataType {
        if self.is_integer() {
            DataType::Int64
        } else if self.is_float() {
            DataType::Float64
        } else {
            DataType::None
        }
    }

    /// Returns a short lowercase name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::Str => "str",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::None => "none",
        }
    }
}
