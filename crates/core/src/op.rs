//! Row operation codes carried by update batches.

use crate::scalar::Scalar;

/// Operation applied to a primary key within an update batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Op {
    /// Insert a new row or update an existing one.
    #[default]
    Insert = 0,
    /// Delete the row.
    Delete = 1,
}

impl Op {
    /// Returns the wire code of this op.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decodes an op code.
    ///
    /// # Panics
    ///
    /// Panics on any code other than insert or delete.
    pub fn from_code(code: u8) -> Op {
        match code {
            0 => Op::Insert,
            1 => Op::Delete,
            other => panic!("unexpected op code {}", other),
        }
    }

    /// Decodes an op stored in a `UInt8` op column.
    ///
    /// # Panics
    ///
    /// Panics if the scalar is not a valid op code.
    pub fn from_scalar(value: &Scalar) -> Op {
        match value {
            Scalar::UInt8(code) => Op::from_code(*code),
            other => panic!("unexpected op cell {:?}", other),
        }
    }

    /// Encodes this op as a scalar for an op column.
    #[inline]
    pub fn to_scalar(self) -> Scalar {
        Scalar::UInt8(self.code())
    }
}
