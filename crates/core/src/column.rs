//! Column storage.
//!
//! A `Column` is a dense vector of scalars of one data type plus a per-cell
//! status. The status distinguishes a cell that was never set (`Invalid`) from
//! one that was explicitly cleared (`Clear`); update batches rely on this to
//! tell "leave as is" apart from "set to null".

use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::types::DataType;
use crate::vocab::Vocab;
use alloc::vec::Vec;

/// Per-cell status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Never set in this table.
    #[default]
    Invalid,
    /// Holds a value.
    Valid,
    /// Explicitly cleared.
    Clear,
}

static NONE: Scalar = Scalar::None;

/// A typed column of scalars.
#[derive(Clone, Debug)]
pub struct Column {
    dtype: DataType,
    values: Vec<Scalar>,
    status: Vec<Status>,
    vocab: Option<Vocab>,
}

impl Column {
    /// Creates an empty column.
    pub fn new(dtype: DataType) -> Self {
        Self::with_len(dtype, 0)
    }

    /// Creates a column of `len` unset cells.
    pub fn with_len(dtype: DataType, len: usize) -> Self {
        Self {
            dtype,
            values: alloc::vec![Scalar::None; len],
            status: alloc::vec![Status::Invalid; len],
            vocab: (dtype == DataType::Str).then(Vocab::new),
        }
    }

    /// Returns the data type.
    #[inline]
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Returns the number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the column has no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the string vocabulary of a `Str` column.
    pub fn vocab(&self) -> Option<&Vocab> {
        self.vocab.as_ref()
    }

    /// Gets the value at `idx`; unset, cleared and out-of-range cells read as `None`.
    #[inline]
    pub fn get(&self, idx: usize) -> &Scalar {
        self.values.get(idx).unwrap_or(&NONE)
    }

    /// Gets the status at `idx`; out-of-range cells are `Invalid`.
    #[inline]
    pub fn status(&self, idx: usize) -> Status {
        self.status.get(idx).copied().unwrap_or(Status::Invalid)
    }

    /// Returns true if the cell holds a value.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        self.status(idx) == Status::Valid
    }

    /// Grows the column to at least `len` cells, padding with unset cells.
    pub fn extend_to(&mut self, len: usize) {
        if len > self.values.len() {
            self.values.resize(len, Scalar::None);
            self.status.resize(len, Status::Invalid);
        }
    }

    /// Reserves capacity for `additional` more cells.
    pub fn reserve(&mut self, additional: usize) {
        self.values.reserve(additional);
        self.status.reserve(additional);
    }

    /// Sets the value at `idx`, checking its type.
    ///
    /// `Scalar::None` marks the cell as explicitly cleared.
    pub fn try_assign(&mut self, idx: usize, value: Scalar) -> Result<()> {
        if value.is_valid() && value.data_type() != self.dtype {
            return Err(Error::type_mismatch(self.dtype, value.data_type()));
        }
        self.extend_to(idx + 1);
        match value {
            Scalar::None => {
                self.values[idx] = Scalar::None;
                self.status[idx] = Status::Clear;
            }
            Scalar::Str(s) => {
                let shared = match self.vocab.as_mut() {
                    Some(vocab) => vocab.intern_shared(&s),
                    None => s,
                };
                self.values[idx] = Scalar::Str(shared);
                self.status[idx] = Status::Valid;
            }
            other => {
                self.values[idx] = other;
                self.status[idx] = Status::Valid;
            }
        }
        Ok(())
    }

    /// Sets the value at `idx`.
    ///
    /// # Panics
    ///
    /// Panics when the value's type does not match the column type; internal
    /// copies between columns of one schema never do.
    pub fn assign(&mut self, idx: usize, value: Scalar) {
        let got = value.data_type();
        if let Err(err) = self.try_assign(idx, value) {
            panic!("column assign at row {} with {}: {}", idx, got.name(), err);
        }
    }

    /// Marks the cell as explicitly cleared.
    pub fn clear(&mut self, idx: usize) {
        self.extend_to(idx + 1);
        self.values[idx] = Scalar::None;
        self.status[idx] = Status::Clear;
    }

    /// Marks the cell as never set.
    pub fn unset(&mut self, idx: usize) {
        self.extend_to(idx + 1);
        self.values[idx] = Scalar::None;
        self.status[idx] = Status::Invalid;
    }

    /// Copies one cell (value and status) from another column of the same type.
    ///
    /// # Panics
    ///
    /// Panics on a dtype mismatch.
    pub fn copy_cell(&mut self, dst: usize, src: &Column, src_idx: usize) {
        assert_eq!(
            self.dtype, src.dtype,
            "dtype mismatch on column copy: {} <- {}",
            self.dtype.name(),
            src.dtype.name()
        );
        match src.status(src_idx) {
            Status::Valid => self.assign(dst, src.get(src_idx).clone()),
            Status::Clear => self.clear(dst),
            Status::Invalid => self.unset(dst),
        }
    }

    /// Returns a new column holding the cells whose mask entry is true.
    ///
    /// # Panics
    ///
    /// Panics if `mask.len()` differs from the column length.
    pub fn clone_with_mask(&self, mask: &[bool]) -> Column {
        assert_eq!(mask.len(), self.len(), "mask length must match column length");
        let kept = mask.iter().filter(|m| **m).count();
        let mut out = Column {
            dtype: self.dtype,
            values: Vec::with_capacity(kept),
            status: Vec::with_capacity(kept),
            vocab: self.vocab.clone(),
        };
        for (idx, keep) in mask.iter().enumerate() {
            if *keep {
                out.values.push(self.values[idx].clone());
                out.status.push(self.status[idx]);
            }
        }
        out
    }

    /// Resets every cell to unset without changing the length.
    pub fn reset(&mut self) {
        for v in self.values.iter_mut() {
            *v = Scalar::None;
        }
        for s in self.status.iter_mut() {
            *s = Status::Invalid;
        }
    }
}
