//! Update batches.
//!
//! An `UpdateBatch` is a table with the data schema plus the `__op` column.
//! Each row is one op on one pkey; cells that are not mentioned stay unset so
//! the master keeps its current value for them.

use alloc::format;
use strata_core::{DataType, Error, Op, Result, Scalar, Schema, Status, Table, OP_COLUMN};

/// A batch of ops against one schema.
#[derive(Clone, Debug)]
pub struct UpdateBatch {
    table: Table,
    pkey_idx: usize,
    op_idx: usize,
}

impl UpdateBatch {
    /// Creates an empty batch for `schema`, keyed by `pkey_column`.
    pub fn new(schema: &Schema, pkey_column: &str) -> Result<Self> {
        let pkey_idx = schema
            .index_of(pkey_column)
            .ok_or_else(|| Error::column_not_found("batch", pkey_column))?;
        let op_idx = schema.len();
        Ok(Self {
            table: Table::new(schema.with_column(OP_COLUMN, DataType::UInt8)),
            pkey_idx,
            op_idx,
        })
    }

    /// Number of ops in the batch.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }

    /// Returns true if the batch holds no ops.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of data columns (the op column excluded).
    #[inline]
    pub fn num_data_columns(&self) -> usize {
        self.op_idx
    }

    /// Position of the pkey column.
    #[inline]
    pub fn pkey_index(&self) -> usize {
        self.pkey_idx
    }

    /// Returns the underlying table.
    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Consumes the batch, returning the underlying table.
    pub fn into_table(self) -> Table {
        self.table
    }

    /// Returns the op of a row.
    pub fn op(&self, row: usize) -> Op {
        Op::from_scalar(self.table.get(self.op_idx, row))
    }

    /// Returns the pkey of a row.
    pub fn pkey(&self, row: usize) -> &Scalar {
        self.table.get(self.pkey_idx, row)
    }

    fn push(&mut self, op: Op, pkey: Scalar) -> Result<usize> {
        if !pkey.is_valid() {
            return Err(Error::invalid_operation("pkey must not be null"));
        }
        let expected = self.table.schema().types()[self.pkey_idx];
        if pkey.data_type() != expected {
            return Err(Error::type_mismatch(expected, pkey.data_type()));
        }
        let row = self.table.push_row();
        self.table.column_at_mut(self.pkey_idx).assign(row, pkey);
        self.table.column_at_mut(self.op_idx).assign(row, op.to_scalar());
        Ok(row)
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        match self.table.schema().index_of(name) {
            Some(idx) if idx != self.op_idx => Ok(idx),
            _ => Err(Error::column_not_found("batch", name)),
        }
    }

    /// Inserts a full row, in schema order. `Scalar::None` cells are left unset.
    pub fn insert(&mut self, values: &[Scalar]) -> Result<()> {
        if values.len() != self.op_idx {
            return Err(Error::invalid_operation(format!(
                "insert expects {} values, got {}",
                self.op_idx,
                values.len()
            )));
        }
        self.check_types(values.iter().enumerate())?;
        let row = self.push(Op::Insert, values[self.pkey_idx].clone())?;
        for (col, value) in values.iter().enumerate() {
            if col != self.pkey_idx && value.is_valid() {
                self.table.column_at_mut(col).assign(row, value.clone());
            }
        }
        Ok(())
    }

    /// Sets some cells of a pkey, leaving every other cell unset.
    ///
    /// A `Scalar::None` value clears the cell.
    pub fn update(&mut self, pkey: impl Into<Scalar>, cells: &[(&str, Scalar)]) -> Result<()> {
        let mut resolved = alloc::vec::Vec::with_capacity(cells.len());
        for (name, value) in cells {
            resolved.push((self.column_index(name)?, value));
        }
        self.check_types(resolved.iter().map(|(c, v)| (*c, *v)))?;
        let row = self.push(Op::Insert, pkey.into())?;
        for (col, value) in resolved {
            if col != self.pkey_idx {
                self.table.column_at_mut(col).assign(row, value.clone());
            }
        }
        Ok(())
    }

    /// Explicitly clears one cell of a pkey.
    pub fn clear(&mut self, pkey: impl Into<Scalar>, column: &str) -> Result<()> {
        let col = self.column_index(column)?;
        if col == self.pkey_idx {
            return Err(Error::invalid_operation("cannot clear the pkey column"));
        }
        let row = self.push(Op::Insert, pkey.into())?;
        self.table.column_at_mut(col).clear(row);
        Ok(())
    }

    /// Deletes a pkey.
    pub fn delete(&mut self, pkey: impl Into<Scalar>) -> Result<()> {
        self.push(Op::Delete, pkey.into()).map(|_| ())
    }

    /// Returns the status of a data cell.
    pub fn status(&self, col: usize, row: usize) -> Status {
        self.table.status(col, row)
    }

    fn check_types<'a>(&self, cells: impl Iterator<Item = (usize, &'a Scalar)>) -> Result<()> {
        let types = self.table.schema().types();
        for (col, value) in cells {
            if value.is_valid() && value.data_type() != types[col] {
                return Err(Error::type_mismatch(types[col], value.data_type()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn schema() -> Schema {
        Schema::new(vec![
            ("id".into(), DataType::Int64),
            ("cat".into(), DataType::Str),
            ("amt".into(), DataType::Float64),
        ])
    }

    #[test]
    fn test_insert_and_partial_update() {
        let mut batch = UpdateBatch::new(&schema(), "id").unwrap();
        batch
            .insert(&[Scalar::Int64(1), Scalar::from("A"), Scalar::Float64(5.0)])
            .unwrap();
        batch.update(1i64, &[("amt", Scalar::Float64(6.0))]).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.op(1), Op::Insert);
        assert_eq!(batch.status(1, 1), Status::Invalid);
        assert_eq!(batch.table().get(2, 1), &Scalar::Float64(6.0));
    }

    #[test]
    fn test_clear_and_delete() {
        let mut batch = UpdateBatch::new(&schema(), "id").unwrap();
        batch.clear(2i64, "amt").unwrap();
        batch.delete(3i64).unwrap();
        assert_eq!(batch.status(2, 0), Status::Clear);
        assert_eq!(batch.op(1), Op::Delete);
        assert_eq!(batch.pkey(1), &Scalar::Int64(3));
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut batch = UpdateBatch::new(&schema(), "id").unwrap();
        assert!(batch.insert(&[Scalar::Int64(1)]).is_err());
        assert!(batch.update(1i64, &[("missing", Scalar::Int64(1))]).is_err());
        assert!(batch.update(1i64, &[("amt", Scalar::from("x"))]).is_err());
        assert!(batch.update(1i64, &[(OP_COLUMN, Scalar::UInt8(0))]).is_err());
        assert!(batch.delete(Scalar::None).is_err());
        assert!(batch.delete(Scalar::from("wrong")).is_err());
        assert!(batch.clear(1i64, "id").is_err());
        assert!(batch.is_empty());
        assert!(UpdateBatch::new(&schema(), "nope").is_err());
    }
}
