//! Columnar tables.
//!
//! A `Table` is a schema plus one `Column` per schema entry, all of the same
//! length. Master state, update batches and the per-cycle step relations are
//! all tables.

use crate::column::{Column, Status};
use crate::scalar::Scalar;
use crate::schema::Schema;
use crate::types::DataType;
use alloc::vec::Vec;

/// A set of equally sized, named columns.
#[derive(Clone, Debug)]
pub struct Table {
    schema: Schema,
    columns: Vec<Column>,
    size: usize,
}

impl Table {
    /// Creates an empty table for the schema.
    pub fn new(schema: Schema) -> Self {
        Self::with_size(schema, 0)
    }

    /// Creates a table of `size` unset rows.
    pub fn with_size(schema: Schema, size: usize) -> Self {
        let columns = schema
            .types()
            .iter()
            .map(|&dtype| Column::with_len(dtype, size))
            .collect();
        Self { schema, columns, size }
    }

    /// Assembles a table from prebuilt columns.
    ///
    /// # Panics
    ///
    /// Panics if the column count, types or lengths disagree with the schema.
    pub fn from_columns(schema: Schema, columns: Vec<Column>) -> Self {
        assert_eq!(schema.len(), columns.len(), "column count must match schema");
        let size = columns.first().map(|c| c.len()).unwrap_or(0);
        for (col, dtype) in columns.iter().zip(schema.types()) {
            assert_eq!(col.dtype(), *dtype, "column dtype must match schema");
            assert_eq!(col.len(), size, "columns must be equally sized");
        }
        Self { schema, columns, size }
    }

    /// Returns the schema.
    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.size
    }

    /// Number of columns.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Gets a column by position.
    #[inline]
    pub fn column_at(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    /// Gets a mutable column by position.
    #[inline]
    pub fn column_at_mut(&mut self, idx: usize) -> &mut Column {
        &mut self.columns[idx]
    }

    /// Gets a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.index_of(name).map(|i| &self.columns[i])
    }

    /// Gets a mutable column by name.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.schema.index_of(name).map(move |i| &mut self.columns[i])
    }

    /// Returns all columns.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns all columns mutably; callers must keep their lengths equal.
    #[inline]
    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    /// Gets a cell by column position and row.
    #[inline]
    pub fn get(&self, col: usize, row: usize) -> &Scalar {
        self.columns[col].get(row)
    }

    /// Gets a cell's status by column position and row.
    #[inline]
    pub fn status(&self, col: usize, row: usize) -> Status {
        self.columns[col].status(row)
    }

    /// Sets a cell by column position and row, growing the table if needed.
    pub fn set(&mut self, col: usize, row: usize, value: Scalar) {
        self.set_size(self.size.max(row + 1));
        self.columns[col].assign(row, value);
    }

    /// Resizes every column to `size` rows (never shrinks storage).
    pub fn set_size(&mut self, size: usize) {
        for col in self.columns.iter_mut() {
            col.extend_to(size);
        }
        self.size = size.max(self.size);
    }

    /// Reserves storage for `additional` more rows.
    pub fn reserve(&mut self, additional: usize) {
        for col in self.columns.iter_mut() {
            col.reserve(additional);
        }
    }

    /// Appends an unset row and returns its index.
    pub fn push_row(&mut self) -> usize {
        let idx = self.size;
        self.set_size(idx + 1);
        idx
    }

    /// Clears every cell of a row back to unset.
    pub fn unset_row(&mut self, row: usize) {
        for col in self.columns.iter_mut() {
            col.unset(row);
        }
    }

    /// Returns a row as a vector of scalars.
    pub fn row(&self, row: usize) -> Vec<Scalar> {
        self.columns.iter().map(|c| c.get(row).clone()).collect()
    }

    /// Returns a new table with only the rows whose mask entry is true.
    pub fn clone_with_mask(&self, mask: &[bool]) -> Table {
        assert_eq!(mask.len(), self.size, "mask length must match table size");
        let columns: Vec<Column> = self.columns.iter().map(|c| c.clone_with_mask(mask)).collect();
        let size = mask.iter().filter(|m| **m).count();
        Table {
            schema: self.schema.clone(),
            columns,
            size,
        }
    }

    /// Returns the data type of a named column.
    pub fn dtype_of(&self, name: &str) -> Option<DataType> {
        self.schema.type_of(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn schema() -> Schema {
        Schema::new(vec![("id".into(), DataType::Int64), ("amt".into(), DataType::Float64)])
    }

    #[test]
    fn test_set_grows_table() {
        let mut t = Table::new(schema());
        t.set(0, 2, Scalar::Int64(3));
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.get(0, 2), &Scalar::Int64(3));
        assert_eq!(t.status(1, 2), Status::Invalid);
        assert_eq!(t.column("amt").map(|c| c.len()), Some(3));
    }

    #[test]
    fn test_row_and_mask() {
        let mut t = Table::new(schema());
        for i in 0..3 {
            t.set(0, i, Scalar::Int64(i as i64));
            t.set(1, i, Scalar::Float64(i as f64 * 10.0));
        }
        let masked = t.clone_with_mask(&[false, true, true]);
        assert_eq!(masked.num_rows(), 2);
        assert_eq!(masked.row(0), vec![Scalar::Int64(1), Scalar::Float64(10.0)]);
    }

    #[test]
    fn test_push_and_unset_row() {
        let mut t = Table::new(schema());
        let r = t.push_row();
        t.set(1, r, Scalar::Float64(1.0));
        t.unset_row(r);
        assert_eq!(t.status(1, r), Status::Invalid);
        assert_eq!(t.num_rows(), 1);
    }
}
