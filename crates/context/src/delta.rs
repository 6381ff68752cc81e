//! Change reports drained from a context after a cycle.

use alloc::vec::Vec;
use strata_core::Scalar;

/// One changed cell in view coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellChange {
    pub row: usize,
    pub column: usize,
    pub old: Scalar,
    pub new: Scalar,
}

/// Cell-level changes of a visible-row window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepDelta {
    /// Rows were added, removed or reordered since the last drain.
    pub rows_changed: bool,
    /// The column set changed since the last drain.
    pub columns_changed: bool,
    /// Changed cells, ordered by row then column.
    pub cells: Vec<CellChange>,
}

impl StepDelta {
    /// Creates an empty delta.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing changed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.rows_changed && !self.columns_changed && self.cells.is_empty()
    }

    /// Returns the number of changed cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Records a changed cell.
    #[inline]
    pub fn push(&mut self, row: usize, column: usize, old: Scalar, new: Scalar) {
        self.cells.push(CellChange { row, column, old, new });
    }

    /// Sorts cells by row then column.
    pub(crate) fn sort(&mut self) {
        self.cells.sort_by(|a, b| (a.row, a.column).cmp(&(b.row, b.column)));
    }
}

/// Row-level changes: the indices of changed rows and their full data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowDelta {
    /// Rows were added, removed or reordered since the last drain.
    pub rows_changed: bool,
    /// Ascending indices of rows with changed cells.
    pub rows: Vec<usize>,
    /// Full data of each row in `rows`.
    pub data: Vec<Vec<Scalar>>,
}

impl RowDelta {
    /// Returns true if nothing changed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.rows_changed && self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_delta_sort() {
        let mut d = StepDelta::new();
        assert!(d.is_empty());
        d.push(3, 1, Scalar::Int64(1), Scalar::Int64(2));
        d.push(1, 2, Scalar::None, Scalar::Int64(5));
        d.push(1, 1, Scalar::Int64(0), Scalar::None);
        d.sort();
        let order: Vec<(usize, usize)> = d.cells.iter().map(|c| (c.row, c.column)).collect();
        assert_eq!(order, alloc::vec![(1, 1), (1, 2), (3, 1)]);
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn test_row_delta_empty() {
        let mut d = RowDelta::default();
        assert!(d.is_empty());
        d.rows_changed = true;
        assert!(!d.is_empty());
    }
}
