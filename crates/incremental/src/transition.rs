//! Per-cycle transition classification.
//!
//! Given a flattened batch and the master state *before* it is applied,
//! `StepTables::compute` produces five tables row-aligned with the batch:
//! the previous value of every cell, its value after the cycle, the numeric
//! delta between the two, a transition code, and whether the pkey existed.

use alloc::string::ToString;
use alloc::vec::Vec;
use strata_core::{Column, DataType, Op, Scalar, Schema, Status, Table, OP_COLUMN};
use strata_storage::MasterState;

/// Column name of the single `existed` column.
pub const EXISTED_COLUMN: &str = "existed";

/// How one cell changed in a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Transition {
    /// No value before or after.
    BothInvalid = 0,
    /// Same value before and after.
    Equal = 1,
    /// First value on an existing row.
    FirstSet = 2,
    /// Value changed.
    Changed = 3,
    /// Value explicitly cleared.
    Cleared = 4,
    /// Value on a newly added row.
    NewRow = 5,
    /// Row deleted while the cell had a value.
    Deleted = 6,
}

impl Transition {
    /// Returns the stored code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a stored code.
    ///
    /// # Panics
    ///
    /// Panics on an unknown code.
    pub fn from_code(code: u8) -> Transition {
        match code {
            0 => Transition::BothInvalid,
            1 => Transition::Equal,
            2 => Transition::FirstSet,
            3 => Transition::Changed,
            4 => Transition::Cleared,
            5 => Transition::NewRow,
            6 => Transition::Deleted,
            other => panic!("unexpected transition code {}", other),
        }
    }

    /// Returns true if the visible value of the cell changed.
    pub fn is_change(self) -> bool {
        !matches!(self, Transition::BothInvalid | Transition::Equal)
    }
}

/// The six row-aligned relations of one update cycle.
#[derive(Clone, Debug)]
pub struct StepTables {
    /// The coalesced batch, data columns plus `__op`.
    pub flattened: Table,
    /// Master values before the cycle.
    pub prev: Table,
    /// Master values after the cycle.
    pub current: Table,
    /// `current - prev` for numeric columns (`Int64`/`Float64`).
    pub delta: Table,
    /// Transition codes, one `UInt8` column per data column.
    pub transitions: Table,
    /// One `Bool` column: whether the pkey existed before the cycle.
    pub existed: Table,
    pkey_idx: usize,
    op_idx: usize,
}

impl StepTables {
    /// Classifies `flattened` against `master` before the master is updated.
    pub fn compute(master: &MasterState, flattened: Table) -> StepTables {
        let schema = master.schema().clone();
        let ncols = schema.len();
        let nrows = flattened.num_rows();
        let op_idx = flattened
            .schema()
            .index_of(OP_COLUMN)
            .unwrap_or_else(|| panic!("flattened batch lacks {} column", OP_COLUMN));
        let sources: Vec<usize> = schema
            .names()
            .iter()
            .map(|name| {
                flattened
                    .schema()
                    .index_of(name)
                    .unwrap_or_else(|| panic!("flattened batch lacks column {}", name))
            })
            .collect();

        let mut prev = Table::with_size(schema.clone(), nrows);
        let mut current = Table::with_size(schema.clone(), nrows);
        let mut delta = Table::with_size(delta_schema(&schema), nrows);
        let mut transitions = Table::with_size(transition_schema(&schema), nrows);
        let mut existed = Table::with_size(
            Schema::new(alloc::vec![(EXISTED_COLUMN.to_string(), DataType::Bool)]),
            nrows,
        );

        let master_table = master.table();
        let pkey_src = sources[master.pkey_index()];
        for r in 0..nrows {
            let op = Op::from_scalar(flattened.get(op_idx, r));
            let idx = master.lookup(flattened.get(pkey_src, r));
            existed.set(0, r, Scalar::Bool(idx.is_some()));

            for c in 0..ncols {
                if let Some(idx) = idx {
                    prev.column_at_mut(c).copy_cell(r, master_table.column_at(c), idx);
                }
                let src = flattened.column_at(sources[c]);
                let before = prev.column_at(c);
                let (transition, cell_delta) = match op {
                    Op::Delete => {
                        if before.is_valid(r) {
                            (Transition::Deleted, before.get(r).negate())
                        } else {
                            (Transition::BothInvalid, Scalar::None)
                        }
                    }
                    Op::Insert if idx.is_none() => {
                        current.column_at_mut(c).copy_cell(r, src, r);
                        if src.is_valid(r) {
                            (Transition::NewRow, src.get(r).widen())
                        } else {
                            (Transition::BothInvalid, Scalar::None)
                        }
                    }
                    Op::Insert => classify_existing(before, src, r, current.column_at_mut(c)),
                };
                transitions.set(c, r, Scalar::UInt8(transition.code()));
                if cell_delta.is_valid() && delta.schema().types()[c] != DataType::None {
                    delta.set(c, r, cell_delta);
                }
            }
        }

        let step = StepTables {
            flattened,
            prev,
            current,
            delta,
            transitions,
            existed,
            pkey_idx: pkey_src,
            op_idx,
        };
        step.validate();
        step
    }

    /// Checks that every relation has the flattened batch's row count.
    ///
    /// # Panics
    ///
    /// Panics on misalignment.
    pub fn validate(&self) {
        let n = self.flattened.num_rows();
        for (name, table) in [
            ("prev", &self.prev),
            ("current", &self.current),
            ("delta", &self.delta),
            ("transitions", &self.transitions),
            ("existed", &self.existed),
        ] {
            assert_eq!(
                table.num_rows(),
                n,
                "misaligned step tables: {} has {} rows, flattened has {}",
                name,
                table.num_rows(),
                n
            );
        }
    }

    /// Number of rows in the cycle.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.flattened.num_rows()
    }

    /// Returns true when the cycle carries no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flattened.is_empty()
    }

    /// Op of a row.
    pub fn op(&self, row: usize) -> Op {
        Op::from_scalar(self.flattened.get(self.op_idx, row))
    }

    /// Pkey of a row.
    pub fn pkey(&self, row: usize) -> &Scalar {
        self.flattened.get(self.pkey_idx, row)
    }

    /// Whether the row's pkey existed before the cycle.
    pub fn existed(&self, row: usize) -> bool {
        self.existed.get(0, row).as_bool().unwrap_or(false)
    }

    /// Transition of one cell (column in master schema order).
    pub fn transition(&self, col: usize, row: usize) -> Transition {
        match self.transitions.get(col, row) {
            Scalar::UInt8(code) => Transition::from_code(*code),
            other => panic!("unexpected transition cell {:?}", other),
        }
    }

    /// Returns true if any cell of the row changed value.
    pub fn row_changed(&self, row: usize) -> bool {
        (0..self.transitions.num_columns()).any(|c| self.transition(c, row).is_change())
    }

    /// Returns true if the given column changed in any row.
    pub fn column_changed(&self, col: usize) -> bool {
        (0..self.num_rows()).any(|r| self.transition(col, r).is_change())
    }
}

fn classify_existing(
    before: &Column,
    src: &Column,
    r: usize,
    after: &mut Column,
) -> (Transition, Scalar) {
    match src.status(r) {
        Status::Invalid => {
            after.copy_cell(r, before, r);
            if before.is_valid(r) {
                (Transition::Equal, Scalar::None)
            } else {
                (Transition::BothInvalid, Scalar::None)
            }
        }
        Status::Clear => {
            after.clear(r);
            if before.is_valid(r) {
                (Transition::Cleared, before.get(r).negate())
            } else {
                (Transition::BothInvalid, Scalar::None)
            }
        }
        Status::Valid => {
            after.copy_cell(r, src, r);
            let value = src.get(r);
            if !before.is_valid(r) {
                (Transition::FirstSet, value.widen())
            } else if before.get(r) == value {
                (Transition::Equal, Scalar::None)
            } else {
                (Transition::Changed, value.difference(before.get(r)))
            }
        }
    }
}

fn delta_schema(schema: &Schema) -> Schema {
    Schema::new(
        schema
            .iter()
            .map(|(name, dtype)| (name.to_string(), dtype.delta_type()))
            .collect(),
    )
}

fn transition_schema(schema: &Schema) -> Schema {
    Schema::new(
        schema
            .names()
            .iter()
            .map(|name| (name.clone(), DataType::UInt8))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Port;
    use alloc::vec;

    fn schema() -> Schema {
        Schema::new(vec![
            ("id".into(), DataType::Int64),
            ("cat".into(), DataType::Str),
            ("amt".into(), DataType::Float64),
            ("qty".into(), DataType::UInt32),
        ])
    }

    fn seeded() -> (MasterState, Port) {
        let mut master = MasterState::new(schema(), "id").unwrap();
        let mut port = Port::new(schema(), "id").unwrap();
        let mut b = port.batch();
        b.insert(&[Scalar::Int64(1), Scalar::from("A"), Scalar::Float64(5.0), Scalar::UInt32(3)])
            .unwrap();
        b.insert(&[Scalar::Int64(2), Scalar::from("B"), Scalar::None, Scalar::UInt32(4)])
            .unwrap();
        port.send(b).unwrap();
        master.fill_master_table(&port.flatten());
        (master, port)
    }

    #[test]
    fn test_changed_first_set_and_equal() {
        let (master, mut port) = seeded();
        let mut b = port.batch();
        b.update(1i64, &[("amt", Scalar::Float64(15.0)), ("cat", Scalar::from("A"))])
            .unwrap();
        b.update(2i64, &[("amt", Scalar::Float64(1.5))]).unwrap();
        port.send(b).unwrap();
        let step = StepTables::compute(&master, port.flatten());

        assert!(step.existed(0));
        assert_eq!(step.transition(2, 0), Transition::Changed);
        assert_eq!(step.delta.get(2, 0), &Scalar::Float64(10.0));
        assert_eq!(step.transition(1, 0), Transition::Equal);
        // unset cells carry the previous value forward
        assert_eq!(step.transition(3, 0), Transition::Equal);
        assert_eq!(step.current.get(3, 0), &Scalar::UInt32(3));
        assert_eq!(step.transition(2, 1), Transition::FirstSet);
        assert_eq!(step.delta.get(2, 1), &Scalar::Float64(1.5));
        assert!(step.row_changed(0));
        assert!(!step.column_changed(1));
    }

    #[test]
    fn test_new_row_delete_and_clear() {
        let (master, mut port) = seeded();
        let mut b = port.batch();
        b.insert(&[Scalar::Int64(3), Scalar::from("C"), Scalar::Float64(2.0), Scalar::None])
            .unwrap();
        b.delete(1i64).unwrap();
        b.clear(2i64, "qty").unwrap();
        port.send(b).unwrap();
        let step = StepTables::compute(&master, port.flatten());

        assert!(!step.existed(0));
        assert_eq!(step.transition(2, 0), Transition::NewRow);
        assert_eq!(step.transition(3, 0), Transition::BothInvalid);

        assert_eq!(step.op(1), Op::Delete);
        assert_eq!(step.transition(2, 1), Transition::Deleted);
        assert_eq!(step.delta.get(2, 1), &Scalar::Float64(-5.0));
        assert_eq!(step.prev.get(1, 1), &Scalar::from("A"));
        assert_eq!(step.current.status(2, 1), Status::Invalid);

        // unsigned deltas widen to Int64 rather than wrapping
        assert_eq!(step.transition(3, 2), Transition::Cleared);
        assert_eq!(step.delta.get(3, 2), &Scalar::Int64(-4));
        assert_eq!(step.delta.schema().type_of("cat"), Some(DataType::None));
    }

    #[test]
    fn test_delete_of_unknown_pkey_is_noop() {
        let (master, mut port) = seeded();
        let mut b = port.batch();
        b.delete(9i64).unwrap();
        port.send(b).unwrap();
        let step = StepTables::compute(&master, port.flatten());
        assert!(!step.existed(0));
        assert!(!step.row_changed(0));
    }

    #[test]
    #[should_panic(expected = "misaligned step tables")]
    fn test_validate_detects_misalignment() {
        let (master, mut port) = seeded();
        let mut b = port.batch();
        b.delete(1i64).unwrap();
        port.send(b).unwrap();
        let mut step = StepTables::compute(&master, port.flatten());
        step.prev.push_row();
        step.validate();
    }

    #[test]
    #[should_panic(expected = "unexpected transition code")]
    fn test_unknown_transition_code() {
        Transition::from_code(42);
    }
}
