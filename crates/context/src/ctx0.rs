//! Flat view: filtered and sorted master rows.
//!
//! Each cycle row is classified by whether it passed the filter before and
//! after the cycle, independently of its op, so an update that moves a row
//! into or out of the filter shows up as an add or a delete.

use crate::config::{checked_sort, BoundFlat, FlatConfig};
use crate::context::{clamp, push_unique, Context, ContextKind};
use crate::delta::{RowDelta, StepDelta};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use hashbrown::HashSet;
use strata_core::{Op, Result, Scalar, Schema};
use strata_incremental::StepTables;
use strata_storage::MasterState;
use strata_tree::{CellDelta, FlatTraversal, SortSpec};

/// What one cycle did to a row of a flat view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlatChange {
    /// The row entered the view.
    Add,
    /// The row stayed in the view and some cell changed.
    Update,
    /// The row left the view.
    Delete,
}

/// Flat context.
#[derive(Debug)]
pub struct Ctx0 {
    config: BoundFlat,
    names: Vec<String>,
    view: FlatTraversal,
    initialized: bool,
    last: Vec<(Scalar, FlatChange)>,
    // keyed by (pkey, view column)
    cells: BTreeMap<(Scalar, usize), CellDelta>,
    touched: BTreeSet<Scalar>,
    rows_changed: bool,
}

impl Ctx0 {
    /// Binds `config` against the master schema.
    pub fn new(schema: &Schema, config: &FlatConfig) -> Result<Self> {
        let config = config.bind(schema)?;
        let names = config
            .columns
            .iter()
            .map(|&c| schema.names()[c].clone())
            .collect();
        let view = FlatTraversal::new(config.sort.clone());
        Ok(Self {
            config,
            names,
            view,
            initialized: false,
            last: Vec::new(),
            cells: BTreeMap::new(),
            touched: BTreeSet::new(),
            rows_changed: false,
        })
    }

    /// Per-pkey changes made by the last cycle, in processing order.
    pub fn last_changes(&self) -> &[(Scalar, FlatChange)] {
        &self.last
    }

    /// Pkey shown at `idx`.
    pub fn pkey_at(&self, idx: usize) -> Option<&Scalar> {
        self.view.get_pkey(idx)
    }

    /// Row showing `pkey`, if visible.
    pub fn position(&self, pkey: &Scalar) -> Option<usize> {
        self.view.position(pkey)
    }

    fn assert_init(&self) {
        assert!(self.initialized, "flat context used before init");
    }

    fn load(&mut self, master: &MasterState) -> Vec<Scalar> {
        self.view = FlatTraversal::new(self.config.sort.clone());
        self.cells.clear();
        self.touched.clear();
        let table = master.table();
        let columns = &self.config.columns;
        let mut loaded = Vec::new();
        for pkey in master.sorted_pkeys() {
            let Some(idx) = master.lookup(&pkey) else {
                continue;
            };
            if !self.config.filter.matches(|c| table.get(c, idx)) {
                continue;
            }
            let keys = self.view.sort_values(|vc| table.get(columns[vc], idx));
            self.view.insert(pkey.clone(), keys);
            loaded.push(pkey);
        }
        self.rows_changed = true;
        self.initialized = true;
        loaded
    }

    fn record_cell(&mut self, pkey: &Scalar, column: usize, old: &Scalar, new: &Scalar) {
        let key = (pkey.clone(), column);
        match self.cells.get_mut(&key) {
            Some(d) => {
                d.new = new.clone();
                if d.old == d.new {
                    self.cells.remove(&key);
                }
            }
            None => {
                self.cells.insert(
                    key,
                    CellDelta {
                        old: old.clone(),
                        new: new.clone(),
                    },
                );
            }
        }
    }

    fn drop_cells(&mut self, pkey: &Scalar) {
        let stale: Vec<(Scalar, usize)> = self
            .cells
            .range((pkey.clone(), 0)..=(pkey.clone(), usize::MAX))
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale {
            self.cells.remove(&k);
        }
    }

    fn row_data(&self, master: &MasterState, idx: usize, columns: Range<usize>) -> Vec<Scalar> {
        let row = self.view.get_pkey(idx).and_then(|p| master.lookup(p));
        columns
            .map(|vc| match row {
                Some(r) => master.table().get(self.config.columns[vc], r).clone(),
                None => Scalar::None,
            })
            .collect()
    }

    fn drain(&mut self) {
        self.cells.clear();
        self.touched.clear();
        self.rows_changed = false;
    }
}

impl Context for Ctx0 {
    fn kind(&self) -> ContextKind {
        ContextKind::Flat
    }

    fn init(&mut self, master: &MasterState) {
        self.load(master);
        self.last.clear();
    }

    fn reset(&mut self) {
        self.view.clear();
        self.drain();
        self.last.clear();
        self.initialized = false;
    }

    fn step_begin(&mut self) {
        self.last.clear();
    }

    fn step_end(&mut self) {}

    fn notify_initial(&mut self, master: &MasterState) {
        let span = tracing::debug_span!("notify_initial", kind = "flat", rows = master.num_rows());
        let _guard = span.enter();
        let loaded = self.load(master);
        self.last = loaded.iter().map(|p| (p.clone(), FlatChange::Add)).collect();
        self.touched = loaded.into_iter().collect();
    }

    fn notify(&mut self, _master: &MasterState, step: &StepTables) {
        self.assert_init();
        let span = tracing::debug_span!("notify", kind = "flat", rows = step.num_rows());
        let _guard = span.enter();

        for r in 0..step.num_rows() {
            let pkey = step.pkey(r);
            let filter = &self.config.filter;
            let before = step.existed(r) && filter.matches(|c| step.prev.get(c, r));
            let after = step.op(r) == Op::Insert && filter.matches(|c| step.current.get(c, r));
            let change = match (before, after) {
                (false, true) => FlatChange::Add,
                (true, false) => FlatChange::Delete,
                (true, true) if step.row_changed(r) => FlatChange::Update,
                _ => continue,
            };
            let columns = &self.config.columns;
            match change {
                FlatChange::Add => {
                    let keys = self.view.sort_values(|vc| step.current.get(columns[vc], r));
                    self.view.insert(pkey.clone(), keys);
                    self.touched.insert(pkey.clone());
                    self.rows_changed = true;
                }
                FlatChange::Delete => {
                    self.view.remove(pkey);
                    self.drop_cells(pkey);
                    self.touched.remove(pkey);
                    self.rows_changed = true;
                }
                FlatChange::Update => {
                    let keys = self.view.sort_values(|vc| step.current.get(columns[vc], r));
                    let was = self.view.position(pkey);
                    if Some(self.view.update(pkey.clone(), keys)) != was {
                        self.rows_changed = true;
                    }
                    for vc in 0..self.config.columns.len() {
                        let c = self.config.columns[vc];
                        if step.transition(c, r).is_change() {
                            self.record_cell(pkey, vc, step.prev.get(c, r), step.current.get(c, r));
                        }
                    }
                    self.touched.insert(pkey.clone());
                }
            }
            self.last.push((pkey.clone(), change));
        }
        tracing::trace!(changes = self.last.len(), visible = self.view.len(), "flat view updated");
    }

    fn num_rows(&self) -> usize {
        self.view.len()
    }

    fn num_columns(&self) -> usize {
        self.config.columns.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn open(&mut self, _idx: usize) -> usize {
        0
    }

    fn close(&mut self, _idx: usize) -> usize {
        0
    }

    fn set_depth(&mut self, _depth: usize) {}

    fn sort_by(&mut self, master: &MasterState, spec: Vec<SortSpec>) {
        self.assert_init();
        let spec = checked_sort(&spec, self.config.columns.len());
        let columns = &self.config.columns;
        let table = master.table();
        self.view.set_sort(spec.clone(), |pkey, sortby| {
            let row = master.lookup(pkey);
            sortby
                .iter()
                .map(|s| match row {
                    Some(r) => table.get(columns[s.index], r).clone(),
                    None => Scalar::None,
                })
                .collect()
        });
        self.config.sort = spec;
        self.rows_changed = true;
    }

    fn get_data(&self, master: &MasterState, rows: Range<usize>, columns: Range<usize>) -> Vec<Vec<Scalar>> {
        self.assert_init();
        let columns = clamp(columns, self.num_columns());
        clamp(rows, self.num_rows())
            .map(|i| self.row_data(master, i, columns.clone()))
            .collect()
    }

    fn get_row_path(&self, idx: usize) -> Vec<Scalar> {
        self.view.get_pkey(idx).cloned().into_iter().collect()
    }

    fn get_step_delta(&mut self, rows: Range<usize>) -> StepDelta {
        let window = clamp(rows, self.num_rows());
        let mut out = StepDelta {
            rows_changed: self.rows_changed,
            ..StepDelta::default()
        };
        for ((pkey, vc), d) in &self.cells {
            if let Some(pos) = self.view.position(pkey).filter(|p| window.contains(p)) {
                out.push(pos, *vc, d.old.clone(), d.new.clone());
            }
        }
        out.sort();
        self.drain();
        out
    }

    fn get_row_delta(&mut self, master: &MasterState) -> RowDelta {
        let mut rows: Vec<usize> = self
            .touched
            .iter()
            .chain(self.cells.keys().map(|(p, _)| p))
            .filter_map(|p| self.view.position(p))
            .collect();
        rows.sort_unstable();
        rows.dedup();
        let ncols = self.num_columns();
        let data = rows.iter().map(|&i| self.row_data(master, i, 0..ncols)).collect();
        let out = RowDelta {
            rows_changed: self.rows_changed,
            rows,
            data,
        };
        self.drain();
        out
    }

    fn get_pkeys(&self, cells: &[(usize, usize)]) -> Vec<Scalar> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for &(row, col) in cells {
            if col >= self.num_columns() {
                continue;
            }
            if let Some(pkey) = self.view.get_pkey(row) {
                push_unique(&mut out, &mut seen, alloc::vec![pkey.clone()]);
            }
        }
        out
    }
}
