//! Canonical master state.
//!
//! `MasterState` owns the live rows of one data set in a dense columnar table,
//! addressed by a primary key through a hash map. Deleted rows are cleared in
//! place and their indices kept on a free list for reuse, so row indices stay
//! stable across cycles.

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;
use strata_core::{Column, Error, Op, Pool, Result, Scalar, Schema, Status, Table, OP_COLUMN};

/// Default growth factor applied when the row store runs out of capacity.
pub const DEFAULT_GROWTH_RATIO: f64 = 1.5;

/// Construction options for a master state.
#[derive(Clone, Debug)]
pub struct MasterOptions {
    /// Capacity multiplier used when appending past the current capacity.
    pub growth_ratio: f64,
    /// Executor for column-parallel fills.
    pub pool: Pool,
}

impl Default for MasterOptions {
    fn default() -> Self {
        Self {
            growth_ratio: DEFAULT_GROWTH_RATIO,
            pool: Pool::Sequential,
        }
    }
}

/// The canonical pkey -> row store.
///
/// Invariants: every live pkey maps to exactly one row index; a row index on
/// the free list has had all of its cells unset before it is handed out again.
#[derive(Debug)]
pub struct MasterState {
    table: Table,
    pkey_column: String,
    pkey_idx: usize,
    mapping: HashMap<Scalar, usize>,
    free: Vec<usize>,
    ops: Vec<Op>,
    live: Vec<bool>,
    capacity: usize,
    growth_ratio: f64,
    pool: Pool,
}

impl MasterState {
    /// Creates an empty master state keyed by `pkey_column`.
    pub fn new(schema: Schema, pkey_column: &str) -> Result<Self> {
        Self::with_options(schema, pkey_column, MasterOptions::default())
    }

    /// Creates an empty master state with explicit options.
    pub fn with_options(schema: Schema, pkey_column: &str, options: MasterOptions) -> Result<Self> {
        let pkey_idx = schema
            .index_of(pkey_column)
            .ok_or_else(|| Error::column_not_found("master", pkey_column))?;
        if options.growth_ratio.is_nan() || options.growth_ratio <= 1.0 {
            return Err(Error::invalid_config(format!(
                "growth ratio must exceed 1.0, got {}",
                options.growth_ratio
            )));
        }
        Ok(Self {
            table: Table::new(schema),
            pkey_column: pkey_column.to_string(),
            pkey_idx,
            mapping: HashMap::new(),
            free: Vec::new(),
            ops: Vec::new(),
            live: Vec::new(),
            capacity: 0,
            growth_ratio: options.growth_ratio,
            pool: options.pool,
        })
    }

    /// Returns the schema of the stored rows.
    #[inline]
    pub fn schema(&self) -> &Schema {
        self.table.schema()
    }

    /// Returns the pkey column name.
    #[inline]
    pub fn pkey_column(&self) -> &str {
        &self.pkey_column
    }

    /// Returns the pkey column position.
    #[inline]
    pub fn pkey_index(&self) -> usize {
        self.pkey_idx
    }

    /// Number of live rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.mapping.len()
    }

    /// Number of allocated row slots, live or free.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.table.num_rows()
    }

    /// Returns true when no rows are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Returns the backing table, including free slots.
    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Looks up the row index of a pkey.
    #[inline]
    pub fn lookup(&self, pkey: &Scalar) -> Option<usize> {
        self.mapping.get(pkey).copied()
    }

    /// Returns the last op applied to a row index.
    pub fn row_op(&self, idx: usize) -> Option<Op> {
        self.ops.get(idx).copied()
    }

    /// Returns true if a row index currently holds a live row.
    pub fn is_live(&self, idx: usize) -> bool {
        self.live.get(idx).copied().unwrap_or(false)
    }

    /// Reads a cell of a live pkey; `None` if the pkey is absent.
    pub fn get(&self, col: usize, pkey: &Scalar) -> &Scalar {
        match self.lookup(pkey) {
            Some(idx) => self.table.get(col, idx),
            None => &Scalar::None,
        }
    }

    /// Reads a cell by column name.
    pub fn get_by_name(&self, column: &str, pkey: &Scalar) -> &Scalar {
        match self.schema().index_of(column) {
            Some(col) => self.get(col, pkey),
            None => &Scalar::None,
        }
    }

    /// Reads a cell status of a live pkey; absent pkeys read as `Invalid`.
    pub fn status(&self, col: usize, pkey: &Scalar) -> Status {
        match self.lookup(pkey) {
            Some(idx) => self.table.status(col, idx),
            None => Status::Invalid,
        }
    }

    /// Iterates `(pkey, row index)` for every live row, in no particular order.
    pub fn iter_live(&self) -> impl Iterator<Item = (&Scalar, usize)> + '_ {
        self.mapping.iter().map(|(k, v)| (k, *v))
    }

    /// Returns the live pkeys sorted ascending.
    pub fn sorted_pkeys(&self) -> Vec<Scalar> {
        let mut keys: Vec<Scalar> = self.mapping.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the existing index for `pkey`, or allocates one.
    ///
    /// A freed index is reused when available; otherwise the store grows by the
    /// growth ratio and the row is appended. The row's op becomes `Insert`.
    pub fn lookup_or_create(&mut self, pkey: &Scalar) -> usize {
        if let Some(idx) = self.lookup(pkey) {
            return idx;
        }
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                let idx = self.table.num_rows();
                self.ensure_capacity(idx + 1);
                self.table.set_size(idx + 1);
                self.ops.push(Op::Insert);
                self.live.push(false);
                idx
            }
        };
        self.table.column_at_mut(self.pkey_idx).assign(idx, pkey.clone());
        self.ops[idx] = Op::Insert;
        self.live[idx] = true;
        self.mapping.insert(pkey.clone(), idx);
        idx
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if needed <= self.capacity {
            return;
        }
        let grown = (self.capacity as f64 * self.growth_ratio) as usize;
        let target = grown.max(needed).max(8);
        self.table.reserve(target - self.table.num_rows());
        self.ops.reserve(target - self.ops.len());
        self.live.reserve(target - self.live.len());
        self.capacity = target;
    }

    /// Removes a pkey: clears the row's cells, drops the mapping and frees the
    /// index. No-op if the pkey is absent.
    pub fn erase(&mut self, pkey: &Scalar) {
        if let Some(idx) = self.mapping.remove(pkey) {
            self.table.unset_row(idx);
            self.ops[idx] = Op::Delete;
            self.live[idx] = false;
            self.free.push(idx);
        }
    }

    /// Bulk-loads a flattened batch into an empty master state.
    ///
    /// Columns are cloned in parallel with a mask that keeps insert rows only;
    /// a single sequential pass then rebuilds the pkey map.
    ///
    /// # Panics
    ///
    /// Panics if the state is not empty, if the batch lacks a schema column or
    /// has a different dtype for one, or if a pkey repeats.
    pub fn fill_master_table(&mut self, flattened: &Table) {
        assert!(self.is_empty(), "fill_master_table requires an empty master state");
        let span = tracing::debug_span!("fill_master_table", rows = flattened.num_rows());
        let _guard = span.enter();

        let ops = op_column(flattened);
        let mask: Vec<bool> = (0..flattened.num_rows())
            .map(|r| Op::from_scalar(ops.get(r)) == Op::Insert)
            .collect();
        let sources = self.source_columns(flattened);

        let mut columns: Vec<Column> = self
            .schema()
            .types()
            .iter()
            .map(|&dtype| Column::new(dtype))
            .collect();
        self.pool.for_each_mut(&mut columns, |ci, col| {
            let src = flattened.column_at(sources[ci]);
            assert_eq!(src.dtype(), col.dtype(), "dtype mismatch on column copy");
            *col = src.clone_with_mask(&mask);
        });

        self.table = Table::from_columns(self.schema().clone(), columns);
        let size = self.table.num_rows();
        self.mapping.clear();
        self.free.clear();
        self.ops = alloc::vec![Op::Insert; size];
        self.live = alloc::vec![true; size];
        self.capacity = size;
        for idx in 0..size {
            let pkey = self.table.get(self.pkey_idx, idx).clone();
            let prior = self.mapping.insert(pkey, idx);
            assert!(prior.is_none(), "duplicate pkey in flattened batch");
        }
        tracing::debug!(live = size, "master table filled");
    }

    /// Applies a flattened batch to a populated master state.
    ///
    /// Target indices are resolved sequentially (the pkey map is only touched
    /// here), then every column is updated in parallel. Cells that were never
    /// set in the batch keep their current value; explicitly cleared cells are
    /// cleared. Delete rows erase their pkey.
    pub fn update_master_table(&mut self, flattened: &Table) {
        let span = tracing::debug_span!("update_master_table", rows = flattened.num_rows());
        let _guard = span.enter();

        let ops = op_column(flattened);
        let pkey_src = flattened
            .schema()
            .index_of(&self.pkey_column)
            .unwrap_or_else(|| panic!("flattened batch lacks pkey column {}", self.pkey_column));

        let mut targets: Vec<Option<usize>> = Vec::with_capacity(flattened.num_rows());
        for r in 0..flattened.num_rows() {
            let pkey = flattened.get(pkey_src, r).clone();
            match Op::from_scalar(ops.get(r)) {
                Op::Insert => targets.push(Some(self.lookup_or_create(&pkey))),
                Op::Delete => {
                    self.erase(&pkey);
                    targets.push(None);
                }
            }
        }

        let sources = self.source_columns(flattened);
        let pkey_idx = self.pkey_idx;
        let targets = &targets;
        self.pool
            .for_each_mut(self.table.columns_mut(), |ci, col| {
                if ci == pkey_idx {
                    return;
                }
                let src = flattened.column_at(sources[ci]);
                for (r, target) in targets.iter().enumerate() {
                    let Some(idx) = *target else { continue };
                    match src.status(r) {
                        Status::Valid => col.copy_cell(idx, src, r),
                        Status::Clear => col.clear(idx),
                        Status::Invalid => {}
                    }
                }
            });
        tracing::debug!(live = self.num_rows(), free = self.free.len(), "master table updated");
    }

    /// Returns the live rows as a dense table.
    ///
    /// With no freed slots the backing table is returned as is; otherwise the
    /// live rows are compacted with a mask (O(n)).
    pub fn get_pkeyed_table(&self) -> Cow<'_, Table> {
        if self.free.is_empty() {
            Cow::Borrowed(&self.table)
        } else {
            Cow::Owned(self.table.clone_with_mask(&self.live))
        }
    }

    /// Drops every row and resets capacity.
    pub fn reset(&mut self) {
        self.table = Table::new(self.schema().clone());
        self.mapping.clear();
        self.free.clear();
        self.ops.clear();
        self.live.clear();
        self.capacity = 0;
    }

    /// Maps each master column to its position in `flattened`.
    fn source_columns(&self, flattened: &Table) -> Vec<usize> {
        self.schema()
            .names()
            .iter()
            .map(|name| {
                flattened
                    .schema()
                    .index_of(name)
                    .unwrap_or_else(|| panic!("flattened batch lacks column {}", name))
            })
            .collect()
    }
}

fn op_column(flattened: &Table) -> &Column {
    flattened
        .column(OP_COLUMN)
        .unwrap_or_else(|| panic!("flattened batch lacks {} column", OP_COLUMN))
}
