//! Two-sided pivot: rows grouped by row pivots, columns by column pivots.
//!
//! With `k` row pivots the context keeps `k + 1` trees. Tree `d` groups by
//! the first `d` row pivots followed by every column pivot, so the cell for a
//! row at depth `d` and a column node is the node at `row path ++ column path`
//! in tree `d`. Tree `k` doubles as the row axis and tree `0` as the column
//! axis; the grand-total row and column read those directly.

use crate::axis::Axis;
use crate::config::{checked_sort, BoundPivot, PivotConfig, TotalsMode};
use crate::context::{clamp, push_unique, Context, ContextKind};
use crate::ctx1::LABEL_COLUMN;
use crate::delta::{RowDelta, StepDelta};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::ops::Range;
use hashbrown::HashSet;
use strata_core::{Error, Result, Scalar, Schema};
use strata_incremental::StepTables;
use strata_storage::MasterState;
use strata_tree::{NodeId, PivotTree, SortSpec, Traversal, ROOT};

/// Two-sided pivot context.
#[derive(Debug)]
pub struct Ctx2 {
    config: BoundPivot,
    trees: Vec<PivotTree>,
    pivots: Vec<Vec<usize>>,
    rows: Axis,
    cols: Axis,
    // visible column nodes of tree 0, in display order
    columns: Vec<NodeId>,
    initialized: bool,
}

impl Ctx2 {
    /// Binds `config` against the master schema.
    pub fn new(schema: &Schema, config: &PivotConfig) -> Result<Self> {
        if config.column_pivots.is_empty() {
            return Err(Error::invalid_config("two-sided pivot needs column pivots"));
        }
        let config = config.bind(schema)?;
        let k = config.row_pivots.len();
        let m = config.column_pivots.len();
        let pivots: Vec<Vec<usize>> = (0..=k)
            .map(|d| {
                let mut p = config.row_pivots[..d].to_vec();
                p.extend_from_slice(&config.column_pivots);
                p
            })
            .collect();
        let trees = pivots
            .iter()
            .map(|_| PivotTree::new(config.aggs.clone(), config.labels.clone()))
            .collect();
        let rows = Axis::new(Some(k), config.sort.clone(), config.depth);
        let cols = Axis::new(
            Some(m),
            config.column_sort.clone(),
            Some(config.column_depth.unwrap_or(m)),
        );
        Ok(Self {
            config,
            trees,
            pivots,
            rows,
            cols,
            columns: Vec::new(),
            initialized: false,
        })
    }

    fn assert_init(&self) {
        assert!(self.initialized, "two-sided context used before init");
    }

    #[inline]
    fn row_tree(&self) -> &PivotTree {
        &self.trees[self.trees.len() - 1]
    }

    #[inline]
    fn column_tree(&self) -> &PivotTree {
        &self.trees[0]
    }

    /// Tree `d`, grouping by `d` row pivots then the column pivots.
    pub fn tree(&self, depth: usize) -> Option<&PivotTree> {
        self.trees.get(depth)
    }

    /// Row-axis cursor.
    pub fn row_traversal(&self) -> &Traversal {
        &self.rows.traversal
    }

    /// Column-axis cursor.
    pub fn column_traversal(&self) -> &Traversal {
        &self.cols.traversal
    }

    fn num_aggregates(&self) -> usize {
        self.config.aggs.len()
    }

    fn build(&mut self, master: &MasterState) {
        for (tree, pivots) in self.trees.iter_mut().zip(self.pivots.iter()) {
            tree.build_from_master(master, pivots, &self.config.filter);
        }
        let k = self.trees.len() - 1;
        self.rows.build(&self.trees[k]);
        self.cols.build(&self.trees[0]);
        self.refresh_columns();
        self.initialized = true;
    }

    fn refresh_columns(&mut self) {
        let t = &self.cols.traversal;
        self.columns = match self.config.totals {
            TotalsMode::Before => t.nodes().iter().map(|n| n.tnid).collect(),
            TotalsMode::After => post_order(t),
            TotalsMode::Hidden => t
                .nodes()
                .iter()
                .filter(|n| !(n.expanded && n.nchild > 0))
                .map(|n| n.tnid)
                .collect(),
        };
    }

    /// Splits a data column into its column node and aggregate.
    fn column_at(&self, col: usize) -> Option<(NodeId, usize)> {
        let n = self.num_aggregates();
        if col == 0 || n == 0 {
            return None;
        }
        let node = *self.columns.get((col - 1) / n)?;
        Some((node, (col - 1) % n))
    }

    /// Finds the tree and node aggregating a row node crossed with a column node.
    fn resolve(&self, row: NodeId, row_path: &[Scalar], column: NodeId) -> Option<(usize, NodeId)> {
        let k = self.trees.len() - 1;
        if column == ROOT {
            return Some((k, row));
        }
        let d = row_path.len();
        if d == 0 {
            return Some((0, column));
        }
        let mut path = row_path.to_vec();
        path.extend(self.column_tree().path_of(column));
        self.trees[d].resolve_path(ROOT, &path).map(|id| (d, id))
    }

    fn row_data(&self, idx: usize, columns: Range<usize>) -> Vec<Scalar> {
        let Some(row) = self.rows.node_at(idx) else {
            return Vec::new();
        };
        let row_path = self.row_tree().path_of(row);
        columns
            .map(|c| {
                if c == 0 {
                    return self.row_tree().get_value(row).clone();
                }
                self.column_at(c)
                    .and_then(|(column, agg)| {
                        self.resolve(row, &row_path, column)
                            .map(|(t, id)| self.trees[t].get_aggregate(id, agg).clone())
                    })
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Pivot values of the column node behind a data column; empty for the
    /// label column or out of range.
    pub fn get_column_path(&self, col: usize) -> Vec<Scalar> {
        self.column_at(col)
            .map(|(node, _)| self.column_tree().path_of(node))
            .unwrap_or_default()
    }

    fn column_row(&self, col: usize) -> Option<usize> {
        let (node, _) = self.column_at(col)?;
        self.cols.traversal.get_traversal_index(node)
    }

    /// Expands the column node behind data column `col`, returning how many
    /// column nodes appeared.
    pub fn column_open(&mut self, col: usize) -> usize {
        self.assert_init();
        let Some(idx) = self.column_row(col) else {
            return 0;
        };
        let n = self.cols.open(&self.trees[0], idx);
        self.refresh_columns();
        n
    }

    /// Collapses the column node behind data column `col`.
    pub fn column_close(&mut self, col: usize) -> usize {
        self.assert_init();
        let Some(idx) = self.column_row(col) else {
            return 0;
        };
        let n = self.cols.close(idx);
        self.refresh_columns();
        n
    }

    /// Expands column nodes above `depth`, and keeps doing so after each cycle.
    pub fn column_set_depth(&mut self, depth: usize) {
        self.assert_init();
        self.cols.set_depth(&self.trees[0], depth);
        self.refresh_columns();
    }

    /// Orders sibling column nodes by their column-total aggregates.
    pub fn column_sort_by(&mut self, spec: Vec<SortSpec>) {
        self.assert_init();
        let spec = checked_sort(&spec, self.num_aggregates());
        self.cols.sort_by(&self.trees[0], spec);
        self.refresh_columns();
    }
}

/// Visible rows with every node after its visible subtree.
fn post_order(t: &Traversal) -> Vec<NodeId> {
    let nodes = t.nodes();
    let mut out = Vec::with_capacity(nodes.len());
    let mut open: Vec<usize> = Vec::new();
    for i in 0..nodes.len() {
        while let Some(&top) = open.last() {
            if top + nodes[top].ndesc >= i {
                break;
            }
            out.push(nodes[top].tnid);
            open.pop();
        }
        open.push(i);
    }
    while let Some(top) = open.pop() {
        out.push(nodes[top].tnid);
    }
    out
}

impl Context for Ctx2 {
    fn kind(&self) -> ContextKind {
        ContextKind::TwoSided
    }

    fn init(&mut self, master: &MasterState) {
        self.build(master);
    }

    fn reset(&mut self) {
        for tree in self.trees.iter_mut() {
            tree.clear();
        }
        let m = self.config.column_pivots.len();
        self.rows = Axis::new(Some(self.trees.len() - 1), self.config.sort.clone(), self.config.depth);
        self.cols = Axis::new(
            Some(m),
            self.config.column_sort.clone(),
            Some(self.config.column_depth.unwrap_or(m)),
        );
        self.columns.clear();
        self.initialized = false;
    }

    fn step_begin(&mut self) {}

    fn step_end(&mut self) {
        if !self.initialized {
            return;
        }
        let k = self.trees.len() - 1;
        self.rows.finish(&self.trees[k]);
        self.cols.finish(&self.trees[0]);
        self.refresh_columns();
    }

    fn notify_initial(&mut self, master: &MasterState) {
        let span = tracing::debug_span!("notify_initial", kind = "two_sided", rows = master.num_rows());
        let _guard = span.enter();
        let root_open = self.rows.traversal.is_expanded(0);
        self.build(master);
        if root_open && self.rows.auto_depth.is_none() {
            let k = self.trees.len() - 1;
            self.rows.open(&self.trees[k], 0);
        }
    }

    fn notify(&mut self, master: &MasterState, step: &StepTables) {
        self.assert_init();
        let span = tracing::debug_span!("notify", kind = "two_sided", rows = step.num_rows());
        let _guard = span.enter();
        let k = self.trees.len() - 1;
        for d in 0..=k {
            let changes = self.trees[d].update(master, step, &self.pivots[d], &self.config.filter);
            if d == k {
                self.rows.patch(&self.trees[k], &changes);
            }
            if d == 0 {
                self.cols.patch(&self.trees[0], &changes);
            }
        }
        self.refresh_columns();
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn num_columns(&self) -> usize {
        1 + self.columns.len() * self.num_aggregates()
    }

    fn column_names(&self) -> Vec<String> {
        let mut names = alloc::vec![String::from(LABEL_COLUMN)];
        for &node in &self.columns {
            let path: Vec<String> = self
                .column_tree()
                .path_of(node)
                .iter()
                .map(|v| v.to_string())
                .collect();
            for label in &self.config.labels {
                if path.is_empty() {
                    names.push(label.clone());
                } else {
                    names.push(format!("{}|{}", path.join("|"), label));
                }
            }
        }
        names
    }

    fn open(&mut self, idx: usize) -> usize {
        self.assert_init();
        let k = self.trees.len() - 1;
        self.rows.open(&self.trees[k], idx)
    }

    fn close(&mut self, idx: usize) -> usize {
        self.assert_init();
        self.rows.close(idx)
    }

    fn set_depth(&mut self, depth: usize) {
        self.assert_init();
        let k = self.trees.len() - 1;
        self.rows.set_depth(&self.trees[k], depth);
    }

    fn sort_by(&mut self, _master: &MasterState, spec: Vec<SortSpec>) {
        self.assert_init();
        let spec = checked_sort(&spec, self.num_aggregates());
        let k = self.trees.len() - 1;
        self.rows.sort_by(&self.trees[k], spec);
    }

    fn get_data(&self, _master: &MasterState, rows: Range<usize>, columns: Range<usize>) -> Vec<Vec<Scalar>> {
        self.assert_init();
        let columns = clamp(columns, self.num_columns());
        clamp(rows, self.num_rows())
            .map(|i| self.row_data(i, columns.clone()))
            .collect()
    }

    fn get_row_path(&self, idx: usize) -> Vec<Scalar> {
        self.rows
            .node_at(idx)
            .map(|id| self.row_tree().path_of(id))
            .unwrap_or_default()
    }

    fn get_step_delta(&mut self, rows: Range<usize>) -> StepDelta {
        let mut out = StepDelta {
            rows_changed: self.rows.take_changed(),
            columns_changed: self.cols.take_changed(),
            cells: Vec::new(),
        };
        let ncols = self.num_columns();
        for i in clamp(rows, self.num_rows()) {
            let Some(row) = self.rows.node_at(i) else {
                continue;
            };
            let row_path = self.row_tree().path_of(row);
            for c in 1..ncols {
                let Some((column, agg)) = self.column_at(c) else {
                    continue;
                };
                let Some((t, id)) = self.resolve(row, &row_path, column) else {
                    continue;
                };
                if let Some(d) = self.trees[t].get_deltas().get(&(id, agg)) {
                    out.push(i, c, d.old.clone(), d.new.clone());
                }
            }
        }
        for tree in self.trees.iter_mut() {
            tree.clear_deltas();
        }
        out
    }

    fn get_row_delta(&mut self, _master: &MasterState) -> RowDelta {
        let full = self.num_rows();
        let cells = self.get_step_delta(0..full);
        let mut rows: Vec<usize> = cells.cells.iter().map(|c| c.row).collect();
        rows.dedup();
        let ncols = self.num_columns();
        let data = rows.iter().map(|&i| self.row_data(i, 0..ncols)).collect();
        RowDelta {
            rows_changed: cells.rows_changed || cells.columns_changed,
            rows,
            data,
        }
    }

    fn get_pkeys(&self, cells: &[(usize, usize)]) -> Vec<Scalar> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for &(r, c) in cells {
            let Some(row) = self.rows.node_at(r) else {
                continue;
            };
            if c == 0 {
                push_unique(&mut out, &mut seen, self.row_tree().get_pkeys_for_leaf(row));
                continue;
            }
            let Some((column, _)) = self.column_at(c) else {
                continue;
            };
            let row_path = self.row_tree().path_of(row);
            if let Some((t, id)) = self.resolve(row, &row_path, column) {
                push_unique(&mut out, &mut seen, self.trees[t].get_pkeys_for_leaf(id));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use strata_core::DataType;
    use strata_incremental::{Port, Reducer};

    fn schema() -> Schema {
        Schema::new(vec![
            ("id".into(), DataType::Int64),
            ("region".into(), DataType::Str),
            ("year".into(), DataType::Int64),
            ("amt".into(), DataType::Float64),
        ])
    }

    fn setup(totals: TotalsMode) -> (MasterState, Port, Ctx2) {
        let mut master = MasterState::new(schema(), "id").unwrap();
        let mut port = Port::new(schema(), "id").unwrap();
        let mut b = port.batch();
        for (id, region, year, amt) in [
            (1, "EU", 2023, 1.0),
            (2, "EU", 2024, 2.0),
            (3, "US", 2023, 4.0),
        ] {
            b.insert(&[
                Scalar::Int64(id),
                Scalar::from(region),
                Scalar::Int64(year),
                Scalar::Float64(amt),
            ])
            .unwrap();
        }
        port.send(b).unwrap();
        master.fill_master_table(&port.flatten());
        let config = PivotConfig::new()
            .row_pivot("region")
            .column_pivot("year")
            .aggregate("amt", Reducer::Sum)
            .totals(totals);
        let mut ctx = Ctx2::new(&schema(), &config).unwrap();
        ctx.notify_initial(&master);
        (master, port, ctx)
    }

    #[test]
    fn test_cells_cross_both_axes() {
        let (master, _, mut ctx) = setup(TotalsMode::Before);
        ctx.open(0);
        // columns: total, 2023, 2024
        assert_eq!(ctx.num_columns(), 4);
        assert_eq!(ctx.get_column_path(2), vec![Scalar::Int64(2023)]);
        let data = ctx.get_data(&master, 0..3, 0..4);
        assert_eq!(
            data[0],
            vec![Scalar::None, Scalar::Float64(7.0), Scalar::Float64(5.0), Scalar::Float64(2.0)]
        );
        assert_eq!(
            data[1],
            vec![Scalar::from("EU"), Scalar::Float64(3.0), Scalar::Float64(1.0), Scalar::Float64(2.0)]
        );
        // US has nothing in 2024
        assert_eq!(data[2][3], Scalar::None);
        assert_eq!(ctx.get_pkeys(&[(1, 2)]), vec![Scalar::Int64(1)]);
    }

    #[test]
    fn test_totals_modes() {
        let (_, _, after) = setup(TotalsMode::After);
        assert_eq!(after.get_column_path(3), Vec::<Scalar>::new());
        assert_eq!(after.get_column_path(1), vec![Scalar::Int64(2023)]);

        let (_, _, hidden) = setup(TotalsMode::Hidden);
        assert_eq!(hidden.num_columns(), 3);
        assert_eq!(
            hidden.column_names(),
            vec![
                String::from(LABEL_COLUMN),
                String::from("2023|sum(amt)"),
                String::from("2024|sum(amt)")
            ]
        );
    }

    #[test]
    fn test_column_collapse() {
        let (_, _, mut ctx) = setup(TotalsMode::Before);
        assert_eq!(ctx.column_close(1), 2);
        assert_eq!(ctx.num_columns(), 2);
        assert_eq!(ctx.column_open(1), 2);
        assert_eq!(ctx.num_columns(), 4);
    }

    #[test]
    fn test_update_reports_crossed_cells() {
        let (mut master, mut port, mut ctx) = setup(TotalsMode::Before);
        ctx.open(0);
        ctx.get_step_delta(0..10);

        let mut b = port.batch();
        b.update(2i64, &[("amt", Scalar::Float64(12.0))]).unwrap();
        port.send(b).unwrap();
        let step = StepTables::compute(&master, port.flatten());
        master.update_master_table(&step.flattened);
        ctx.step_begin();
        ctx.notify(&master, &step);
        ctx.step_end();

        let delta = ctx.get_step_delta(0..3);
        let cells: Vec<(usize, usize)> = delta.cells.iter().map(|c| (c.row, c.column)).collect();
        // grand total and 2024 for the total row and the EU row
        assert_eq!(cells, vec![(0, 1), (0, 3), (1, 1), (1, 3)]);
        assert!(!delta.rows_changed);
    }
}
