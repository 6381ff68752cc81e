//! One-sided pivot: rows grouped by a list of pivot columns.

use crate::axis::Axis;
use crate::config::{checked_sort, BoundPivot, PivotConfig};
use crate::context::{clamp, push_unique, Context, ContextKind};
use crate::delta::{RowDelta, StepDelta};
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use hashbrown::{HashMap, HashSet};
use strata_core::{DataType, Error, Result, Scalar, Schema, Table};
use strata_incremental::StepTables;
use strata_storage::MasterState;
use strata_tree::{NodeId, PivotTree, SortSpec};

/// Name of the label column of pivoted views.
pub const LABEL_COLUMN: &str = "__row_path";

/// Row-number column of `Ctx1::get_table`.
pub const INDEX_COLUMN: &str = "__index";

/// One-sided pivot context.
#[derive(Debug)]
pub struct Ctx1 {
    config: BoundPivot,
    pivot_columns: Vec<(String, DataType)>,
    tree: PivotTree,
    rows: Axis,
    initialized: bool,
}

impl Ctx1 {
    /// Binds `config` against the master schema.
    ///
    /// Column pivots are rejected; use a two-sided context for them.
    pub fn new(schema: &Schema, config: &PivotConfig) -> Result<Self> {
        if !config.column_pivots.is_empty() {
            return Err(Error::invalid_config("one-sided pivot takes no column pivots"));
        }
        let config = config.bind(schema)?;
        let pivot_columns = config
            .row_pivots
            .iter()
            .map(|&c| (schema.names()[c].clone(), schema.types()[c]))
            .collect();
        let tree = PivotTree::new(config.aggs.clone(), config.labels.clone());
        let rows = Axis::new(None, config.sort.clone(), config.depth);
        Ok(Self {
            config,
            pivot_columns,
            tree,
            rows,
            initialized: false,
        })
    }

    /// The underlying tree.
    pub fn tree(&self) -> &PivotTree {
        &self.tree
    }

    /// Tree node shown at a row.
    pub fn node_at(&self, idx: usize) -> Option<NodeId> {
        self.rows.node_at(idx)
    }

    /// Visible-row cursor.
    pub fn traversal(&self) -> &strata_tree::Traversal {
        &self.rows.traversal
    }

    fn assert_init(&self) {
        assert!(self.initialized, "one-sided context used before init");
    }

    fn build(&mut self, master: &MasterState) {
        self.tree
            .build_from_master(master, &self.config.row_pivots, &self.config.filter);
        self.rows.build(&self.tree);
        self.initialized = true;
    }

    fn cell(&self, id: NodeId, col: usize) -> Scalar {
        if col == 0 {
            self.tree.get_value(id).clone()
        } else {
            self.tree.get_aggregate(id, col - 1).clone()
        }
    }

    fn row_data(&self, idx: usize, columns: Range<usize>) -> Vec<Scalar> {
        match self.rows.node_at(idx) {
            Some(id) => columns.map(|c| self.cell(id, c)).collect(),
            None => Vec::new(),
        }
    }

    /// Flattens the visible frontier (every row that is not expanded) into a
    /// table: a row number, one column per pivot holding the row's path, then
    /// one column per aggregate.
    ///
    /// The frontier partitions the view's rows, so pivoting this table again
    /// with the same pivots and a summing reducer reproduces the aggregates.
    pub fn get_table(&self) -> Table {
        self.assert_init();
        let mut columns = alloc::vec![(String::from(INDEX_COLUMN), DataType::Int64)];
        columns.extend(self.pivot_columns.iter().cloned());
        let schema = self.tree.aggregate_schema();
        columns.extend(schema.iter().map(|(name, dtype)| (String::from(name), dtype)));
        let npivots = self.pivot_columns.len();
        let mut table = Table::new(Schema::new(columns));

        let mut out = 0;
        for node in self.rows.traversal.nodes() {
            if node.expanded && node.nchild > 0 {
                continue;
            }
            table.set(0, out, Scalar::Int64(out as i64));
            for (i, value) in self.tree.path_of(node.tnid).into_iter().enumerate() {
                if value.is_valid() {
                    table.set(1 + i, out, value);
                }
            }
            for a in 0..self.tree.num_aggregates() {
                let value = self.tree.get_aggregate(node.tnid, a);
                if value.is_valid() {
                    table.set(1 + npivots + a, out, value.clone());
                }
            }
            out += 1;
        }
        table
    }
}

impl Context for Ctx1 {
    fn kind(&self) -> ContextKind {
        ContextKind::OneSided
    }

    fn init(&mut self, master: &MasterState) {
        self.build(master);
    }

    fn reset(&mut self) {
        self.tree.clear();
        self.rows = Axis::new(None, self.config.sort.clone(), self.config.depth);
        self.initialized = false;
    }

    fn step_begin(&mut self) {}

    fn step_end(&mut self) {
        if self.initialized {
            self.rows.finish(&self.tree);
        }
    }

    fn notify_initial(&mut self, master: &MasterState) {
        let span = tracing::debug_span!("notify_initial", kind = "one_sided", rows = master.num_rows());
        let _guard = span.enter();
        let expanded: HashSet<NodeId> = self.rows.traversal.expanded_ids();
        self.build(master);
        // keep the root open across a reload
        if expanded.contains(&strata_tree::ROOT) && self.rows.auto_depth.is_none() {
            self.rows.open(&self.tree, 0);
        }
    }

    fn notify(&mut self, master: &MasterState, step: &StepTables) {
        self.assert_init();
        let span = tracing::debug_span!("notify", kind = "one_sided", rows = step.num_rows());
        let _guard = span.enter();
        let changes = self
            .tree
            .update(master, step, &self.config.row_pivots, &self.config.filter);
        self.rows.patch(&self.tree, &changes);
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn num_columns(&self) -> usize {
        1 + self.tree.num_aggregates()
    }

    fn column_names(&self) -> Vec<String> {
        let mut names = alloc::vec![String::from(LABEL_COLUMN)];
        names.extend(self.config.labels.iter().cloned());
        names
    }

    fn open(&mut self, idx: usize) -> usize {
        self.assert_init();
        self.rows.open(&self.tree, idx)
    }

    fn close(&mut self, idx: usize) -> usize {
        self.assert_init();
        self.rows.close(idx)
    }

    fn set_depth(&mut self, depth: usize) {
        self.assert_init();
        self.rows.set_depth(&self.tree, depth);
    }

    fn sort_by(&mut self, _master: &MasterState, spec: Vec<SortSpec>) {
        self.assert_init();
        let spec = checked_sort(&spec, self.tree.num_aggregates());
        self.rows.sort_by(&self.tree, spec);
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
            .map(|id| self.tree.path_of(id))
            .unwrap_or_default()
    }

    fn get_step_delta(&mut self, rows: Range<usize>) -> StepDelta {
        let mut out = StepDelta {
            rows_changed: self.rows.take_changed(),
            ..StepDelta::default()
        };
        for i in clamp(rows, self.num_rows()) {
            let Some(id) = self.rows.node_at(i) else {
                continue;
            };
            for (agg, d) in self.tree.deltas_for(id) {
                out.push(i, agg + 1, d.old.clone(), d.new.clone());
            }
        }
        self.tree.clear_deltas();
        out
    }

    fn get_row_delta(&mut self, _master: &MasterState) -> RowDelta {
        let position: HashMap<NodeId, usize> = self
            .rows
            .visible_ids()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        let mut rows: Vec<usize> = self
            .tree
            .get_deltas()
            .keys()
            .filter_map(|(id, _)| position.get(id).copied())
            .collect();
        rows.sort_unstable();
        rows.dedup();
        let ncols = self.num_columns();
        let data = rows.iter().map(|&i| self.row_data(i, 0..ncols)).collect();
        self.tree.clear_deltas();
        RowDelta {
            rows_changed: self.rows.take_changed(),
            rows,
            data,
        }
    }

    fn get_pkeys(&self, cells: &[(usize, usize)]) -> Vec<Scalar> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for &(row, col) in cells {
            if col >= self.num_columns() {
                continue;
            }
            if let Some(id) = self.rows.node_at(row) {
                push_unique(&mut out, &mut seen, self.tree.get_pkeys_for_leaf(id));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use strata_incremental::{Port, Reducer};

    fn schema() -> Schema {
        Schema::new(vec![
            ("id".into(), DataType::Int64),
            ("cat".into(), DataType::Str),
            ("amt".into(), DataType::Float64),
        ])
    }

    fn setup(config: PivotConfig) -> (MasterState, Port, Ctx1) {
        let mut master = MasterState::new(schema(), "id").unwrap();
        let mut port = Port::new(schema(), "id").unwrap();
        let mut b = port.batch();
        for (id, cat, amt) in [(1, "A", 5.0), (2, "A", 7.0), (3, "B", 2.0)] {
            b.insert(&[Scalar::Int64(id), Scalar::from(cat), Scalar::Float64(amt)])
                .unwrap();
        }
        port.send(b).unwrap();
        master.fill_master_table(&port.flatten());
        let mut ctx = Ctx1::new(&schema(), &config).unwrap();
        ctx.notify_initial(&master);
        (master, port, ctx)
    }

    fn by_cat() -> PivotConfig {
        PivotConfig::new().row_pivot("cat").aggregate("amt", Reducer::Sum)
    }

    #[test]
    fn test_open_root_shows_groups() {
        let (master, _, mut ctx) = setup(by_cat());
        assert_eq!(ctx.num_rows(), 1);
        assert_eq!(ctx.open(0), 2);
        assert_eq!(
            ctx.get_data(&master, 0..3, 0..2),
            vec![
                vec![Scalar::None, Scalar::Float64(14.0)],
                vec![Scalar::from("A"), Scalar::Float64(12.0)],
                vec![Scalar::from("B"), Scalar::Float64(2.0)],
            ]
        );
        assert_eq!(ctx.get_row_path(2), vec![Scalar::from("B")]);
        assert_eq!(
            ctx.column_names(),
            vec![String::from(LABEL_COLUMN), String::from("sum(amt)")]
        );
    }

    #[test]
    fn test_new_group_appears_under_open_root() {
        let (mut master, mut port, mut ctx) = setup(by_cat());
        ctx.open(0);
        ctx.get_step_delta(0..10);

        let mut b = port.batch();
        b.insert(&[Scalar::Int64(4), Scalar::from("C"), Scalar::Float64(1.0)])
            .unwrap();
        port.send(b).unwrap();
        let step = StepTables::compute(&master, port.flatten());
        master.update_master_table(&step.flattened);
        ctx.step_begin();
        ctx.notify(&master, &step);
        ctx.step_end();

        assert_eq!(ctx.num_rows(), 4);
        assert_eq!(ctx.get_row_path(3), vec![Scalar::from("C")]);
        let delta = ctx.get_step_delta(0..4);
        assert!(delta.rows_changed);
        assert!(ctx.traversal().check_invariants().is_ok());
    }

    #[test]
    fn test_sort_by_aggregate() {
        let (master, _, mut ctx) = setup(by_cat().sort(SortSpec::asc(0)));
        ctx.open(0);
        assert_eq!(ctx.get_row_path(1), vec![Scalar::from("B")]);
        ctx.sort_by(&master, vec![SortSpec::desc(0)]);
        assert_eq!(ctx.get_row_path(1), vec![Scalar::from("A")]);
        // unknown aggregate indices are dropped
        ctx.sort_by(&master, vec![SortSpec::desc(5)]);
        assert_eq!(ctx.get_row_path(1), vec![Scalar::from("A")]);
    }

    #[test]
    fn test_get_pkeys_through_collapsed_rows() {
        let (_, _, ctx) = setup(by_cat());
        assert_eq!(
            ctx.get_pkeys(&[(0, 1)]),
            vec![Scalar::Int64(1), Scalar::Int64(2), Scalar::Int64(3)]
        );
        assert!(ctx.get_pkeys(&[(4, 1)]).is_empty());
    }

    #[test]
    fn test_get_table_frontier() {
        let (_, _, mut ctx) = setup(by_cat());
        ctx.open(0);
        let table = ctx.get_table();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.schema().names()[1], "cat");
        assert_eq!(table.get(1, 0), &Scalar::from("A"));
        assert_eq!(table.get(2, 1), &Scalar::Float64(2.0));
    }

    #[test]
    fn test_column_pivots_rejected() {
        let config = by_cat().column_pivot("cat");
        assert!(Ctx1::new(&schema(), &config).is_err());
    }
}
