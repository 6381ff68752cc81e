//! Rows nested by an explicit parent-key relation.
//!
//! Every row becomes one node, placed under the node whose key equals the
//! row's parent column. The tree is rebuilt wholesale each cycle that touches
//! any row; expansion and sort survive the rebuild through the row keys.

use crate::axis::Axis;
use crate::config::{checked_sort, BoundGrouped, GroupedConfig};
use crate::context::{clamp, push_unique, Context, ContextKind};
use crate::ctx1::LABEL_COLUMN;
use crate::delta::{RowDelta, StepDelta};
use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use hashbrown::{HashMap, HashSet};
use strata_core::{Result, Scalar, Schema};
use strata_incremental::StepTables;
use strata_storage::MasterState;
use strata_tree::{CellDelta, NodeId, PivotTree, SortSpec, Traversal, ROOT};

/// Key of a node across rebuilds; `None` is the root.
type RowKey = Option<Scalar>;

/// Parent/child grouped context.
#[derive(Debug)]
pub struct CtxGroupedPkey {
    config: BoundGrouped,
    tree: PivotTree,
    rows: Axis,
    ids: HashMap<Scalar, NodeId>,
    pending: BTreeMap<(RowKey, usize), CellDelta>,
    initialized: bool,
}

impl CtxGroupedPkey {
    /// Binds `config` against the master schema.
    pub fn new(schema: &Schema, pkey_column: usize, config: &GroupedConfig) -> Result<Self> {
        let config = config.bind(schema, pkey_column)?;
        let tree = PivotTree::new(config.aggs.clone(), config.labels.clone());
        let rows = Axis::new(None, config.sort.clone(), config.depth);
        Ok(Self {
            config,
            tree,
            rows,
            ids: HashMap::new(),
            pending: BTreeMap::new(),
            initialized: false,
        })
    }

    /// The underlying tree.
    pub fn tree(&self) -> &PivotTree {
        &self.tree
    }

    /// Visible rows.
    pub fn traversal(&self) -> &Traversal {
        &self.rows.traversal
    }

    /// Node holding the row keyed `key`.
    pub fn node_for(&self, key: &Scalar) -> Option<NodeId> {
        self.ids.get(key).copied()
    }

    fn assert_init(&self) {
        assert!(self.initialized, "grouped context used before init");
    }

    fn key_of(&self, id: NodeId) -> RowKey {
        (id != ROOT).then(|| self.tree.get_value(id).clone())
    }

    /// Visible rows as (key, depth), comparable across rebuilds.
    fn visible_shape(&self) -> Vec<(RowKey, usize)> {
        self.rows
            .traversal
            .nodes()
            .iter()
            .map(|n| (self.key_of(n.tnid), n.depth))
            .collect()
    }

    fn visible_keys(&self) -> Vec<RowKey> {
        self.rows
            .visible_ids()
            .into_iter()
            .map(|id| self.key_of(id))
            .collect()
    }

    /// Re-creates the tree from the live master rows. With `record` set,
    /// aggregate changes against the previous tree are queued as deltas.
    fn rebuild(&mut self, master: &MasterState, record: bool) {
        let previous: HashMap<RowKey, Vec<Scalar>> = if record {
            self.tree
                .preorder()
                .into_iter()
                .map(|id| {
                    let values = (0..self.tree.num_aggregates())
                        .map(|a| self.tree.get_aggregate(id, a).clone())
                        .collect();
                    (self.key_of(id), values)
                })
                .collect()
        } else {
            HashMap::new()
        };
        let expanded: Vec<RowKey> = self
            .rows
            .traversal
            .expanded_ids()
            .into_iter()
            .map(|id| self.key_of(id))
            .collect();
        let before = self.visible_shape();

        self.tree.clear();
        self.ids.clear();

        // child key -> (parent key, pkeys of the rows carrying it)
        let table = master.table();
        let mut rows: BTreeMap<Scalar, (Scalar, Vec<Scalar>)> = BTreeMap::new();
        for pkey in master.sorted_pkeys() {
            let Some(idx) = master.lookup(&pkey) else {
                continue;
            };
            if !self.config.filter.matches(|c| table.get(c, idx)) {
                continue;
            }
            let key = table.get(self.config.child, idx);
            if !key.is_valid() {
                continue;
            }
            rows.entry(key.clone())
                .or_insert_with(|| (table.get(self.config.parent, idx).clone(), Vec::new()))
                .1
                .push(pkey);
        }

        let mut children: HashMap<&Scalar, Vec<&Scalar>> = HashMap::new();
        let mut roots: Vec<&Scalar> = Vec::new();
        for (key, (parent, _)) in &rows {
            if parent.is_valid() && parent != key && rows.contains_key(parent) {
                children.entry(parent).or_default().push(key);
            } else {
                roots.push(key);
            }
        }

        let mut placed: HashSet<&Scalar> = HashSet::new();
        let mut queue: VecDeque<(NodeId, &Scalar)> = VecDeque::new();
        // declared roots first, then the smallest key of each remaining cycle
        let candidates = roots.into_iter().chain(rows.keys());
        for root in candidates {
            if !placed.insert(root) {
                continue;
            }
            let id = self.attach(ROOT, root, &rows[root].1);
            queue.push_back((id, root));
            while let Some((parent_id, parent)) = queue.pop_front() {
                for &child in children.get(parent).map(Vec::as_slice).unwrap_or_default() {
                    if placed.insert(child) {
                        let id = self.attach(parent_id, child, &rows[child].1);
                        queue.push_back((id, child));
                    }
                }
            }
        }
        self.tree.recompute_all(master);

        if record {
            for id in self.tree.preorder() {
                let key = self.key_of(id);
                let prior = previous.get(&key);
                for a in 0..self.tree.num_aggregates() {
                    let new = self.tree.get_aggregate(id, a).clone();
                    let old = prior.map(|v| v[a].clone()).unwrap_or_default();
                    self.queue_delta(key.clone(), a, old, new);
                }
            }
        }

        let expanded: HashSet<NodeId> = expanded
            .into_iter()
            .filter_map(|key| match key {
                None => Some(ROOT),
                Some(k) => self.ids.get(&k).copied(),
            })
            .collect();
        self.rows.traversal.rebuild(&self.tree, &self.rows.sortby, &expanded);
        if let Some(depth) = self.rows.auto_depth {
            self.rows.traversal.set_depth(&self.tree, &self.rows.sortby, depth);
        }
        if before != self.visible_shape() {
            self.rows.mark_changed();
        }
        tracing::debug!(
            nodes = self.tree.size(),
            rows = self.tree.get_leaf_count(ROOT),
            "grouped tree rebuilt"
        );
    }

    fn attach(&mut self, parent: NodeId, key: &Scalar, pkeys: &[Scalar]) -> NodeId {
        let id = self.tree.add_child(parent, key.clone(), key.clone());
        for pkey in pkeys {
            self.tree.add_pkey(id, pkey.clone());
        }
        self.ids.insert(key.clone(), id);
        id
    }

    /// Merges a change into the pending deltas, keeping the oldest value.
    fn queue_delta(&mut self, key: RowKey, agg: usize, old: Scalar, new: Scalar) {
        let slot = (key, agg);
        if let Some(entry) = self.pending.get_mut(&slot) {
            entry.new = new;
            if entry.old == entry.new {
                self.pending.remove(&slot);
            }
        } else if old != new {
            self.pending.insert(slot, CellDelta { old, new });
        }
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

    fn pending_rows(&self) -> Vec<usize> {
        let position: HashMap<RowKey, usize> = self
            .visible_keys()
            .into_iter()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();
        let mut rows: Vec<usize> = self
            .pending
            .keys()
            .filter_map(|(k, _)| position.get(k).copied())
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }
}

impl Context for CtxGroupedPkey {
    fn kind(&self) -> ContextKind {
        ContextKind::GroupedPkey
    }

    fn init(&mut self, master: &MasterState) {
        self.rebuild(master, false);
        self.rows.build(&self.tree);
        self.initialized = true;
    }

    fn reset(&mut self) {
        self.tree.clear();
        self.ids.clear();
        self.pending.clear();
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
        let span = tracing::debug_span!("notify_initial", kind = "grouped_pkey", rows = master.num_rows());
        let _guard = span.enter();
        self.rebuild(master, false);
        self.initialized = true;
    }

    fn notify(&mut self, master: &MasterState, step: &StepTables) {
        self.assert_init();
        let span = tracing::debug_span!("notify", kind = "grouped_pkey", rows = step.num_rows());
        let _guard = span.enter();
        if (0..step.num_rows()).any(|r| step.row_changed(r)) {
            self.rebuild(master, true);
        }
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
            let key = self.key_of(id);
            for a in 0..self.tree.num_aggregates() {
                if let Some(d) = self.pending.get(&(key.clone(), a)) {
                    out.push(i, a + 1, d.old.clone(), d.new.clone());
                }
            }
        }
        self.pending.clear();
        out
    }

    fn get_row_delta(&mut self, _master: &MasterState) -> RowDelta {
        let rows = self.pending_rows();
        let ncols = self.num_columns();
        let data = rows.iter().map(|&i| self.row_data(i, 0..ncols)).collect();
        self.pending.clear();
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
