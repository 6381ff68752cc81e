//! Pivot hierarchy with per-node aggregates.
//!
//! Nodes live in an arena addressed by `NodeId`. Each node groups the rows
//! whose pivot values match its path from the root; leaves (and, for
//! grouped-pkey trees, every node) own pkeys directly. Aggregates sit in a side
//! table, one row per node and one column per configured aggregate, and every
//! change to an aggregate cell is recorded in an ordered delta index until the
//! owner drains it.

use crate::sort::{compare_keys, SortSpec};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use hashbrown::{HashMap, HashSet};
use strata_core::{Column, Scalar, Schema, Table};
use strata_incremental::{BoundAgg, FilterSet, StepTables};
use strata_storage::MasterState;

/// Node identifier in the tree arena.
pub type NodeId = usize;

/// Id of the root node.
pub const ROOT: NodeId = 0;

/// A node of the pivot tree.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub id: NodeId,
    /// Parent id; the root is its own parent.
    pub parent: NodeId,
    /// Pivot value (or pkey for grouped-pkey trees).
    pub value: Scalar,
    pub depth: usize,
    /// Primary ordering among siblings, ties broken by `value`.
    pub sortkey: Scalar,
    /// Row of this node in the aggregate table.
    pub agg_row: usize,
    /// Number of pkeys in the subtree.
    pub leaf_count: usize,
    children: Vec<NodeId>,
    pkeys: BTreeSet<Scalar>,
}

impl TreeNode {
    /// Child ids, ordered by `(sortkey, value)`.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Pkeys owned directly by this node.
    pub fn own_pkeys(&self) -> impl Iterator<Item = &Scalar> + '_ {
        self.pkeys.iter()
    }

    fn order_key(&self) -> (&Scalar, &Scalar) {
        (&self.sortkey, &self.value)
    }
}

/// Old and new value of an aggregate cell since the last drain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellDelta {
    pub old: Scalar,
    pub new: Scalar,
}

/// Structural changes made by one incremental update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeChanges {
    /// Created nodes, parents before children.
    pub added: Vec<NodeId>,
    /// Removed nodes, children before parents.
    pub removed: Vec<NodeId>,
}

impl TreeChanges {
    /// Returns true if the shape of the tree did not change.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

static NONE: Scalar = Scalar::None;

/// Hierarchical grouping of master rows with rollup aggregates.
#[derive(Debug)]
pub struct PivotTree {
    nodes: Vec<Option<TreeNode>>,
    free_ids: Vec<NodeId>,
    aggs: Vec<BoundAgg>,
    agg_table: Table,
    free_agg_rows: Vec<usize>,
    deltas: BTreeMap<(NodeId, usize), CellDelta>,
    owner: HashMap<Scalar, NodeId>,
    // set once any non-root node is ordered by something other than its value
    mixed_order: bool,
}

impl PivotTree {
    /// Creates a tree holding only the root, with one aggregate column per
    /// entry of `aggs` named by `labels`.
    ///
    /// # Panics
    ///
    /// Panics if `labels` and `aggs` differ in length.
    pub fn new(aggs: Vec<BoundAgg>, labels: Vec<String>) -> Self {
        assert_eq!(aggs.len(), labels.len(), "one label per aggregate");
        let schema = Schema::new(labels.into_iter().zip(aggs.iter().map(|a| a.output)).collect());
        let mut tree = Self {
            nodes: Vec::new(),
            free_ids: Vec::new(),
            aggs,
            agg_table: Table::new(schema),
            free_agg_rows: Vec::new(),
            deltas: BTreeMap::new(),
            owner: HashMap::new(),
            mixed_order: false,
        };
        tree.insert_node(ROOT, ROOT, Scalar::None, 0, Scalar::None, 0, 0);
        tree
    }

    /// The configured aggregates.
    pub fn aggregates(&self) -> &[BoundAgg] {
        &self.aggs
    }

    /// Number of aggregate columns.
    pub fn num_aggregates(&self) -> usize {
        self.aggs.len()
    }

    /// Schema of the aggregate table.
    pub fn aggregate_schema(&self) -> &Schema {
        self.agg_table.schema()
    }

    /// Number of live nodes, root included.
    pub fn size(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns true if `id` is a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id), Some(Some(_)))
    }

    /// Returns a node.
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        match self.nodes.get_mut(id) {
            Some(Some(node)) => node,
            _ => panic!("pivot tree node {} does not exist", id),
        }
    }

    fn get(&self, id: NodeId) -> &TreeNode {
        match self.node(id) {
            Some(node) => node,
            None => panic!("pivot tree node {} does not exist", id),
        }
    }

    /// Appends a node with a caller-supplied id and aggregate row.
    ///
    /// The aggregate table grows to cover `agg_row`. The node is linked into
    /// its parent's ordered child list.
    ///
    /// # Panics
    ///
    /// Panics if `id` is taken or the parent does not exist.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_node(
        &mut self,
        id: NodeId,
        parent: NodeId,
        value: Scalar,
        depth: usize,
        sortkey: Scalar,
        leaf_count: usize,
        agg_row: usize,
    ) {
        assert!(!self.contains(id), "pivot tree node {} already exists", id);
        if id != ROOT {
            assert!(self.contains(parent), "pivot tree parent {} does not exist", parent);
        }
        if id >= self.nodes.len() {
            self.nodes.resize(id + 1, None);
        }
        self.free_ids.retain(|&f| f != id);
        if agg_row >= self.agg_table.num_rows() {
            self.agg_table.set_size(agg_row + 1);
        }
        self.free_agg_rows.retain(|&r| r != agg_row);

        let node = TreeNode {
            id,
            parent,
            value,
            depth,
            sortkey,
            agg_row,
            leaf_count,
            children: Vec::new(),
            pkeys: BTreeSet::new(),
        };
        if id != ROOT {
            self.mixed_order |= node.sortkey != node.value;
            let key = (node.sortkey.clone(), node.value.clone());
            let siblings = &self.get(parent).children;
            let pos = siblings.partition_point(|&c| {
                let n = self.get(c);
                (&n.sortkey, &n.value) < (&key.0, &key.1)
            });
            self.node_mut(parent).children.insert(pos, id);
        }
        self.nodes[id] = Some(node);
    }

    /// Creates a child of `parent`, allocating its id and aggregate row.
    pub fn add_child(&mut self, parent: NodeId, value: Scalar, sortkey: Scalar) -> NodeId {
        let id = self.free_ids.pop().unwrap_or(self.nodes.len().max(1));
        let agg_row = self
            .free_agg_rows
            .pop()
            .unwrap_or_else(|| self.agg_table.num_rows());
        let depth = self.get(parent).depth + 1;
        self.insert_node(id, parent, value, depth, sortkey, 0, agg_row);
        id
    }

    /// Removes a node and its subtree. The root cannot be removed.
    ///
    /// Pkeys owned by removed nodes are released; pending deltas of removed
    /// nodes are dropped.
    pub fn remove_node(&mut self, id: NodeId) {
        assert!(id != ROOT, "cannot remove the pivot tree root");
        let parent = self.get(id).parent;
        let released = self.get(id).leaf_count;
        self.node_mut(parent).children.retain(|&c| c != id);
        self.adjust_leaf_count(parent, -(released as isize));

        let mut stack = alloc::vec![id];
        while let Some(n) = stack.pop() {
            let Some(node) = self.nodes[n].take() else {
                continue;
            };
            stack.extend(node.children.iter().copied());
            for pkey in node.pkeys.iter() {
                self.owner.remove(pkey);
            }
            self.agg_table.unset_row(node.agg_row);
            self.free_agg_rows.push(node.agg_row);
            self.free_ids.push(n);
            let stale: Vec<(NodeId, usize)> = self
                .deltas
                .range((n, 0)..(n + 1, 0))
                .map(|(k, _)| *k)
                .collect();
            for k in stale {
                self.deltas.remove(&k);
            }
        }
    }

    /// Drops every node but the root and clears aggregates and deltas.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.free_ids.clear();
        self.owner.clear();
        self.deltas.clear();
        self.mixed_order = false;
        self.agg_table = Table::new(self.agg_table.schema().clone());
        self.free_agg_rows.clear();
        let root = self.node_mut(ROOT);
        root.children.clear();
        root.pkeys.clear();
        root.leaf_count = 0;
        root.agg_row = 0;
        self.agg_table.set_size(1);
    }

    /// Pivot value of a node (`None` for the root or unknown ids).
    pub fn get_value(&self, id: NodeId) -> &Scalar {
        self.node(id).map(|n| &n.value).unwrap_or(&NONE)
    }

    /// Parent of a node; `None` for the root or unknown ids.
    pub fn get_parent_idx(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id) {
            Some(n) if id != ROOT => Some(n.parent),
            _ => None,
        }
    }

    /// Depth of a node (root is 0).
    pub fn get_depth(&self, id: NodeId) -> usize {
        self.node(id).map(|n| n.depth).unwrap_or(0)
    }

    /// Aggregate-table row of a node.
    pub fn get_aggidx(&self, id: NodeId) -> Option<usize> {
        self.node(id).map(|n| n.agg_row)
    }

    /// Aggregate value of a node; `None` for unknown nodes or columns.
    pub fn get_aggregate(&self, id: NodeId, agg: usize) -> &Scalar {
        match self.node(id) {
            Some(n) if agg < self.aggs.len() => self.agg_table.get(agg, n.agg_row),
            _ => &NONE,
        }
    }

    /// Children of a node, ordered by `(sortkey, value)`.
    pub fn get_children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Number of pkeys under a node.
    pub fn get_leaf_count(&self, id: NodeId) -> usize {
        self.node(id).map(|n| n.leaf_count).unwrap_or(0)
    }

    /// Node that directly owns a pkey.
    pub fn owner_of(&self, pkey: &Scalar) -> Option<NodeId> {
        self.owner.get(pkey).copied()
    }

    /// Children of a node reordered by aggregate values; stable, so equal
    /// keys keep their `(sortkey, value)` order.
    pub fn sorted_children(&self, id: NodeId, sortby: &[SortSpec]) -> Vec<NodeId> {
        let mut children = self.get_children(id).to_vec();
        if crate::sort::is_active(sortby) {
            let keys: HashMap<NodeId, Vec<Scalar>> = children
                .iter()
                .map(|&c| (c, self.sort_values(c, sortby)))
                .collect();
            children.sort_by(|a, b| compare_keys(sortby, &keys[a], &keys[b]));
        }
        children
    }

    fn sort_values(&self, id: NodeId, sortby: &[SortSpec]) -> Vec<Scalar> {
        sortby
            .iter()
            .map(|s| self.get_aggregate(id, s.index).clone())
            .collect()
    }

    /// Finds the child of `parent` with pivot value `value`.
    pub fn child_by_value(&self, parent: NodeId, value: &Scalar) -> Option<NodeId> {
        let children = self.get_children(parent);
        if self.mixed_order {
            return children.iter().copied().find(|&c| self.get(c).value == *value);
        }
        children
            .binary_search_by(|&c| self.get(c).order_key().cmp(&(value, value)))
            .ok()
            .map(|pos| children[pos])
    }

    /// Descends from `start` matching one child value per path element.
    pub fn resolve_path(&self, start: NodeId, path: &[Scalar]) -> Option<NodeId> {
        if !self.contains(start) {
            return None;
        }
        path.iter()
            .try_fold(start, |node, value| self.child_by_value(node, value))
    }

    /// Pivot values from the root (exclusive) down to `id`.
    pub fn path_of(&self, id: NodeId) -> Vec<Scalar> {
        let mut path = Vec::new();
        let mut cur = id;
        while let Some(node) = self.node(cur) {
            if cur == ROOT {
                break;
            }
            path.push(node.value.clone());
            cur = node.parent;
        }
        path.reverse();
        path
    }

    /// Every pkey rolled into a node: its own and all descendants'.
    pub fn get_pkeys_for_leaf(&self, id: NodeId) -> Vec<Scalar> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = alloc::vec![id];
        while let Some(n) = stack.pop() {
            let node = self.get(n);
            out.extend(node.pkeys.iter().cloned());
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Recorded aggregate changes since the last `clear_deltas`.
    pub fn get_deltas(&self) -> &BTreeMap<(NodeId, usize), CellDelta> {
        &self.deltas
    }

    /// Recorded changes of one node, by aggregate index.
    pub fn deltas_for(&self, id: NodeId) -> impl Iterator<Item = (usize, &CellDelta)> + '_ {
        self.deltas
            .range((id, 0)..(id + 1, 0))
            .map(|((_, agg), d)| (*agg, d))
    }

    /// Drops every recorded delta.
    pub fn clear_deltas(&mut self) {
        self.deltas.clear();
    }

    fn set_aggregate(&mut self, id: NodeId, agg: usize, value: Scalar, record: bool) {
        let row = self.get(id).agg_row;
        let old = self.agg_table.get(agg, row).clone();
        if old == value {
            return;
        }
        if value.is_valid() {
            self.agg_table.set(agg, row, value.clone());
        } else {
            self.agg_table.column_at_mut(agg).unset(row);
        }
        if !record {
            return;
        }
        let key = (id, agg);
        match self.deltas.get_mut(&key) {
            Some(d) => {
                d.new = value;
                if d.old == d.new {
                    self.deltas.remove(&key);
                }
            }
            None => {
                self.deltas.insert(key, CellDelta { old, new: value });
            }
        }
    }

    fn adjust_leaf_count(&mut self, from: NodeId, by: isize) {
        let mut cur = from;
        loop {
            let node = self.node_mut(cur);
            node.leaf_count = (node.leaf_count as isize + by).max(0) as usize;
            if cur == ROOT {
                break;
            }
            cur = node.parent;
        }
    }

    /// Makes `id` the direct owner of `pkey`, moving it from any prior owner.
    pub fn add_pkey(&mut self, id: NodeId, pkey: Scalar) {
        if let Some(prev) = self.owner.get(&pkey).copied() {
            if prev == id {
                return;
            }
            self.remove_pkey(&pkey);
        }
        self.node_mut(id).pkeys.insert(pkey.clone());
        self.owner.insert(pkey, id);
        self.adjust_leaf_count(id, 1);
    }

    /// Releases a pkey, returning the node that owned it.
    pub fn remove_pkey(&mut self, pkey: &Scalar) -> Option<NodeId> {
        let id = self.owner.remove(pkey)?;
        self.node_mut(id).pkeys.remove(pkey);
        self.adjust_leaf_count(id, -1);
        Some(id)
    }

    /// Walks (creating as needed) the child path below the root.
    fn ensure_path(&mut self, path: &[Scalar], changes: &mut TreeChanges) -> NodeId {
        let mut cur = ROOT;
        for value in path {
            cur = match self.child_by_value(cur, value) {
                Some(child) => child,
                None => {
                    let child = self.add_child(cur, value.clone(), value.clone());
                    changes.added.push(child);
                    child
                }
            };
        }
        cur
    }

    /// Recomputes one node's aggregates from its own pkeys and children.
    fn recompute(&mut self, id: NodeId, master: &MasterState, record: bool) {
        for a in 0..self.aggs.len() {
            let agg = self.aggs[a];
            let value = if agg.reducer.is_associative() {
                let node = self.get(id);
                let own = agg
                    .reducer
                    .reduce(node.pkeys.iter().map(|p| master.get(agg.column, p)));
                let partials: Vec<&Scalar> = node
                    .children
                    .iter()
                    .map(|&c| self.get_aggregate(c, a))
                    .chain(core::iter::once(&own))
                    .collect();
                agg.reducer.combine(partials)
            } else {
                let pkeys = self.get_pkeys_for_leaf(id);
                agg.reducer
                    .reduce(pkeys.iter().map(|p| master.get(agg.column, p)))
            };
            self.set_aggregate(id, a, value, record);
        }
    }

    /// Recomputes every node bottom-up without recording deltas.
    pub fn recompute_all(&mut self, master: &MasterState) {
        let mut order: Vec<NodeId> = (0..self.nodes.len()).filter(|&n| self.contains(n)).collect();
        order.sort_by(|a, b| self.get(*b).depth.cmp(&self.get(*a).depth));
        for id in order {
            self.recompute(id, master, false);
        }
    }

    /// Recomputes the given nodes and all of their ancestors, deepest first,
    /// recording deltas.
    pub fn recompute_paths(&mut self, master: &MasterState, from: impl IntoIterator<Item = NodeId>) {
        let mut dirty: HashSet<NodeId> = HashSet::new();
        for start in from {
            let mut cur = start;
            while self.contains(cur) && dirty.insert(cur) {
                if cur == ROOT {
                    break;
                }
                cur = self.get(cur).parent;
            }
        }
        let mut order: Vec<NodeId> = dirty.into_iter().collect();
        order.sort_by(|a, b| {
            self.get(*b)
                .depth
                .cmp(&self.get(*a).depth)
                .then_with(|| a.cmp(b))
        });
        for id in order {
            self.recompute(id, master, true);
        }
    }

    /// Rebuilds the tree from every live master row passing `filter`,
    /// grouping by the `pivots` column positions.
    pub fn build_from_master(&mut self, master: &MasterState, pivots: &[usize], filter: &FilterSet) {
        self.clear();
        let mut scratch = TreeChanges::default();
        let table = master.table();
        for pkey in master.sorted_pkeys() {
            let Some(idx) = master.lookup(&pkey) else {
                continue;
            };
            if !filter.matches(|c| table.get(c, idx)) {
                continue;
            }
            let path: Vec<Scalar> = pivots.iter().map(|&c| table.get(c, idx).clone()).collect();
            let leaf = self.ensure_path(&path, &mut scratch);
            self.add_pkey(leaf, pkey);
        }
        self.recompute_all(master);
        tracing::debug!(nodes = self.size(), rows = self.get_leaf_count(ROOT), "pivot tree built");
    }

    /// Applies one cycle's changes.
    ///
    /// `master` must already hold the post-cycle state. Rows whose pivot
    /// values changed move between leaves; empty non-root nodes are removed;
    /// every touched path is recomputed bottom-up with deltas recorded.
    pub fn update(
        &mut self,
        master: &MasterState,
        step: &StepTables,
        pivots: &[usize],
        filter: &FilterSet,
    ) -> TreeChanges {
        let mut changes = TreeChanges::default();
        let mut touched: Vec<NodeId> = Vec::new();
        let mut vacated: Vec<NodeId> = Vec::new();

        for r in 0..step.num_rows() {
            if !step.row_changed(r) {
                continue;
            }
            let pkey = step.pkey(r);
            let old = self.owner_of(pkey);
            let keep = step.op(r) == strata_core::Op::Insert
                && filter.matches(|c| step.current.get(c, r));
            let new = if keep {
                let path: Vec<Scalar> = pivots.iter().map(|&c| step.current.get(c, r).clone()).collect();
                Some(self.ensure_path(&path, &mut changes))
            } else {
                None
            };
            match (old, new) {
                (Some(o), Some(n)) if o == n => touched.push(n),
                (old, new) => {
                    if let Some(o) = old {
                        self.remove_pkey(pkey);
                        touched.push(o);
                        vacated.push(o);
                    }
                    if let Some(n) = new {
                        self.add_pkey(n, pkey.clone());
                        touched.push(n);
                    }
                }
            }
        }

        // prune nodes left without rows, walking up from each vacated leaf
        for start in vacated {
            let mut cur = start;
            while cur != ROOT && self.contains(cur) && self.get(cur).leaf_count == 0 {
                let parent = self.get(cur).parent;
                self.collect_subtree(cur, &mut changes.removed);
                self.remove_node(cur);
                touched.push(parent);
                cur = parent;
            }
        }
        changes.added.retain(|&n| self.contains(n));
        let removed: HashSet<NodeId> = changes.removed.iter().copied().collect();
        changes.added.retain(|n| !removed.contains(n));

        touched.retain(|&n| self.contains(n));
        self.recompute_paths(master, touched);
        tracing::trace!(
            added = changes.added.len(),
            removed = changes.removed.len(),
            deltas = self.deltas.len(),
            "pivot tree updated"
        );
        changes
    }

    /// Pushes the ids of a subtree, children before parents.
    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let mut pre = Vec::new();
        let mut stack = alloc::vec![id];
        while let Some(n) = stack.pop() {
            pre.push(n);
            stack.extend(self.get_children(n).iter().copied());
        }
        out.extend(pre.into_iter().rev());
    }

    /// Returns the aggregate table (one row per node, rows of removed nodes unset).
    pub fn aggregate_table(&self) -> &Table {
        &self.agg_table
    }

    /// Returns a column of the aggregate table.
    pub fn aggregate_column(&self, agg: usize) -> Option<&Column> {
        (agg < self.aggs.len()).then(|| self.agg_table.column_at(agg))
    }

    /// Iterates live node ids in pre-order, children in `(sortkey, value)` order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.size());
        let mut stack = alloc::vec![ROOT];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.get_children(n).iter().rev().copied());
        }
        out
    }

    /// Compares two siblings by `(sortkey, value)`.
    pub fn sibling_order(&self, a: NodeId, b: NodeId) -> Ordering {
        self.get(a).order_key().cmp(&self.get(b).order_key())
    }
}
