//! Expand/collapse cursor over a pivot tree.
//!
//! The visible rows are kept as a flat pre-order array: a node is immediately
//! followed by its visible subtree. Each entry stores `rel_pidx`, the distance
//! back to its parent, and `ndesc`, the size of its visible subtree, so parent
//! and sibling hops are index arithmetic. For every node `n`,
//! `sum(1 + ndesc(c) for c in children(n)) == ndesc(n)`.
//!
//! Expanding or collapsing touches the affected span, the ancestor chain and
//! the later siblings of each ancestor, never the whole array.

use crate::pivot_tree::{NodeId, PivotTree, ROOT};
use crate::sort::SortSpec;
use alloc::format;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use strata_core::{Error, Result};

/// One visible row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TravNode {
    /// Tree node shown on this row.
    pub tnid: NodeId,
    pub depth: usize,
    pub expanded: bool,
    /// Offset back to the parent row; 0 for the root.
    pub rel_pidx: usize,
    /// Number of visible descendants.
    pub ndesc: usize,
    /// Number of visible direct children.
    pub nchild: usize,
}

impl TravNode {
    fn new(tnid: NodeId, depth: usize, rel_pidx: usize) -> Self {
        Self {
            tnid,
            depth,
            expanded: false,
            rel_pidx,
            ndesc: 0,
            nchild: 0,
        }
    }
}

/// Visible-row cursor over one pivot tree.
#[derive(Clone, Debug)]
pub struct Traversal {
    nodes: Vec<TravNode>,
    max_depth: Option<usize>,
}

impl Default for Traversal {
    fn default() -> Self {
        Self::new()
    }
}

impl Traversal {
    /// Creates a traversal showing only the (collapsed) root.
    pub fn new() -> Self {
        Self {
            nodes: alloc::vec![TravNode::new(ROOT, 0, 0)],
            max_depth: None,
        }
    }

    /// Creates a traversal that never expands nodes at or below `max_depth`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
            ..Self::new()
        }
    }

    /// Depth limit, if any.
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Number of visible rows, root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when no row is visible. Every constructor places the
    /// root row and `remove_node` never drops it, so this stays false.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a visible row.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&TravNode> {
        self.nodes.get(idx)
    }

    /// Returns every visible row.
    pub fn nodes(&self) -> &[TravNode] {
        &self.nodes
    }

    /// Tree node shown at `idx`; O(1).
    #[inline]
    pub fn get_tree_index(&self, idx: usize) -> Option<NodeId> {
        self.nodes.get(idx).map(|n| n.tnid)
    }

    /// Row showing tree node `tnid`, by linear scan.
    pub fn get_traversal_index(&self, tnid: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.tnid == tnid)
    }

    /// Parent row of `idx`; the root is its own parent.
    #[inline]
    pub fn parent_of(&self, idx: usize) -> usize {
        idx - self.nodes[idx].rel_pidx
    }

    /// Rows of the visible children of `idx`.
    pub fn children_of(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(idx) else {
            return out;
        };
        let end = idx + 1 + node.ndesc;
        let mut x = idx + 1;
        while x < end {
            out.push(x);
            x += 1 + self.nodes[x].ndesc;
        }
        out
    }

    /// Returns true if `idx` is expanded.
    pub fn is_expanded(&self, idx: usize) -> bool {
        self.nodes.get(idx).map(|n| n.expanded).unwrap_or(false)
    }

    /// Adjusts `ndesc` of every proper ancestor of `idx`.
    fn adjust_ancestors(&mut self, idx: usize, by: isize) {
        let mut a = idx;
        while a != 0 {
            a = self.parent_of(a);
            let node = &mut self.nodes[a];
            node.ndesc = (node.ndesc as isize + by) as usize;
        }
    }

    /// After the subtree span of `idx` grew or shrank by `by`, shifts the
    /// parent offsets of the later siblings of `idx` and of each ancestor.
    fn shift_following_siblings(&mut self, idx: usize, by: isize) {
        let mut b = idx;
        while b != 0 {
            let p = self.parent_of(b);
            let end = p + 1 + self.nodes[p].ndesc;
            let mut x = b + 1 + self.nodes[b].ndesc;
            while x < end {
                let node = &mut self.nodes[x];
                node.rel_pidx = (node.rel_pidx as isize + by) as usize;
                x += 1 + node.ndesc;
            }
            b = p;
        }
    }

    /// Expands row `idx`, splicing its (sorted) children right after it.
    ///
    /// Returns the number of rows added; 0 if already expanded, childless,
    /// at the depth limit or out of range.
    pub fn expand_node(&mut self, tree: &PivotTree, sortby: &[SortSpec], idx: usize) -> usize {
        let Some(node) = self.nodes.get(idx).copied() else {
            return 0;
        };
        if node.expanded || self.max_depth.is_some_and(|d| node.depth >= d) {
            return 0;
        }
        let children = tree.sorted_children(node.tnid, sortby);
        let n = children.len();
        if n == 0 {
            return 0;
        }
        let depth = node.depth + 1;
        self.nodes.splice(
            idx + 1..idx + 1,
            children
                .iter()
                .enumerate()
                .map(|(k, &c)| TravNode::new(c, depth, k + 1)),
        );
        {
            let node = &mut self.nodes[idx];
            node.expanded = true;
            node.nchild = n;
            node.ndesc = n;
        }
        self.adjust_ancestors(idx, n as isize);
        self.shift_following_siblings(idx, n as isize);
        tracing::trace!(idx, tnid = node.tnid, added = n, "expanded");
        n
    }

    /// Collapses row `idx`, removing its visible subtree.
    ///
    /// Returns the number of rows removed.
    pub fn collapse_node(&mut self, idx: usize) -> usize {
        let Some(node) = self.nodes.get(idx).copied() else {
            return 0;
        };
        if !node.expanded {
            return 0;
        }
        let n = node.ndesc;
        self.nodes.drain(idx + 1..idx + 1 + n);
        {
            let node = &mut self.nodes[idx];
            node.expanded = false;
            node.nchild = 0;
            node.ndesc = 0;
        }
        self.adjust_ancestors(idx, -(n as isize));
        self.shift_following_siblings(idx, -(n as isize));
        tracing::trace!(idx, tnid = node.tnid, removed = n, "collapsed");
        n
    }

    /// Expands every node shallower than `depth` and collapses every
    /// expanded node at exactly `depth`. Returns the resulting row count.
    pub fn set_depth(&mut self, tree: &PivotTree, sortby: &[SortSpec], depth: usize) -> usize {
        let mut i = 0;
        while i < self.nodes.len() {
            let node = self.nodes[i];
            if node.depth < depth {
                if !node.expanded {
                    self.expand_node(tree, sortby, i);
                }
            } else if node.expanded {
                self.collapse_node(i);
            }
            i += 1;
        }
        self.nodes.len()
    }

    /// Removes row `idx` and its visible subtree (the tree node is gone).
    /// The parent stays expanded even if this was its last child, so rows
    /// added under it later show up.
    ///
    /// Returns the number of rows removed; 0 for the root or out of range.
    pub fn remove_node(&mut self, idx: usize) -> usize {
        if idx == 0 || idx >= self.nodes.len() {
            return 0;
        }
        let n = 1 + self.nodes[idx].ndesc;
        let p = self.parent_of(idx);
        self.nodes.drain(idx..idx + n);
        {
            let parent = &mut self.nodes[p];
            parent.ndesc -= n;
            parent.nchild -= 1;
        }
        self.adjust_ancestors(p, -(n as isize));
        // later siblings moved back into the removed span
        let end = p + 1 + self.nodes[p].ndesc;
        let mut x = idx;
        while x < end {
            let node = &mut self.nodes[x];
            node.rel_pidx -= n;
            x += 1 + node.ndesc;
        }
        self.shift_following_siblings(p, -(n as isize));
        n
    }

    /// Inserts tree node `tnid` as a visible child of expanded row `parent`,
    /// at its position under `sortby`. Returns its row, or `None` if `parent`
    /// is not expanded.
    pub fn insert_child(
        &mut self,
        tree: &PivotTree,
        sortby: &[SortSpec],
        parent: usize,
        tnid: NodeId,
    ) -> Option<usize> {
        let pnode = *self.nodes.get(parent)?;
        if !pnode.expanded {
            return None;
        }
        let ranks: HashMap<NodeId, usize> = tree
            .sorted_children(pnode.tnid, sortby)
            .into_iter()
            .enumerate()
            .map(|(r, c)| (c, r))
            .collect();
        let rank = *ranks.get(&tnid)?;
        let mut x = parent + 1;
        let end = parent + 1 + pnode.ndesc;
        while x < end {
            if ranks.get(&self.nodes[x].tnid).is_some_and(|&r| r > rank) {
                break;
            }
            x += 1 + self.nodes[x].ndesc;
        }
        self.nodes
            .insert(x, TravNode::new(tnid, pnode.depth + 1, x - parent));
        {
            let node = &mut self.nodes[parent];
            node.ndesc += 1;
            node.nchild += 1;
        }
        self.adjust_ancestors(parent, 1);
        let end = parent + 1 + self.nodes[parent].ndesc;
        let mut y = x + 1;
        while y < end {
            let node = &mut self.nodes[y];
            node.rel_pidx += 1;
            y += 1 + node.ndesc;
        }
        self.shift_following_siblings(parent, 1);
        Some(x)
    }

    /// Tree ids of every expanded row.
    pub fn expanded_ids(&self) -> HashSet<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.expanded)
            .map(|n| n.tnid)
            .collect()
    }

    /// Resets to the root and re-expands every node in `expanded` that is
    /// still reachable, ordering children by `sortby`.
    pub fn rebuild(&mut self, tree: &PivotTree, sortby: &[SortSpec], expanded: &HashSet<NodeId>) {
        self.nodes.clear();
        self.nodes.push(TravNode::new(ROOT, 0, 0));
        let mut i = 0;
        while i < self.nodes.len() {
            if expanded.contains(&self.nodes[i].tnid) {
                self.expand_node(tree, sortby, i);
            }
            i += 1;
        }
    }

    /// Tree ids from the root (exclusive) down to row `idx`.
    pub fn path_ids(&self, idx: usize) -> Vec<NodeId> {
        let mut out = Vec::new();
        if idx >= self.nodes.len() {
            return out;
        }
        let mut cur = idx;
        while cur != 0 {
            out.push(self.nodes[cur].tnid);
            cur = self.parent_of(cur);
        }
        out.reverse();
        out
    }

    /// Checks the offset and descendant-count invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let root = self.nodes.first().ok_or_else(|| Error::invalid_operation("missing root row"))?;
        if root.tnid != ROOT || root.rel_pidx != 0 || root.ndesc + 1 != self.nodes.len() {
            return Err(Error::invalid_operation("root row is malformed"));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let children = self.children_of(idx);
            let sum: usize = children.iter().map(|&c| 1 + self.nodes[c].ndesc).sum();
            if sum != node.ndesc {
                return Err(Error::invalid_operation(format!(
                    "row {}: children span {} but ndesc is {}",
                    idx, sum, node.ndesc
                )));
            }
            if children.len() != node.nchild {
                return Err(Error::invalid_operation(format!(
                    "row {}: {} children but nchild is {}",
                    idx,
                    children.len(),
                    node.nchild
                )));
            }
            for c in children {
                let child = &self.nodes[c];
                if c - child.rel_pidx != idx || child.depth != node.depth + 1 {
                    return Err(Error::invalid_operation(format!(
                        "row {}: parent offset or depth does not point at row {}",
                        c, idx
                    )));
                }
            }
            if node.ndesc > 0 && !node.expanded {
                return Err(Error::invalid_operation(format!(
                    "row {}: collapsed row has visible descendants",
                    idx
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortOrder;
    use alloc::vec;
    use strata_core::{DataType, Scalar, Schema};
    use strata_incremental::{AggSpec, FilterSet, Port, Reducer};
    use strata_storage::MasterState;

    /// Tree over (cat, sub) with sum(amt):
    /// A(x=1, y=2), B(x=3, z=4), C(x=5)
    fn tree() -> PivotTree {
        let schema = Schema::new(vec![
            ("id".into(), DataType::Int64),
            ("cat".into(), DataType::Str),
            ("sub".into(), DataType::Str),
            ("amt".into(), DataType::Float64),
        ]);
        let mut master = MasterState::new(schema.clone(), "id").unwrap();
        let mut port = Port::new(schema.clone(), "id").unwrap();
        let mut b = port.batch();
        for (id, cat, sub, amt) in [
            (1, "A", "x", 1.0),
            (2, "A", "y", 2.0),
            (3, "B", "x", 3.0),
            (4, "B", "z", 4.0),
            (5, "C", "x", 50.0),
        ] {
            b.insert(&[
                Scalar::Int64(id),
                Scalar::from(cat),
                Scalar::from(sub),
                Scalar::Float64(amt),
            ])
            .unwrap();
        }
        port.send(b).unwrap();
        master.fill_master_table(&port.flatten());
        let agg = AggSpec::new("amt", Reducer::Sum).bind(&schema).unwrap();
        let mut tree = PivotTree::new(vec![agg], vec!["sum(amt)".into()]);
        tree.build_from_master(&master, &[1, 2], &FilterSet::default());
        tree
    }

    fn values(t: &Traversal, tree: &PivotTree) -> Vec<Scalar> {
        t.nodes().iter().map(|n| tree.get_value(n.tnid).clone()).collect()
    }

    #[test]
    fn test_expand_and_collapse() {
        let tree = tree();
        let mut t = Traversal::new();
        assert_eq!(t.expand_node(&tree, &[], 0), 3);
        assert_eq!(t.expand_node(&tree, &[], 0), 0);
        // expand B (row 2)
        assert_eq!(t.expand_node(&tree, &[], 2), 2);
        t.check_invariants().unwrap();
        assert_eq!(
            values(&t, &tree),
            vec![
                Scalar::None,
                Scalar::from("A"),
                Scalar::from("B"),
                Scalar::from("x"),
                Scalar::from("z"),
                Scalar::from("C"),
            ]
        );
        assert_eq!(t.get(5).map(|n| n.rel_pidx), Some(5));

        assert_eq!(t.collapse_node(2), 2);
        t.check_invariants().unwrap();
        assert_eq!(t.len(), 4);
        assert_eq!(t.get(3).map(|n| n.rel_pidx), Some(3));
    }

    #[test]
    fn test_collapse_updates_every_ancestor() {
        let tree = tree();
        let mut t = Traversal::new();
        t.set_depth(&tree, &[], 2);
        assert_eq!(t.len(), 9);
        let b = t.get_traversal_index(tree.resolve_path(ROOT, &[Scalar::from("B")]).unwrap()).unwrap();
        let before = t.get(0).unwrap().ndesc;
        assert_eq!(t.collapse_node(b), 2);
        assert_eq!(t.get(0).unwrap().ndesc, before - 2);
        t.check_invariants().unwrap();
        // re-expanding reproduces the same order
        assert_eq!(t.expand_node(&tree, &[], b), 2);
        let mut fresh = Traversal::new();
        fresh.set_depth(&tree, &[], 2);
        assert_eq!(t.nodes(), fresh.nodes());
    }

    #[test]
    fn test_sorted_expand_only_reorders_siblings() {
        let tree = tree();
        let mut t = Traversal::new();
        t.expand_node(&tree, &[SortSpec::new(0, SortOrder::Desc)], 0);
        assert_eq!(
            values(&t, &tree)[1..],
            [Scalar::from("C"), Scalar::from("B"), Scalar::from("A")]
        );
    }

    #[test]
    fn test_set_depth_collapses_deeper_nodes() {
        let tree = tree();
        let mut t = Traversal::new();
        t.set_depth(&tree, &[], 2);
        assert_eq!(t.set_depth(&tree, &[], 1), 4);
        t.check_invariants().unwrap();
        assert!(!t.is_expanded(1));
        assert_eq!(t.set_depth(&tree, &[], 0), 1);
    }

    #[test]
    fn test_max_depth() {
        let tree = tree();
        let mut t = Traversal::with_max_depth(1);
        t.set_depth(&tree, &[], 5);
        assert_eq!(t.len(), 4);
        assert_eq!(t.expand_node(&tree, &[], 1), 0);
    }

    #[test]
    fn test_index_round_trip() {
        let tree = tree();
        let mut t = Traversal::new();
        t.set_depth(&tree, &[], 2);
        for idx in 0..t.len() {
            let tnid = t.get_tree_index(idx).unwrap();
            assert_eq!(t.get_traversal_index(tnid), Some(idx));
        }
        assert_eq!(t.get_tree_index(99), None);
    }

    #[test]
    fn test_remove_and_insert_child() {
        let tree = tree();
        let mut t = Traversal::new();
        t.set_depth(&tree, &[], 2);
        let a = tree.resolve_path(ROOT, &[Scalar::from("A")]).unwrap();
        let row = t.get_traversal_index(a).unwrap();
        assert_eq!(t.remove_node(row), 3);
        t.check_invariants().unwrap();
        assert_eq!(t.len(), 6);

        let at = t.insert_child(&tree, &[], 0, a).unwrap();
        assert_eq!(at, 1);
        t.check_invariants().unwrap();
        assert_eq!(t.get(0).unwrap().nchild, 3);
        assert_eq!(t.get(2).map(|n| n.rel_pidx), Some(2));
    }

    #[test]
    fn test_insert_child_follows_sort() {
        let tree = tree();
        let sort = [SortSpec::new(0, SortOrder::Desc)];
        let mut t = Traversal::new();
        t.set_depth(&tree, &sort, 1);
        let b = tree.resolve_path(ROOT, &[Scalar::from("B")]).unwrap();
        assert_eq!(t.get_traversal_index(b), Some(2));
        t.remove_node(2);
        assert_eq!(t.insert_child(&tree, &sort, 0, b), Some(2));
        t.check_invariants().unwrap();
        assert_eq!(
            values(&t, &tree)[1..],
            [Scalar::from("C"), Scalar::from("B"), Scalar::from("A")]
        );
        assert!(!t.is_empty());
    }

    #[test]
    fn test_rebuild_preserves_expansion() {
        let tree = tree();
        let mut t = Traversal::new();
        t.expand_node(&tree, &[], 0);
        t.expand_node(&tree, &[], 3);
        let expanded = t.expanded_ids();
        let sort = [SortSpec::new(0, SortOrder::Desc)];
        t.rebuild(&tree, &sort, &expanded);
        t.check_invariants().unwrap();
        assert_eq!(t.expanded_ids(), expanded);
        assert_eq!(tree.get_value(t.get_tree_index(1).unwrap()), &Scalar::from("C"));
        assert_eq!(t.len(), 5);
        assert_eq!(t.path_ids(2).len(), 2);
    }
}
