//! One expand/collapse axis over a pivot tree.
//!
//! Pivoted and grouped views keep one of these per axis. It owns the
//! traversal, the active sort and the automatic depth, and patches the
//! traversal from the structural changes of a tree update.

use alloc::vec::Vec;
use hashbrown::HashSet;
use strata_tree::sort::is_active;
use strata_tree::{NodeId, PivotTree, SortSpec, TreeChanges, Traversal};

#[derive(Clone, Debug)]
pub(crate) struct Axis {
    pub traversal: Traversal,
    pub sortby: Vec<SortSpec>,
    pub auto_depth: Option<usize>,
    max_depth: Option<usize>,
    changed: bool,
}

impl Axis {
    pub fn new(max_depth: Option<usize>, sortby: Vec<SortSpec>, auto_depth: Option<usize>) -> Self {
        Self {
            traversal: Self::empty(max_depth),
            sortby,
            auto_depth,
            max_depth,
            changed: false,
        }
    }

    fn empty(max_depth: Option<usize>) -> Traversal {
        match max_depth {
            Some(d) => Traversal::with_max_depth(d),
            None => Traversal::new(),
        }
    }

    /// Starts over with only the root showing, then applies the automatic depth.
    pub fn build(&mut self, tree: &PivotTree) {
        self.traversal = Self::empty(self.max_depth);
        if let Some(depth) = self.auto_depth {
            self.traversal.set_depth(tree, &self.sortby, depth);
        }
        self.changed = true;
    }

    /// Re-creates the visible rows from a set of expanded tree ids.
    pub fn restore(&mut self, tree: &PivotTree, expanded: &HashSet<NodeId>) {
        let before = self.visible_ids();
        self.traversal.rebuild(tree, &self.sortby, expanded);
        if let Some(depth) = self.auto_depth {
            self.traversal.set_depth(tree, &self.sortby, depth);
        }
        self.changed |= before != self.visible_ids();
    }

    /// Applies a tree update's removed and added nodes to the visible rows.
    pub fn patch(&mut self, tree: &PivotTree, changes: &TreeChanges) {
        for &id in &changes.removed {
            if let Some(idx) = self.traversal.get_traversal_index(id) {
                self.traversal.remove_node(idx);
                self.changed = true;
            }
        }
        for &id in &changes.added {
            let Some(parent) = tree.get_parent_idx(id) else {
                continue;
            };
            let Some(pidx) = self.traversal.get_traversal_index(parent) else {
                continue;
            };
            if self.traversal.insert_child(tree, &self.sortby, pidx, id).is_some() {
                self.changed = true;
            }
        }
    }

    /// End-of-cycle pass: re-sorts siblings by their new aggregates and
    /// expands newly added nodes under the automatic depth.
    pub fn finish(&mut self, tree: &PivotTree) {
        if is_active(&self.sortby) {
            let expanded = self.traversal.expanded_ids();
            self.restore(tree, &expanded);
        } else if let Some(depth) = self.auto_depth {
            let before = self.traversal.len();
            self.traversal.set_depth(tree, &self.sortby, depth);
            self.changed |= before != self.traversal.len();
        }
    }

    pub fn open(&mut self, tree: &PivotTree, idx: usize) -> usize {
        self.auto_depth = None;
        let n = self.traversal.expand_node(tree, &self.sortby, idx);
        self.changed |= n > 0;
        n
    }

    pub fn close(&mut self, idx: usize) -> usize {
        self.auto_depth = None;
        let n = self.traversal.collapse_node(idx);
        self.changed |= n > 0;
        n
    }

    pub fn set_depth(&mut self, tree: &PivotTree, depth: usize) {
        self.auto_depth = Some(depth);
        self.traversal.set_depth(tree, &self.sortby, depth);
        self.changed = true;
    }

    pub fn sort_by(&mut self, tree: &PivotTree, spec: Vec<SortSpec>) {
        self.sortby = spec;
        let expanded = self.traversal.expanded_ids();
        self.restore(tree, &expanded);
        self.changed = true;
    }

    pub fn visible_ids(&self) -> Vec<NodeId> {
        self.traversal.nodes().iter().map(|n| n.tnid).collect()
    }

    /// Tree node at a visible row.
    #[inline]
    pub fn node_at(&self, idx: usize) -> Option<NodeId> {
        self.traversal.get_tree_index(idx)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.traversal.len()
    }

    /// Returns whether rows changed since the last call, and resets the flag.
    pub fn take_changed(&mut self) -> bool {
        core::mem::take(&mut self.changed)
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }
}
