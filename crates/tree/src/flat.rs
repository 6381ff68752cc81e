//! Sorted, filtered row cursor for flat views.
//!
//! Entries are kept in a vector ordered by the sort values and then by pkey,
//! so every edit is a binary search plus one shift.

use crate::sort::{compare_keys, SortSpec};
use alloc::vec::Vec;
use core::cmp::Ordering;
use hashbrown::HashMap;
use strata_core::Scalar;

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    keys: Vec<Scalar>,
    pkey: Scalar,
}

/// Ordered set of visible pkeys.
#[derive(Clone, Debug, Default)]
pub struct FlatTraversal {
    sortby: Vec<SortSpec>,
    entries: Vec<Entry>,
    keys: HashMap<Scalar, Vec<Scalar>>,
}

impl FlatTraversal {
    /// Creates an empty cursor ordered by `sortby` (column positions), then pkey.
    pub fn new(sortby: Vec<SortSpec>) -> Self {
        Self {
            sortby,
            entries: Vec::new(),
            keys: HashMap::new(),
        }
    }

    /// Active sort.
    pub fn sortby(&self) -> &[SortSpec] {
        &self.sortby
    }

    /// Number of visible rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no row is visible.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `pkey` is visible.
    pub fn contains(&self, pkey: &Scalar) -> bool {
        self.keys.contains_key(pkey)
    }

    fn cmp(&self, e: &Entry, keys: &[Scalar], pkey: &Scalar) -> Ordering {
        compare_keys(&self.sortby, &e.keys, keys).then_with(|| e.pkey.cmp(pkey))
    }

    fn search(&self, keys: &[Scalar], pkey: &Scalar) -> core::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| self.cmp(e, keys, pkey))
    }

    /// Extracts the sort values from a row accessor.
    pub fn sort_values<'a, F>(&self, cell: F) -> Vec<Scalar>
    where
        F: Fn(usize) -> &'a Scalar,
    {
        self.sortby.iter().map(|s| cell(s.index).clone()).collect()
    }

    /// Inserts a row, returning its position. Re-inserting a visible pkey
    /// moves it.
    pub fn insert(&mut self, pkey: Scalar, keys: Vec<Scalar>) -> usize {
        if self.contains(&pkey) {
            return self.update(pkey, keys);
        }
        let pos = match self.search(&keys, &pkey) {
            Ok(pos) | Err(pos) => pos,
        };
        self.keys.insert(pkey.clone(), keys.clone());
        self.entries.insert(pos, Entry { keys, pkey });
        pos
    }

    /// Removes a row, returning the position it had.
    pub fn remove(&mut self, pkey: &Scalar) -> Option<usize> {
        let keys = self.keys.remove(pkey)?;
        let pos = self.search(&keys, pkey).ok()?;
        self.entries.remove(pos);
        Some(pos)
    }

    /// Replaces the sort values of a visible row (or inserts it), returning
    /// its new position.
    pub fn update(&mut self, pkey: Scalar, keys: Vec<Scalar>) -> usize {
        if self.keys.get(&pkey) == Some(&keys) {
            if let Ok(pos) = self.search(&keys, &pkey) {
                return pos;
            }
        }
        self.remove(&pkey);
        self.insert(pkey, keys)
    }

    /// Position of a visible pkey.
    pub fn position(&self, pkey: &Scalar) -> Option<usize> {
        let keys = self.keys.get(pkey)?;
        self.search(keys, pkey).ok()
    }

    /// Pkey shown at `idx`.
    pub fn get_pkey(&self, idx: usize) -> Option<&Scalar> {
        self.entries.get(idx).map(|e| &e.pkey)
    }

    /// Visible pkeys in order.
    pub fn pkeys(&self) -> impl Iterator<Item = &Scalar> + '_ {
        self.entries.iter().map(|e| &e.pkey)
    }

    /// Drops every row.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
    }

    /// Changes the sort and reorders every visible row.
    ///
    /// `resort` supplies the new sort values for each pkey.
    pub fn set_sort<F>(&mut self, sortby: Vec<SortSpec>, mut resort: F)
    where
        F: FnMut(&Scalar, &[SortSpec]) -> Vec<Scalar>,
    {
        self.sortby = sortby;
        for e in self.entries.iter_mut() {
            e.keys = resort(&e.pkey, &self.sortby);
            self.keys.insert(e.pkey.clone(), e.keys.clone());
        }
        let sortby = &self.sortby;
        self.entries
            .sort_by(|a, b| compare_keys(sortby, &a.keys, &b.keys).then_with(|| a.pkey.cmp(&b.pkey)));
    }
}
