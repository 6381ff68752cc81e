//! The contract every view implements.

use crate::delta::{RowDelta, StepDelta};
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use strata_core::Scalar;
use strata_incremental::StepTables;
use strata_storage::MasterState;
use strata_tree::SortSpec;

/// Which variant a context is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Filtered, sorted master rows.
    Flat,
    /// Rows grouped by one pivot axis.
    OneSided,
    /// Rows and columns grouped by two pivot axes.
    TwoSided,
    /// Rows nested by a parent/child key relation.
    GroupedPkey,
}

/// A live view over the master state.
///
/// A context is driven once per cycle: `step_begin`, then one of the notify
/// calls with the master already in its post-cycle state, then `step_end`.
/// Between cycles it answers queries and accepts expand/collapse/sort edits.
/// All mutation is single-threaded.
///
/// Row 0 of a pivoted view is the grand total; column 0 is always the row
/// label (pivot value, or pkey for flat views).
pub trait Context {
    fn kind(&self) -> ContextKind;

    /// Builds the view from scratch against `master`.
    fn init(&mut self, master: &MasterState);

    /// Drops all rows and view state; `init` must run again before use.
    fn reset(&mut self);

    fn step_begin(&mut self);

    /// Re-applies the active sort and automatic depth after a notify.
    fn step_end(&mut self);

    /// Initial load: the master went from empty to populated this cycle.
    ///
    /// Pivoted views rebuild their trees here, so row expansion other than
    /// the root does not survive a reload; an open root stays open unless
    /// an automatic depth is set. Column axes keep their automatic depth, if
    /// any, and otherwise show only the root. Grouped views restore
    /// expansion by row key.
    fn notify_initial(&mut self, master: &MasterState);

    /// Incremental update from one cycle's step tables.
    fn notify(&mut self, master: &MasterState, step: &StepTables);

    /// Number of visible rows.
    fn num_rows(&self) -> usize;

    /// Number of columns, the label column included.
    fn num_columns(&self) -> usize;

    fn column_names(&self) -> Vec<String>;

    /// Expands a row, returning how many rows appeared. Turns off automatic depth.
    fn open(&mut self, idx: usize) -> usize;

    /// Collapses a row, returning how many rows disappeared. Turns off automatic depth.
    fn close(&mut self, idx: usize) -> usize;

    /// Expands every row above `depth` and keeps doing so after each cycle.
    fn set_depth(&mut self, depth: usize);

    /// Replaces the row sort. Indices are aggregates for pivoted views and
    /// view columns for flat views; unknown indices are dropped.
    fn sort_by(&mut self, master: &MasterState, spec: Vec<SortSpec>);

    /// Dense cell slice; both ranges are clamped to the view.
    fn get_data(&self, master: &MasterState, rows: Range<usize>, columns: Range<usize>) -> Vec<Vec<Scalar>>;

    /// Pivot values from the root down to a row; empty when out of range.
    fn get_row_path(&self, idx: usize) -> Vec<Scalar>;

    /// Drains recorded cell changes, reporting those inside `rows`.
    fn get_step_delta(&mut self, rows: Range<usize>) -> StepDelta;

    /// Drains recorded changes as whole rows.
    fn get_row_delta(&mut self, master: &MasterState) -> RowDelta;

    /// Pkeys under the given `(row, column)` cells, descendants of collapsed
    /// rows included; out-of-range cells are skipped.
    fn get_pkeys(&self, cells: &[(usize, usize)]) -> Vec<Scalar>;
}

/// Clamps a requested range to `0..len`.
pub(crate) fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    let end = range.end.min(len);
    range.start.min(end)..end
}

/// Appends `items` to `out`, skipping values already present.
pub(crate) fn push_unique(out: &mut Vec<Scalar>, seen: &mut hashbrown::HashSet<Scalar>, items: Vec<Scalar>) {
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
}
