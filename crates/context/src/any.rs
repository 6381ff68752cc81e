//! Tagged dispatch over the context variants.

use crate::context::{Context, ContextKind};
use crate::ctx0::Ctx0;
use crate::ctx1::Ctx1;
use crate::ctx2::Ctx2;
use crate::delta::{RowDelta, StepDelta};
use crate::grouped::CtxGroupedPkey;
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use strata_core::Scalar;
use strata_incremental::StepTables;
use strata_storage::MasterState;
use strata_tree::SortSpec;

/// Any context, held by the engine.
#[derive(Debug)]
pub enum AnyContext {
    Flat(Ctx0),
    OneSided(Ctx1),
    TwoSided(Ctx2),
    GroupedPkey(CtxGroupedPkey),
}

macro_rules! dispatch {
    ($self:expr, $ctx:ident => $body:expr) => {
        match $self {
            AnyContext::Flat($ctx) => $body,
            AnyContext::OneSided($ctx) => $body,
            AnyContext::TwoSided($ctx) => $body,
            AnyContext::GroupedPkey($ctx) => $body,
        }
    };
}

impl AnyContext {
    pub fn as_flat(&self) -> Option<&Ctx0> {
        match self {
            AnyContext::Flat(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_one_sided(&self) -> Option<&Ctx1> {
        match self {
            AnyContext::OneSided(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_two_sided(&self) -> Option<&Ctx2> {
        match self {
            AnyContext::TwoSided(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_two_sided_mut(&mut self) -> Option<&mut Ctx2> {
        match self {
            AnyContext::TwoSided(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&CtxGroupedPkey> {
        match self {
            AnyContext::GroupedPkey(ctx) => Some(ctx),
            _ => None,
        }
    }
}

impl From<Ctx0> for AnyContext {
    fn from(ctx: Ctx0) -> Self {
        AnyContext::Flat(ctx)
    }
}

impl From<Ctx1> for AnyContext {
    fn from(ctx: Ctx1) -> Self {
        AnyContext::OneSided(ctx)
    }
}

impl From<Ctx2> for AnyContext {
    fn from(ctx: Ctx2) -> Self {
        AnyContext::TwoSided(ctx)
    }
}

impl From<CtxGroupedPkey> for AnyContext {
    fn from(ctx: CtxGroupedPkey) -> Self {
        AnyContext::GroupedPkey(ctx)
    }
}

impl Context for AnyContext {
    fn kind(&self) -> ContextKind {
        dispatch!(self, c => c.kind())
    }

    fn init(&mut self, master: &MasterState) {
        dispatch!(self, c => c.init(master))
    }

    fn reset(&mut self) {
        dispatch!(self, c => c.reset())
    }

    fn step_begin(&mut self) {
        dispatch!(self, c => c.step_begin())
    }

    fn step_end(&mut self) {
        dispatch!(self, c => c.step_end())
    }

    fn notify_initial(&mut self, master: &MasterState) {
        dispatch!(self, c => c.notify_initial(master))
    }

    fn notify(&mut self, master: &MasterState, step: &StepTables) {
        dispatch!(self, c => c.notify(master, step))
    }

    fn num_rows(&self) -> usize {
        dispatch!(self, c => c.num_rows())
    }

    fn num_columns(&self) -> usize {
        dispatch!(self, c => c.num_columns())
    }

    fn column_names(&self) -> Vec<String> {
        dispatch!(self, c => c.column_names())
    }

    fn open(&mut self, idx: usize) -> usize {
        dispatch!(self, c => c.open(idx))
    }

    fn close(&mut self, idx: usize) -> usize {
        dispatch!(self, c => c.close(idx))
    }

    fn set_depth(&mut self, depth: usize) {
        dispatch!(self, c => c.set_depth(depth))
    }

    fn sort_by(&mut self, master: &MasterState, spec: Vec<SortSpec>) {
        dispatch!(self, c => c.sort_by(master, spec))
    }

    fn get_data(&self, master: &MasterState, rows: Range<usize>, columns: Range<usize>) -> Vec<Vec<Scalar>> {
        dispatch!(self, c => c.get_data(master, rows, columns))
    }

    fn get_row_path(&self, idx: usize) -> Vec<Scalar> {
        dispatch!(self, c => c.get_row_path(idx))
    }

    fn get_step_delta(&mut self, rows: Range<usize>) -> StepDelta {
        dispatch!(self, c => c.get_step_delta(rows))
    }

    fn get_row_delta(&mut self, master: &MasterState) -> RowDelta {
        dispatch!(self, c => c.get_row_delta(master))
    }

    fn get_pkeys(&self, cells: &[(usize, usize)]) -> Vec<Scalar> {
        dispatch!(self, c => c.get_pkeys(cells))
    }
}
