//! Per-cycle orchestration of the port, the master state and the contexts.
//!
//! Callers queue batches with [`Engine::send`] and run a cycle with
//! [`Engine::process`]. A cycle flattens the queue, classifies it against
//! the master, applies it, then walks every registered context through
//! `step_begin`, one notify call and `step_end`.

use crate::any::AnyContext;
use crate::config::{FlatConfig, GroupedConfig, PivotConfig};
use crate::context::Context;
use crate::ctx0::Ctx0;
use crate::ctx1::Ctx1;
use crate::ctx2::Ctx2;
use crate::grouped::CtxGroupedPkey;
use alloc::collections::BTreeMap;
use strata_core::{Result, Schema};
use strata_incremental::{Port, StepTables, UpdateBatch};
use strata_storage::{MasterOptions, MasterState};

/// Engine tuning: master growth ratio and the column-parallel pool.
pub type EngineOptions = MasterOptions;

/// Unique identifier for a registered context.
pub type ContextId = u64;

/// Which context to create, with its configuration.
#[derive(Clone, Debug)]
pub enum ContextConfig {
    Flat(FlatConfig),
    OneSided(PivotConfig),
    TwoSided(PivotConfig),
    GroupedPkey(GroupedConfig),
}

/// Owns the update queue, the master state and every context over it.
#[derive(Debug)]
pub struct Engine {
    port: Port,
    master: MasterState,
    contexts: BTreeMap<ContextId, AnyContext>,
    next_id: ContextId,
    cycle: u64,
}

impl Engine {
    /// Creates an engine keyed by `pkey_column` with default options.
    pub fn new(schema: Schema, pkey_column: &str) -> Result<Self> {
        Self::with_options(schema, pkey_column, EngineOptions::default())
    }

    /// Creates an engine with explicit options.
    pub fn with_options(schema: Schema, pkey_column: &str, options: EngineOptions) -> Result<Self> {
        let port = Port::new(schema.clone(), pkey_column)?;
        let master = MasterState::with_options(schema, pkey_column, options)?;
        Ok(Self {
            port,
            master,
            contexts: BTreeMap::new(),
            next_id: 1,
            cycle: 0,
        })
    }

    pub fn schema(&self) -> &Schema {
        self.master.schema()
    }

    /// The master state as of the last cycle.
    pub fn master(&self) -> &MasterState {
        &self.master
    }

    /// Number of cycles run so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Starts an empty batch against the engine schema.
    pub fn batch(&self) -> UpdateBatch {
        self.port.batch()
    }

    /// Queues a batch for the next cycle.
    pub fn send(&mut self, batch: UpdateBatch) -> Result<()> {
        self.port.send(batch)
    }

    /// Number of queued batches.
    pub fn pending(&self) -> usize {
        self.port.pending()
    }

    /// Runs one cycle. Returns false when nothing was queued.
    pub fn process(&mut self) -> bool {
        if self.port.is_empty() {
            return false;
        }
        let flattened = self.port.flatten();
        self.cycle += 1;
        let span = tracing::debug_span!("engine_cycle", cycle = self.cycle, rows = flattened.num_rows());
        let _guard = span.enter();

        if self.master.is_empty() {
            self.master.fill_master_table(&flattened);
            for ctx in self.contexts.values_mut() {
                ctx.step_begin();
                ctx.notify_initial(&self.master);
                ctx.step_end();
            }
        } else {
            let step = StepTables::compute(&self.master, flattened);
            self.master.update_master_table(&step.flattened);
            for ctx in self.contexts.values_mut() {
                ctx.step_begin();
                ctx.notify(&self.master, &step);
                ctx.step_end();
            }
        }
        true
    }

    /// Creates a context and initializes it against the current rows.
    pub fn register(&mut self, config: ContextConfig) -> Result<ContextId> {
        let schema = self.master.schema();
        let mut ctx: AnyContext = match &config {
            ContextConfig::Flat(c) => Ctx0::new(schema, c)?.into(),
            ContextConfig::OneSided(c) => Ctx1::new(schema, c)?.into(),
            ContextConfig::TwoSided(c) => Ctx2::new(schema, c)?.into(),
            ContextConfig::GroupedPkey(c) => {
                CtxGroupedPkey::new(schema, self.master.pkey_index(), c)?.into()
            }
        };
        ctx.init(&self.master);
        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(id, kind = ?ctx.kind(), rows = ctx.num_rows(), "context registered");
        self.contexts.insert(id, ctx);
        Ok(id)
    }

    /// Drops a context, returning it.
    pub fn unregister(&mut self, id: ContextId) -> Option<AnyContext> {
        self.contexts.remove(&id)
    }

    pub fn context(&self, id: ContextId) -> Option<&AnyContext> {
        self.contexts.get(&id)
    }

    /// A context for editing, alongside the master its queries read.
    pub fn context_mut(&mut self, id: ContextId) -> Option<(&mut AnyContext, &MasterState)> {
        let master = &self.master;
        self.contexts.get_mut(&id).map(|ctx| (ctx, master))
    }

    /// Number of registered contexts.
    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Drops every row, queued batch and view state; contexts stay
    /// registered and come back empty.
    pub fn reset(&mut self) {
        self.port.clear();
        self.master.reset();
        for ctx in self.contexts.values_mut() {
            ctx.reset();
            ctx.init(&self.master);
        }
    }
}
