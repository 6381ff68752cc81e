//! Strata Incremental - per-cycle update pipeline for the Strata view engine.
//!
//! Between two cycles, callers queue sparse insert/update/delete batches. At
//! the start of a cycle the queue is flattened to one row per pkey and each
//! cell is classified against the master state, yielding row-aligned before,
//! after and delta relations that the pivot trees and views consume.
//!
//! # Core Concepts
//!
//! - `UpdateBatch`: Sparse ops against one schema (unset, set and cleared cells)
//! - `Port`: Queue of batches with `flatten()` coalescing
//! - `StepTables` / `Transition`: The six relations of one cycle
//! - `Reducer` / `AggSpec`: Aggregate functions selected by name
//! - `Filter` / `FilterSet`: Row predicates evaluated on prev or current values
//!
//! # Example
//!
//! ```rust
//! use strata_core::{DataType, Scalar, Schema};
//! use strata_incremental::{Port, StepTables, Transition};
//! use strata_storage::MasterState;
//!
//! let schema = Schema::new(vec![
//!     ("id".into(), DataType::Int64),
//!     ("amt".into(), DataType::Float64),
//! ]);
//! let mut master = MasterState::new(schema.clone(), "id").unwrap();
//! let mut port = Port::new(schema, "id").unwrap();
//!
//! let mut batch = port.batch();
//! batch.insert(&[Scalar::Int64(1), Scalar::Float64(5.0)]).unwrap();
//! port.send(batch).unwrap();
//! master.fill_master_table(&port.flatten());
//!
//! let mut batch = port.batch();
//! batch.update(1i64, &[("amt", Scalar::Float64(15.0))]).unwrap();
//! port.send(batch).unwrap();
//! let step = StepTables::compute(&master, port.flatten());
//!
//! assert_eq!(step.transition(1, 0), Transition::Changed);
//! assert_eq!(step.delta.get(1, 0), &Scalar::Float64(10.0));
//! ```

#![no_std]

extern crate alloc;

pub mod aggregate;
pub mod batch;
pub mod filter;
pub mod port;
pub mod transition;

pub use aggregate::{AggSpec, BoundAgg, Reducer};
pub use batch::UpdateBatch;
pub use filter::{Combiner, Filter, FilterOp, FilterSet};
pub use port::Port;
pub use transition::{StepTables, Transition, EXISTED_COLUMN};
