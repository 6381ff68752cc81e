//! Strata Context - live views over the Strata master state.
//!
//! A context keeps one view of the master rows current across update
//! cycles and serves windowed reads, expand/collapse edits and per-cycle
//! change reports:
//!
//! - `Ctx0`: filtered, sorted master rows
//! - `Ctx1`: rows grouped by a list of row pivots
//! - `Ctx2`: rows and columns grouped by two pivot lists
//! - `CtxGroupedPkey`: rows nested by a parent-key column
//! - `Engine`: owns the update queue, the master state and the contexts
//!
//! # Example
//!
//! ```rust
//! use strata_context::{Context, ContextConfig, Engine, PivotConfig};
//! use strata_core::{DataType, Scalar, Schema};
//! use strata_incremental::Reducer;
//!
//! let schema = Schema::new(vec![
//!     ("id".into(), DataType::Int64),
//!     ("cat".into(), DataType::Str),
//!     ("amt".into(), DataType::Float64),
//! ]);
//! let mut engine = Engine::new(schema, "id").unwrap();
//! let view = engine
//!     .register(ContextConfig::OneSided(
//!         PivotConfig::new().row_pivot("cat").aggregate("amt", Reducer::Sum),
//!     ))
//!     .unwrap();
//!
//! let mut batch = engine.batch();
//! batch.insert(&[Scalar::Int64(1), Scalar::from("A"), Scalar::Float64(5.0)]).unwrap();
//! batch.insert(&[Scalar::Int64(2), Scalar::from("B"), Scalar::Float64(2.0)]).unwrap();
//! engine.send(batch).unwrap();
//! engine.process();
//!
//! let (ctx, master) = engine.context_mut(view).unwrap();
//! ctx.open(0);
//! assert_eq!(ctx.num_rows(), 3);
//! assert_eq!(ctx.get_data(master, 0..1, 1..2), vec![vec![Scalar::Float64(7.0)]]);
//! ```

#![no_std]

extern crate alloc;

mod axis;

pub mod any;
pub mod config;
pub mod context;
pub mod ctx0;
pub mod ctx1;
pub mod ctx2;
pub mod delta;
pub mod engine;
pub mod grouped;

pub use any::AnyContext;
pub use config::{FlatConfig, GroupedConfig, PivotConfig, TotalsMode};
pub use context::{Context, ContextKind};
pub use ctx0::{Ctx0, FlatChange};
pub use ctx1::{Ctx1, INDEX_COLUMN, LABEL_COLUMN};
pub use ctx2::Ctx2;
pub use delta::{CellChange, RowDelta, StepDelta};
pub use engine::{ContextConfig, ContextId, Engine, EngineOptions};
pub use grouped::CtxGroupedPkey;
