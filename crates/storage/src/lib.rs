//! Strata Storage - canonical master state for the Strata view engine.
//!
//! This crate owns the one authoritative copy of every live row:
//!
//! - `MasterState`: pkey -> row index map over a dense columnar table, with a
//!   free list so deleted indices are reused
//! - `MasterOptions`: growth ratio and the injected column-parallel executor
//!
//! # Example
//!
//! ```rust
//! use strata_core::{DataType, Op, Scalar, Schema, Table, OP_COLUMN};
//! use strata_storage::MasterState;
//!
//! let schema = Schema::new(vec![
//!     ("id".into(), DataType::Int64),
//!     ("amt".into(), DataType::Float64),
//! ]);
//! let mut master = MasterState::new(schema.clone(), "id").unwrap();
//!
//! let mut batch = Table::new(schema.with_column(OP_COLUMN, DataType::UInt8));
//! batch.set(0, 0, Scalar::Int64(1));
//! batch.set(1, 0, Scalar::Float64(10.0));
//! batch.set(2, 0, Op::Insert.to_scalar());
//! master.fill_master_table(&batch);
//!
//! assert_eq!(master.get(1, &Scalar::Int64(1)), &Scalar::Float64(10.0));
//! ```

#![no_std]

extern crate alloc;

pub mod master;

pub use master::{MasterOptions, MasterState, DEFAULT_GROWTH_RATIO};
