//! Strata Core - scalar, column and table primitives for the Strata view engine.
//!
//! This crate provides the foundational types every other Strata crate builds on:
//!
//! - `DataType`: Supported column types (signed/unsigned ints, floats, bool, str, date, time)
//! - `Scalar`: A single typed cell value with total ordering
//! - `Column` / `Status`: Typed column storage with valid / unset / cleared cells
//! - `Table` / `Schema`: Named, equally sized columns
//! - `Vocab`: String interning for string columns
//! - `Op`: Insert / delete op codes carried by update batches
//! - `Pool`: Injected fork-join executor for column-parallel work
//! - `Error`: Error types for recoverable failures
//!
//! # Example
//!
//! ```rust
//! use strata_core::{DataType, Scalar, SchemaBuilder, Table};
//!
//! let schema = SchemaBuilder::new()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("amt", DataType::Float64)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let mut table = Table::new(schema);
//! table.set(0, 0, Scalar::Int64(1));
//! table.set(1, 0, Scalar::Float64(10.0));
//!
//! assert_eq!(table.num_rows(), 1);
//! assert_eq!(table.get(1, 0), &Scalar::Float64(10.0));
//! ```

#![no_std]

extern crate alloc;

mod column;
mod error;
mod op;
mod pool;
mod scalar;
mod schema;
mod table;
mod types;
mod vocab;

pub use column::{Column, Status};
pub use error::{Error, Result};
pub use op::Op;
pub use pool::Pool;
pub use scalar::Scalar;
pub use schema::{Schema, SchemaBuilder, OP_COLUMN};
pub use table::Table;
pub use types::DataType;
pub use vocab::Vocab;
