//! Strata Tree - pivot hierarchies and visible-row cursors for the Strata view engine.
//!
//! # Core Concepts
//!
//! - `PivotTree`: Arena of nodes grouping master rows by pivot values, with
//!   rollup aggregates in a side table and a delta index of changed cells
//! - `Traversal`: Flat pre-order list of the visible nodes of a tree,
//!   navigated by relative parent offsets and descendant counts
//! - `FlatTraversal`: Sorted cursor over master rows for flat views
//! - `SortSpec` / `SortOrder`: Multi-key ordering of siblings or rows
//!
//! # Example
//!
//! ```rust
//! use strata_core::{DataType, Scalar, Schema};
//! use strata_incremental::{AggSpec, FilterSet, Port, Reducer};
//! use strata_storage::MasterState;
//! use strata_tree::{PivotTree, Traversal, ROOT};
//!
//! let schema = Schema::new(vec![
//!     ("id".into(), DataType::Int64),
//!     ("cat".into(), DataType::Str),
//!     ("amt".into(), DataType::Float64),
//! ]);
//! let mut master = MasterState::new(schema.clone(), "id").unwrap();
//! let mut port = Port::new(schema.clone(), "id").unwrap();
//! let mut batch = port.batch();
//! batch.insert(&[Scalar::Int64(1), Scalar::from("A"), Scalar::Float64(5.0)]).unwrap();
//! batch.insert(&[Scalar::Int64(2), Scalar::from("B"), Scalar::Float64(2.0)]).unwrap();
//! port.send(batch).unwrap();
//! master.fill_master_table(&port.flatten());
//!
//! let sum = AggSpec::new("amt", Reducer::Sum);
//! let mut tree = PivotTree::new(vec![sum.bind(&schema).unwrap()], vec![sum.label()]);
//! tree.build_from_master(&master, &[1], &FilterSet::default());
//!
//! let mut view = Traversal::new();
//! assert_eq!(view.expand_node(&tree, &[], 0), 2);
//! assert_eq!(tree.get_aggregate(ROOT, 0), &Scalar::Float64(7.0));
//! ```

#![no_std]

extern crate alloc;

pub mod flat;
pub mod pivot_tree;
pub mod sort;
pub mod traversal;

pub use flat::FlatTraversal;
pub use pivot_tree::{CellDelta, NodeId, PivotTree, TreeChanges, TreeNode, ROOT};
pub use sort::{compare_keys, SortOrder, SortSpec};
pub use traversal::{TravNode, Traversal};
