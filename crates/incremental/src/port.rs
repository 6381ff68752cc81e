//! Pending-update queue.
//!
//! A `Port` collects the batches sent between two cycles and flattens them
//! into one table with at most one row per pkey.

use crate::batch::UpdateBatch;
use alloc::vec::Vec;
use hashbrown::HashMap;
use strata_core::{DataType, Error, Op, Result, Scalar, Schema, Status, Table, OP_COLUMN};

/// Queue of update batches for one schema.
#[derive(Debug)]
pub struct Port {
    schema: Schema,
    pkey_idx: usize,
    queue: Vec<UpdateBatch>,
}

impl Port {
    /// Creates an empty port.
    pub fn new(schema: Schema, pkey_column: &str) -> Result<Self> {
        let pkey_idx = schema
            .index_of(pkey_column)
            .ok_or_else(|| Error::column_not_found("port", pkey_column))?;
        Ok(Self {
            schema,
            pkey_idx,
            queue: Vec::new(),
        })
    }

    /// Returns the data schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Starts an empty batch for this port's schema.
    pub fn batch(&self) -> UpdateBatch {
        match UpdateBatch::new(&self.schema, &self.schema.names()[self.pkey_idx]) {
            Ok(batch) => batch,
            Err(err) => panic!("port schema lost its pkey column: {}", err),
        }
    }

    /// Queues a batch.
    pub fn send(&mut self, batch: UpdateBatch) -> Result<()> {
        let expected = self.schema.with_column(OP_COLUMN, DataType::UInt8);
        if batch.table().schema() != &expected {
            return Err(Error::invalid_operation("batch schema does not match port schema"));
        }
        if batch.pkey_index() != self.pkey_idx {
            return Err(Error::invalid_operation("batch pkey does not match port pkey"));
        }
        if !batch.is_empty() {
            self.queue.push(batch);
        }
        Ok(())
    }

    /// Number of queued batches.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every queued batch.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Drains the queue into one row per pkey, in first-seen order.
    ///
    /// Later set or cleared cells overwrite earlier ones; unset cells never do.
    /// A delete drops the values pending for its pkey and becomes the row's op.
    /// An insert following a delete starts from a row with every cell cleared.
    pub fn flatten(&mut self) -> Table {
        let mut out = Table::new(self.schema.with_column(OP_COLUMN, DataType::UInt8));
        let op_idx = self.schema.len();
        let mut rows: HashMap<Scalar, usize> = HashMap::new();

        for batch in self.queue.drain(..) {
            let src = batch.table();
            for r in 0..batch.num_rows() {
                let pkey = batch.pkey(r).clone();
                let op = batch.op(r);
                let (row, seen) = match rows.get(&pkey) {
                    Some(&row) => (row, true),
                    None => {
                        let row = out.push_row();
                        rows.insert(pkey.clone(), row);
                        (row, false)
                    }
                };
                let prior = seen.then(|| Op::from_scalar(out.get(op_idx, row)));

                match op {
                    Op::Delete => {
                        out.unset_row(row);
                        out.set(self.pkey_idx, row, pkey);
                    }
                    Op::Insert => {
                        if prior == Some(Op::Delete) {
                            for col in 0..op_idx {
                                out.column_at_mut(col).clear(row);
                            }
                            out.set(self.pkey_idx, row, pkey);
                        }
                        for col in 0..op_idx {
                            if src.status(col, r) != Status::Invalid {
                                out.column_at_mut(col).copy_cell(row, src.column_at(col), r);
                            }
                        }
                    }
                }
                out.set(op_idx, row, op.to_scalar());
            }
        }
        tracing::trace!(rows = out.num_rows(), "flattened pending batches");
        out
    }
}
