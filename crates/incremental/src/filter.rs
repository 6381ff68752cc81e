//! Row filters.
//!
//! Filters are evaluated through a cell accessor rather than against a table,
//! so the same filter can test a row's previous and current values in one
//! cycle and detect rows entering or leaving a view.

use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use strata_core::{Scalar, Schema};

/// Comparison applied by one filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
    /// Cell equals any operand.
    In,
    /// Cell equals no operand.
    NotIn,
    /// String cell starts with the operand.
    BeginsWith,
    /// String cell contains the operand.
    Contains,
}

/// How the filters of one view combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Combiner {
    #[default]
    And,
    Or,
}

/// A predicate over one named column.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    /// Operands; `In`/`NotIn` use all of them, unary ops none, the rest the first.
    pub operand: Vec<Scalar>,
}

impl Filter {
    /// Creates a filter.
    pub fn new(column: impl Into<String>, op: FilterOp, operand: Vec<Scalar>) -> Self {
        Self {
            column: column.into(),
            op,
            operand,
        }
    }

    /// `column == value`.
    pub fn equals(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(column, FilterOp::Eq, alloc::vec![value.into()])
    }

    /// `column > value`.
    pub fn gt(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(column, FilterOp::Gt, alloc::vec![value.into()])
    }

    /// `column < value`.
    pub fn lt(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(column, FilterOp::Lt, alloc::vec![value.into()])
    }

    /// `column in values`.
    pub fn in_list(column: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self::new(column, FilterOp::In, values)
    }

    /// `column is null`.
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::IsNull, Vec::new())
    }

    /// `column is not null`.
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::IsNotNull, Vec::new())
    }

    fn test(&self, cell: &Scalar) -> bool {
        match self.op {
            FilterOp::IsNull => !cell.is_valid(),
            FilterOp::IsNotNull => cell.is_valid(),
            _ if !cell.is_valid() => false,
            FilterOp::In => self.operand.iter().any(|o| compare(cell, o) == Some(Ordering::Equal)),
            FilterOp::NotIn => !self.operand.iter().any(|o| compare(cell, o) == Some(Ordering::Equal)),
            FilterOp::BeginsWith | FilterOp::Contains => {
                match (cell.as_str(), self.operand.first().and_then(|o| o.as_str())) {
                    (Some(s), Some(p)) if self.op == FilterOp::BeginsWith => s.starts_with(p),
                    (Some(s), Some(p)) => s.contains(p),
                    _ => false,
                }
            }
            op => {
                let Some(ord) = self.operand.first().and_then(|o| compare(cell, o)) else {
                    return false;
                };
                match op {
                    FilterOp::Eq => ord == Ordering::Equal,
                    FilterOp::Ne => ord != Ordering::Equal,
                    FilterOp::Lt => ord == Ordering::Less,
                    FilterOp::Le => ord != Ordering::Greater,
                    FilterOp::Gt => ord == Ordering::Greater,
                    FilterOp::Ge => ord != Ordering::Less,
                    _ => false,
                }
            }
        }
    }
}

/// Compares by value; numerics compare across widths, other kinds must match.
fn compare(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    if a.is_numeric() && b.is_numeric() {
        match (a.as_i128(), b.as_i128()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.to_f64()?.partial_cmp(&b.to_f64()?),
        }
    } else if a.data_type() == b.data_type() {
        Some(a.cmp(b))
    } else {
        None
    }
}

/// Filters bound to column positions of one schema.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    filters: Vec<(usize, Filter)>,
    combiner: Combiner,
}

impl FilterSet {
    /// Resolves filter columns against `schema`.
    ///
    /// Filters on columns the schema lacks are dropped with a warning.
    pub fn bind(schema: &Schema, filters: &[Filter], combiner: Combiner) -> Self {
        let mut bound = Vec::with_capacity(filters.len());
        for f in filters {
            match schema.index_of(&f.column) {
                Some(col) => bound.push((col, f.clone())),
                None => tracing::warn!(column = f.column.as_str(), "dropping filter on unknown column"),
            }
        }
        Self {
            filters: bound,
            combiner,
        }
    }

    /// Returns true if there is nothing to filter.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Positions of the columns the filters read.
    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.filters.iter().map(|(c, _)| *c)
    }

    /// Tests a row given an accessor from column position to cell.
    ///
    /// An empty set accepts every row.
    pub fn matches<'a, F>(&self, cell: F) -> bool
    where
        F: Fn(usize) -> &'a Scalar,
    {
        if self.filters.is_empty() {
            return true;
        }
        match self.combiner {
            Combiner::And => self.filters.iter().all(|(c, f)| f.test(cell(*c))),
            Combiner::Or => self.filters.iter().any(|(c, f)| f.test(cell(*c))),
        }
    }
}
