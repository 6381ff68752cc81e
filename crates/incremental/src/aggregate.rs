//! Reducers for pivot aggregates.
//!
//! A reducer folds the source values of a node's rows into one scalar.
//! Associative reducers can also combine the partial results of child nodes,
//! so a rollup only touches the dirty path; the others are recomputed from
//! every descendant row.

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;
use hashbrown::HashSet;
use strata_core::{DataType, Error, Result, Scalar, Schema};

/// Aggregate function, selected by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reducer {
    /// Sum of valid values.
    Sum,
    /// Sum of absolute values.
    SumAbs,
    /// Number of rows.
    Count,
    /// Mean of valid values.
    Mean,
    /// Smallest valid value.
    Min,
    /// Largest valid value.
    Max,
    /// Number of distinct valid values.
    DistinctCount,
    /// The value if every valid value agrees, otherwise none.
    Unique,
    /// Any valid value.
    Any,
}

impl Reducer {
    /// Returns true if partial results of disjoint row sets can be combined.
    pub fn is_associative(&self) -> bool {
        matches!(
            self,
            Reducer::Sum | Reducer::SumAbs | Reducer::Count | Reducer::Min | Reducer::Max | Reducer::Any
        )
    }

    /// Returns the reducer's name.
    pub fn name(&self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::SumAbs => "sum_abs",
            Reducer::Count => "count",
            Reducer::Mean => "mean",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::DistinctCount => "distinct_count",
            Reducer::Unique => "unique",
            Reducer::Any => "any",
        }
    }

    /// Output type for an input column of `input` type.
    pub fn output_type(&self, input: DataType) -> DataType {
        match self {
            Reducer::Sum | Reducer::SumAbs => match input.delta_type() {
                DataType::None => DataType::Float64,
                widened => widened,
            },
            Reducer::Count | Reducer::DistinctCount => DataType::Int64,
            Reducer::Mean => DataType::Float64,
            Reducer::Min | Reducer::Max | Reducer::Unique | Reducer::Any => input,
        }
    }

    /// Folds source values into one aggregate.
    ///
    /// Every row contributes one item, so `Count` also counts unset cells.
    pub fn reduce<'a, I>(&self, values: I) -> Scalar
    where
        I: IntoIterator<Item = &'a Scalar>,
    {
        let mut values = values.into_iter();
        match self {
            Reducer::Sum => values.filter(|v| v.is_valid()).fold(Scalar::None, |acc, v| acc.add(v)),
            Reducer::SumAbs => values
                .filter(|v| v.is_valid())
                .fold(Scalar::None, |acc, v| acc.add(&v.abs())),
            Reducer::Count => Scalar::Int64(values.count() as i64),
            Reducer::Mean => {
                let (sum, n) = values
                    .filter_map(|v| v.to_f64())
                    .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if n == 0 {
                    Scalar::None
                } else {
                    Scalar::Float64(sum / n as f64)
                }
            }
            Reducer::Min => values.filter(|v| v.is_valid()).min().cloned().unwrap_or_default(),
            Reducer::Max => values.filter(|v| v.is_valid()).max().cloned().unwrap_or_default(),
            Reducer::DistinctCount => {
                let distinct: HashSet<&Scalar> = values.filter(|v| v.is_valid()).collect();
                Scalar::Int64(distinct.len() as i64)
            }
            Reducer::Unique => {
                let mut seen: Option<&Scalar> = None;
                for v in values.filter(|v| v.is_valid()) {
                    match seen {
                        None => seen = Some(v),
                        Some(s) if s == v => {}
                        Some(_) => return Scalar::None,
                    }
                }
                seen.cloned().unwrap_or_default()
            }
            Reducer::Any => values.find(|v| v.is_valid()).cloned().unwrap_or_default(),
        }
    }

    /// Combines partial aggregates of disjoint row sets.
    ///
    /// # Panics
    ///
    /// Panics for non-associative reducers.
    pub fn combine<'a, I>(&self, partials: I) -> Scalar
    where
        I: IntoIterator<Item = &'a Scalar>,
    {
        let partials = partials.into_iter();
        match self {
            Reducer::Sum | Reducer::SumAbs => partials.fold(Scalar::None, |acc, v| acc.add(v)),
            Reducer::Count => partials.fold(Scalar::Int64(0), |acc, v| acc.add(v)),
            Reducer::Min | Reducer::Max | Reducer::Any => self.reduce(partials),
            _ => panic!("reducer {} cannot combine partial results", self.name()),
        }
    }
}

impl FromStr for Reducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(Reducer::Sum),
            "sum_abs" => Ok(Reducer::SumAbs),
            "count" => Ok(Reducer::Count),
            "mean" | "avg" => Ok(Reducer::Mean),
            "min" => Ok(Reducer::Min),
            "max" => Ok(Reducer::Max),
            "distinct_count" => Ok(Reducer::DistinctCount),
            "unique" => Ok(Reducer::Unique),
            "any" => Ok(Reducer::Any),
            other => Err(Error::unknown_reducer(other)),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One configured aggregate: a reducer over a source column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggSpec {
    /// Source column name.
    pub column: String,
    /// Reducer applied to the column.
    pub reducer: Reducer,
}

impl AggSpec {
    /// Creates an aggregate spec.
    pub fn new(column: impl Into<String>, reducer: Reducer) -> Self {
        Self {
            column: column.into(),
            reducer,
        }
    }

    /// Creates an aggregate spec from a reducer name.
    pub fn parse(column: impl Into<String>, reducer: &str) -> Result<Self> {
        Ok(Self::new(column, reducer.parse()?))
    }

    /// Output column name, e.g. `sum(amt)`.
    pub fn label(&self) -> String {
        let mut out = self.reducer.name().to_string();
        out.push('(');
        out.push_str(&self.column);
        out.push(')');
        out
    }

    /// Resolves the source column against a schema.
    pub fn bind(&self, schema: &Schema) -> Result<BoundAgg> {
        let column = schema
            .index_of(&self.column)
            .ok_or_else(|| Error::column_not_found("aggregate", self.column.as_str()))?;
        let input = schema.types()[column];
        Ok(BoundAgg {
            column,
            reducer: self.reducer,
            output: self.reducer.output_type(input),
        })
    }
}

/// An aggregate resolved against a schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundAgg {
    /// Source column position.
    pub column: usize,
    /// Reducer.
    pub reducer: Reducer,
    /// Output dtype.
    pub output: DataType,
}
