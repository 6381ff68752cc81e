//! View configurations.
//!
//! Configs name columns and reducers; they are bound against the master
//! schema when a context is created, which is where unknown pivot, shown or
//! aggregate columns surface as errors. Filters on unknown columns and sort
//! keys that point past the available columns or aggregates are dropped with
//! a warning instead.

use alloc::string::String;
use alloc::vec::Vec;
use strata_core::{Error, Result, Schema};
use strata_incremental::{AggSpec, BoundAgg, Combiner, Filter, FilterSet, Reducer};
use strata_tree::sort::retain_valid;
use strata_tree::{SortOrder, SortSpec};

/// Where column-axis totals sit in a two-axis pivot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TotalsMode {
    /// A column node's totals precede its children.
    #[default]
    Before,
    /// A column node's totals follow its children.
    After,
    /// Only unexpanded column nodes are shown.
    Hidden,
}

/// Flat view: a filtered, sorted projection of master rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatConfig {
    /// Shown columns; empty means every master column.
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub combiner: Combiner,
    /// Sort keys by column name.
    pub sort: Vec<(String, SortOrder)>,
}

impl FlatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| String::from(*c)).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn combiner(mut self, combiner: Combiner) -> Self {
        self.combiner = combiner;
        self
    }

    pub fn sort(mut self, column: &str, order: SortOrder) -> Self {
        self.sort.push((column.into(), order));
        self
    }

    pub(crate) fn bind(&self, schema: &Schema) -> Result<BoundFlat> {
        let columns: Vec<usize> = if self.columns.is_empty() {
            (0..schema.len()).collect()
        } else {
            self.columns
                .iter()
                .map(|name| {
                    schema
                        .index_of(name)
                        .ok_or_else(|| Error::column_not_found("flat view", name.as_str()))
                })
                .collect::<Result<_>>()?
        };
        let filter = FilterSet::bind(schema, &self.filters, self.combiner);
        let mut sort = Vec::with_capacity(self.sort.len());
        for (name, order) in &self.sort {
            match columns.iter().position(|&c| schema.names()[c] == *name) {
                Some(view_col) => sort.push(SortSpec::new(view_col, *order)),
                None => tracing::warn!(column = name.as_str(), "dropping sort on unknown column"),
            }
        }
        Ok(BoundFlat {
            columns,
            filter,
            sort,
        })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct BoundFlat {
    pub columns: Vec<usize>,
    pub filter: FilterSet,
    /// Indices are view columns.
    pub sort: Vec<SortSpec>,
}

/// Pivot view over one or two axes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PivotConfig {
    pub row_pivots: Vec<String>,
    /// Column-axis pivots; only two-axis views use them.
    pub column_pivots: Vec<String>,
    pub aggregates: Vec<AggSpec>,
    pub filters: Vec<Filter>,
    pub combiner: Combiner,
    pub totals: TotalsMode,
    /// Row sort, by aggregate index.
    pub sort: Vec<SortSpec>,
    /// Column sort, by aggregate index.
    pub column_sort: Vec<SortSpec>,
    /// Initial automatic row depth; `None` starts with the root collapsed.
    pub depth: Option<usize>,
    /// Initial automatic column depth; `None` shows every column level.
    pub column_depth: Option<usize>,
}

impl PivotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_pivot(mut self, column: &str) -> Self {
        self.row_pivots.push(column.into());
        self
    }

    pub fn column_pivot(mut self, column: &str) -> Self {
        self.column_pivots.push(column.into());
        self
    }

    pub fn aggregate(mut self, column: &str, reducer: Reducer) -> Self {
        self.aggregates.push(AggSpec::new(column, reducer));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn combiner(mut self, combiner: Combiner) -> Self {
        self.combiner = combiner;
        self
    }

    pub fn totals(mut self, totals: TotalsMode) -> Self {
        self.totals = totals;
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    pub fn column_sort(mut self, spec: SortSpec) -> Self {
        self.column_sort.push(spec);
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn column_depth(mut self, depth: usize) -> Self {
        self.column_depth = Some(depth);
        self
    }

    pub(crate) fn bind(&self, schema: &Schema) -> Result<BoundPivot> {
        let resolve = |names: &[String]| -> Result<Vec<usize>> {
            names
                .iter()
                .map(|name| {
                    schema
                        .index_of(name)
                        .ok_or_else(|| Error::column_not_found("pivot", name.as_str()))
                })
                .collect()
        };
        let row_pivots = resolve(&self.row_pivots)?;
        let column_pivots = resolve(&self.column_pivots)?;
        let (aggs, labels) = bind_aggregates(schema, &self.aggregates)?;
        let filter = FilterSet::bind(schema, &self.filters, self.combiner);
        let sort = checked_sort(&self.sort, aggs.len());
        let column_sort = checked_sort(&self.column_sort, aggs.len());
        Ok(BoundPivot {
            row_pivots,
            column_pivots,
            aggs,
            labels,
            filter,
            totals: self.totals,
            sort,
            column_sort,
            depth: self.depth,
            column_depth: self.column_depth,
        })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct BoundPivot {
    pub row_pivots: Vec<usize>,
    pub column_pivots: Vec<usize>,
    pub aggs: Vec<BoundAgg>,
    pub labels: Vec<String>,
    pub filter: FilterSet,
    pub totals: TotalsMode,
    pub sort: Vec<SortSpec>,
    pub column_sort: Vec<SortSpec>,
    pub depth: Option<usize>,
    pub column_depth: Option<usize>,
}

/// Parent/child hierarchy over master rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupedConfig {
    /// Column holding each row's own key; `None` means the master pkey.
    pub child_column: Option<String>,
    /// Column holding the key of the row's parent.
    pub parent_column: String,
    pub aggregates: Vec<AggSpec>,
    pub filters: Vec<Filter>,
    pub combiner: Combiner,
    /// Sibling sort, by aggregate index.
    pub sort: Vec<SortSpec>,
    pub depth: Option<usize>,
}

impl GroupedConfig {
    /// Creates a config linking rows through `parent_column`.
    pub fn new(parent_column: &str) -> Self {
        Self {
            parent_column: parent_column.into(),
            ..Self::default()
        }
    }

    pub fn child_column(mut self, column: &str) -> Self {
        self.child_column = Some(column.into());
        self
    }

    pub fn aggregate(mut self, column: &str, reducer: Reducer) -> Self {
        self.aggregates.push(AggSpec::new(column, reducer));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn combiner(mut self, combiner: Combiner) -> Self {
        self.combiner = combiner;
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub(crate) fn bind(&self, schema: &Schema, pkey_idx: usize) -> Result<BoundGrouped> {
        let child = match &self.child_column {
            Some(name) => schema
                .index_of(name)
                .ok_or_else(|| Error::column_not_found("grouped view", name.as_str()))?,
            None => pkey_idx,
        };
        let parent = schema
            .index_of(&self.parent_column)
            .ok_or_else(|| Error::column_not_found("grouped view", self.parent_column.as_str()))?;
        let (child_type, parent_type) = (schema.types()[child], schema.types()[parent]);
        if child_type != parent_type {
            return Err(Error::type_mismatch(child_type, parent_type));
        }
        let (aggs, labels) = bind_aggregates(schema, &self.aggregates)?;
        let filter = FilterSet::bind(schema, &self.filters, self.combiner);
        let sort = checked_sort(&self.sort, aggs.len());
        Ok(BoundGrouped {
            child,
            parent,
            aggs,
            labels,
            filter,
            sort,
            depth: self.depth,
        })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct BoundGrouped {
    pub child: usize,
    pub parent: usize,
    pub aggs: Vec<BoundAgg>,
    pub labels: Vec<String>,
    pub filter: FilterSet,
    pub sort: Vec<SortSpec>,
    pub depth: Option<usize>,
}

fn bind_aggregates(schema: &Schema, specs: &[AggSpec]) -> Result<(Vec<BoundAgg>, Vec<String>)> {
    let aggs = specs.iter().map(|a| a.bind(schema)).collect::<Result<Vec<_>>>()?;
    let labels = specs.iter().map(|a| a.label()).collect();
    Ok((aggs, labels))
}

/// Drops sort keys that point past `limit`, with a warning.
pub(crate) fn checked_sort(spec: &[SortSpec], limit: usize) -> Vec<SortSpec> {
    let mut spec = spec.to_vec();
    let dropped = retain_valid(&mut spec, limit);
    if dropped > 0 {
        tracing::warn!(dropped, limit, "dropping sort keys past the last aggregate");
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use strata_core::DataType;

    fn schema() -> Schema {
        Schema::new(vec![
            ("id".into(), DataType::Int64),
            ("parent".into(), DataType::Int64),
            ("cat".into(), DataType::Str),
            ("amt".into(), DataType::Float64),
        ])
    }

    #[test]
    fn test_flat_bind() {
        let bound = FlatConfig::new()
            .columns(&["amt", "id"])
            .sort("id", SortOrder::Desc)
            .sort("cat", SortOrder::Asc)
            .bind(&schema())
            .unwrap();
        assert_eq!(bound.columns, vec![3, 0]);
        // "cat" is not shown, so its sort key is dropped
        assert_eq!(bound.sort, vec![SortSpec::desc(1)]);
        assert!(FlatConfig::new().columns(&["nope"]).bind(&schema()).is_err());
    }

    #[test]
    fn test_pivot_bind() {
        let bound = PivotConfig::new()
            .row_pivot("cat")
            .aggregate("amt", Reducer::Sum)
            .sort(SortSpec::desc(0))
            .sort(SortSpec::asc(3))
            .bind(&schema())
            .unwrap();
        assert_eq!(bound.row_pivots, vec![2]);
        assert_eq!(bound.labels, vec![String::from("sum(amt)")]);
        assert_eq!(bound.sort, vec![SortSpec::desc(0)]);

        let bound = PivotConfig::new()
            .row_pivot("cat")
            .filter(Filter::equals("region", "EU"))
            .filter(Filter::gt("amt", 1.0))
            .bind(&schema())
            .unwrap();
        assert_eq!(bound.filter.columns().collect::<Vec<_>>(), vec![3]);

        let err = PivotConfig::new().row_pivot("region").bind(&schema()).unwrap_err();
        assert_eq!(err, Error::column_not_found("pivot", "region"));
    }

    #[test]
    fn test_grouped_bind() {
        let bound = GroupedConfig::new("parent").bind(&schema(), 0).unwrap();
        assert_eq!((bound.child, bound.parent), (0, 1));
        let err = GroupedConfig::new("cat").bind(&schema(), 0).unwrap_err();
        assert_eq!(err, Error::type_mismatch(DataType::Int64, DataType::Str));
    }
}
