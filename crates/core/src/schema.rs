//! Schema definitions: ordered column names and data types.

use crate::error::{Error, Result};
use crate::types::DataType;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Name of the op column carried by update batches.
pub const OP_COLUMN: &str = "__op";

/// An ordered list of named, typed columns.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Schema {
    names: Vec<String>,
    types: Vec<DataType>,
}

impl Schema {
    /// Creates a schema from `(name, type)` pairs without validation.
    pub fn new(columns: Vec<(String, DataType)>) -> Self {
        let (names, types) = columns.into_iter().unzip();
        Self { names, types }
    }

    /// Returns the column names.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the column types.
    #[inline]
    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// Number of columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the schema has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Gets a column index by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Gets a column type by name.
    pub fn type_of(&self, name: &str) -> Option<DataType> {
        self.index_of(name).map(|i| self.types[i])
    }

    /// Returns true if the schema has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Returns a copy of this schema with an extra column appended.
    pub fn with_column(&self, name: impl Into<String>, dtype: DataType) -> Self {
        let mut out = self.clone();
        out.names.push(name.into());
        out.types.push(dtype);
        out
    }

    /// Iterates `(name, type)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DataType)> + '_ {
        self.names.iter().map(|n| n.as_str()).zip(self.types.iter().copied())
    }
}

/// Builder for validated schemas.
///
/// Names must be non-empty, unique, and must not use the reserved `__` prefix.
pub struct SchemaBuilder {
    columns: Vec<(String, DataType)>,
}

impl SchemaBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self { columns: Vec::new() }
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_schema("Name cannot be empty"));
        }
        if name.starts_with("__") {
            return Err(Error::invalid_schema(format!(
                "Names starting with '__' are reserved: {}",
                name
            )));
        }
        Ok(())
    }

    /// Adds a column.
    pub fn add_column(mut self, name: &str, dtype: DataType) -> Result<Self> {
        Self::check_naming_rules(name)?;
        if self.columns.iter().any(|(n, _)| n == name) {
            return Err(Error::invalid_schema(format!("Duplicate column: {}", name)));
        }
        if dtype == DataType::None {
            return Err(Error::invalid_schema(format!(
                "Column {} cannot have type none",
                name
            )));
        }
        self.columns.push((name.to_string(), dtype));
        Ok(self)
    }

    /// Builds the schema.
    pub fn build(self) -> Result<Schema> {
        if self.columns.is_empty() {
            return Err(Error::invalid_schema("Schema must have at least one column"));
        }
        Ok(Schema::new(self.columns))
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
