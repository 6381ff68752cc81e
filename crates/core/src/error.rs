//! Error types for Strata.
//!
//! Only recoverable, caller-facing failures live here (bad schemas, configs that
//! name unknown columns or reducers, badly typed batch cells). Internal
//! invariant violations panic instead.

use crate::types::DataType;
use alloc::string::String;
use core::fmt;

/// Result type alias for Strata operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for Strata operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Type mismatch error.
    TypeMismatch {
        expected: DataType,
        got: DataType,
    },
    /// Column not found.
    ColumnNotFound {
        table: String,
        column: String,
    },
    /// Invalid schema definition.
    InvalidSchema {
        message: String,
    },
    /// Reducer name not present in the registry.
    UnknownReducer {
        name: String,
    },
    /// Context configuration rejected during init.
    InvalidConfig {
        message: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TypeMismatch { expected, got } => {
                write!(f, "Type mismatch: expected {}, got {}", expected.name(), got.name())
            }
            Error::ColumnNotFound { table, column } => {
                write!(f, "Column {} not found in table {}", column, table)
            }
            Error::InvalidSchema { message } => {
                write!(f, "Invalid schema: {}", message)
            }
            Error::UnknownReducer { name } => {
                write!(f, "Unknown reducer: {}", name)
            }
            Error::InvalidConfig { message } => {
                write!(f, "Invalid config: {}", message)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an unknown reducer error.
    pub fn unknown_reducer(name: impl Into<String>) -> Self {
        Error::UnknownReducer { name: name.into() }
    }

    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
