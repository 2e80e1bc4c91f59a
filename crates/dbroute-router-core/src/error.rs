//! Error types for the router module

use dbroute_core::ConfigError;
use thiserror::Error;

/// Coarse classification of a [`RouterError`].
///
/// None of these are transient: retrying reproduces the same failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid layout or pool configuration; fatal at startup
    Configuration,
    /// The call arguments carry no usable routing key value
    KeyMissing,
    /// A split-table statement could not be rewritten
    Pattern,
}

/// Router error types
#[derive(Debug, Error)]
pub enum RouterError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A routed pool identifier has no registered target
    #[error("No data source registered for pool {pool:?}")]
    MissingPool { pool: String },

    /// A computed index fell outside its dimension
    #[error("{dimension} index {index} out of range for {count} shards")]
    IndexOutOfRange {
        dimension: &'static str,
        index: u64,
        count: u32,
    },

    /// The call arguments do not contain the routing key
    #[error("Operation {operation:?} has no value for routing key {key:?}")]
    KeyMissing { operation: String, key: String },

    /// The routing key value was empty
    #[error("Routing key value is empty")]
    EmptyKey,

    /// A split-table statement has no FROM/INTO/UPDATE table reference
    #[error("No table reference found in split statement: {sql}")]
    NoTableReference { sql: String },

    /// The occurrence pattern for a table name could not be compiled
    #[error("Cannot match occurrences of table {table:?}: {reason}")]
    TablePattern { table: String, reason: String },

    /// A split-table statement was prepared outside a routed call
    #[error("No table index in routing context for table {table:?}")]
    MissingTableIndex { table: String },
}

impl RouterError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::Config(_) | RouterError::MissingPool { .. } | RouterError::IndexOutOfRange { .. } => {
                ErrorKind::Configuration
            }
            RouterError::KeyMissing { .. } | RouterError::EmptyKey => ErrorKind::KeyMissing,
            RouterError::NoTableReference { .. }
            | RouterError::MissingTableIndex { .. }
            | RouterError::TablePattern { .. } => ErrorKind::Pattern,
        }
    }
}
