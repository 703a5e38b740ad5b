//! Error types for tidesql

use thiserror::Error;

/// Result type alias for tidesql operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Invalid table/column name, malformed limit/offset, or other bad input.
    ///
    /// Raised at the call that supplied the bad input.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any failure reported by the underlying driver, including connectivity.
    #[error("Driver error: {0}")]
    Driver(String),

    /// A save/delete affected a row count other than exactly one.
    #[error("Save conflict on table '{table}': expected 1 affected row, got {affected}")]
    SaveConflict { table: String, affected: u64 },

    /// Commit/rollback without an active transaction.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap a driver failure, keeping only its message.
    pub fn driver(err: impl std::fmt::Display) -> Self {
        Self::Driver(err.to_string())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a driver error
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    /// Check if this is a save conflict
    pub fn is_save_conflict(&self) -> bool {
        matches!(self, Self::SaveConflict { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
