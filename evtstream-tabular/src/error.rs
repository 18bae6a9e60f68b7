//! Error types for row container operations.

use thiserror::Error;

/// Errors from row container operations.
#[derive(Debug, Error)]
pub enum TabularError {
    /// Schema or structural error (column count mismatch, row count mismatch, etc.)
    #[error("Schema error: {0}")]
    Schema(String),

    /// A column with this name is already present in the batch.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Rows of one column type were copied into a column of another type.
    #[error("Type mismatch for column {name}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        name: String,
        expected: crate::batch::FieldType,
        actual: crate::batch::FieldType,
    },
}

/// Result type for row container operations.
pub type Result<T> = std::result::Result<T, TabularError>;
