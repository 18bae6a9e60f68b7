//! Error types for chunked iteration.

use evtstream_tabular::TabularError;
use thiserror::Error;

/// Errors from building or reading a chunk iterator.
///
/// None of these are retried internally; an iterator that returned an error
/// from construction must be rebuilt, and one that returned an error from a
/// read holds an empty chunk.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// `sources` / `groups` have the wrong shape or mismatched lengths
    #[error("Argument type error: {0}")]
    ArgumentType(String),

    /// A source could not be opened or a group path did not resolve
    #[error("Resource access error: {0}")]
    ResourceAccess(String),

    /// An entry or position lies outside the virtual row space
    #[error("Selection range error: {0}")]
    SelectionRange(String),

    /// A friend iterator delivered a different number of rows than requested
    #[error("Alignment violation at entry {start}: friend read {actual} rows, expected {expected}")]
    Alignment {
        start: usize,
        expected: usize,
        actual: usize,
    },

    /// Primary and friend field masks share a column name
    #[error("Column collision: {0}")]
    ColumnCollision(String),

    /// Invalid option values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend read or decode failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Row container structural error
    #[error(transparent)]
    Tabular(#[from] TabularError),

    /// Config file parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChunkError {
    pub fn argument_type(msg: impl Into<String>) -> Self {
        Self::ArgumentType(msg.into())
    }

    pub fn resource_access(msg: impl Into<String>) -> Self {
        Self::ResourceAccess(msg.into())
    }

    pub fn selection_range(msg: impl Into<String>) -> Self {
        Self::SelectionRange(msg.into())
    }

    pub fn column_collision(msg: impl Into<String>) -> Self {
        Self::ColumnCollision(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Result type for chunk iteration.
pub type Result<T> = std::result::Result<T, ChunkError>;
