//! Tabular editing errors.

use llm::LlmError;
use thiserror::Error;

/// Errors from table parsing, plan application, and charting.
#[derive(Debug, Error)]
pub enum TableError {
    /// Input file could not be parsed as a table
    #[error("Failed to parse table: {reason}")]
    Parse { reason: String },

    /// Unsupported upload format
    #[error("Unsupported file format '{extension}'; upload a .csv or .json file")]
    UnsupportedFormat { extension: String },

    /// Operation referenced a column the table does not have
    #[error("Unknown column: '{name}'")]
    UnknownColumn { name: String },

    /// Operation referenced a row outside the table
    #[error("Row index {row} out of bounds (table has {rows} rows)")]
    RowOutOfBounds { row: usize, rows: usize },

    /// Operation is invalid for the table's shape
    #[error("Invalid operation: {reason}")]
    InvalidOp { reason: String },

    /// Chart request cannot be built from this table
    #[error("Cannot build chart: {reason}")]
    Chart { reason: String },

    /// There is no staged preview to commit
    #[error("No pending change to apply")]
    NoPreview,

    /// History is already at the initial upload
    #[error("No more changes to undo")]
    NothingToUndo,

    /// The model call or plan parse failed
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),
}

/// Result alias for table operations.
pub type TableResult<T> = Result<T, TableError>;
