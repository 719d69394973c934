//! Error types for the analysis pipelines.

use thiserror::Error;

/// Errors raised by the pricing and churn pipelines.
///
/// I/O and parsing failures from polars are wrapped with `anyhow` context at
/// the call site; this enum covers the data conditions the pipelines check
/// themselves.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A required column is absent from an input table.
    #[error("Column '{column}' not found in {table}. Available columns: {available:?}")]
    MissingColumn {
        table: String,
        column: String,
        available: Vec<String>,
    },

    /// An input table has no rows left to work with.
    #[error("{0} contains no usable rows")]
    EmptyInput(String),

    /// The status column holds a value that is neither Current nor Left.
    #[error("Unrecognised status '{value}' at row {row} (expected 'Current' or 'Left')")]
    InvalidStatus { row: usize, value: String },

    /// Only one class label is present where two are required.
    #[error("Only one class present in {0}; both 'Current' and 'Left' are required")]
    SingleClass(String),

    /// Not enough rows to build the requested number of folds.
    #[error("Cannot build {folds} folds from {rows} rows")]
    TooFewRows { rows: usize, folds: usize },

    /// A category pattern failed to compile.
    #[error("Invalid category pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A pricing plan entry is inconsistent.
    #[error("Invalid pricing plan: {0}")]
    InvalidPlan(String),

    /// A hyperparameter grid has no points.
    #[error("Hyperparameter grid for {0} is empty")]
    EmptyGrid(String),

    /// Normal equations could not be solved.
    #[error("Singular system while fitting {0}")]
    Singular(String),
}
