//! Dataset loader for CSV and Parquet files

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::{Path, PathBuf};

use super::error::AnalysisError;

/// Extensions recognised when looking up a table by name
const TABLE_EXTENSIONS: [&str; 2] = ["csv", "parquet"];

/// Load a dataset from a file (CSV or Parquet based on extension)
///
/// `infer_schema_length` only applies to CSV; 0 means a full table scan.
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    lf.collect()
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Locate `<dir>/<stem>.csv` or `<dir>/<stem>.parquet`
pub fn find_table(dir: &Path, stem: &str) -> Result<PathBuf> {
    TABLE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.is_file())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Table '{}' not found in {} (expected {}.csv or {}.parquet)",
                stem,
                dir.display(),
                stem,
                stem
            )
        })
}

/// Check that every named column is present
pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<(), AnalysisError> {
    let available: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    for column in columns {
        if !available.iter().any(|c| c == column) {
            return Err(AnalysisError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
                available,
            });
        }
    }
    Ok(())
}

/// Read a column as optional strings, casting non-string types.
///
/// Strings are trimmed; empty strings become `None`.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    let cast = column
        .cast(&DataType::String)
        .with_context(|| format!("Column '{}' cannot be read as text", name))?;
    let ca = cast.str()?;

    Ok(ca
        .iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        })
        .collect())
}

/// Read a column as optional floats. Values that cannot be parsed become `None`.
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;

    // Text columns are parsed value by value so blanks and stray text map to None
    if column.dtype() == &DataType::String {
        let ca = column.str()?;
        return Ok(ca
            .iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect());
    }

    let cast = column
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{}' must be numeric", name))?;
    let ca = cast.f64()?;
    Ok(ca.iter().collect())
}

/// Whether a column holds numeric data
pub fn is_numeric_column(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .map(|c| c.dtype().is_primitive_numeric() || c.dtype() == &DataType::Boolean)
        .unwrap_or(false)
}

/// Column names in table order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}
