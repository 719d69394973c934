//! Customer records for churn modelling
//!
//! Reads the customer CSV, maps `Status` to a two-class label, drops rows
//! without a usable `TotalCharges` value and encodes the remaining columns as
//! numeric predictors.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;

use crate::pipeline::error::AnalysisError;
use crate::pipeline::loader::{
    column_names, float_values, is_numeric_column, load_dataset, require_columns, string_values,
};
use crate::pipeline::stats::quantile;

pub const TENURE: &str = "Tenure";
pub const TOTAL_CHARGES: &str = "TotalCharges";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const PAYMENT_METHOD: &str = "PaymentMethod";
pub const STATUS: &str = "Status";

/// Level used for missing categorical values
const MISSING_LEVEL: &str = "(missing)";

/// Churn status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Label {
    Current,
    Left,
}

impl Label {
    pub fn is_left(self) -> bool {
        self == Label::Left
    }

    pub fn from_left(left: bool) -> Self {
        if left {
            Label::Left
        } else {
            Label::Current
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Current => write!(f, "Current"),
            Label::Left => write!(f, "Left"),
        }
    }
}

impl std::str::FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current" => Ok(Label::Current),
            "left" => Ok(Label::Left),
            _ => Err(format!("Unknown status '{}'", s)),
        }
    }
}

/// How a predictor column is encoded
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PredictorKind {
    Numeric,
    /// Values are indices into `levels` (sorted)
    Categorical { levels: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predictor {
    pub name: String,
    pub kind: PredictorKind,
}

impl Predictor {
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, PredictorKind::Categorical { .. })
    }
}

/// Column-major numeric matrix
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureMatrix {
    pub columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from columns of equal length
    pub fn from_columns(columns: Vec<Vec<f64>>) -> Self {
        let n_rows = columns.first().map_or(0, |c| c.len());
        debug_assert!(columns.iter().all(|c| c.len() == n_rows));
        Self { columns, n_rows }
    }

    /// Build from rows of equal length
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n_cols = rows.first().map_or(0, |r| r.len());
        let columns = (0..n_cols)
            .map(|j| rows.iter().map(|r| r[j]).collect())
            .collect();
        Self {
            columns,
            n_rows: rows.len(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.columns[col][row]
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[row]).collect()
    }

    /// Rows at `indices`, in that order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| indices.iter().map(|&i| c[i]).collect())
                .collect(),
            n_rows: indices.len(),
        }
    }
}

/// One customer row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub tenure: f64,
    pub total_charges: f64,
    pub monthly_charges: f64,
    pub payment_method: Option<String>,
    pub status: Label,
}

/// Loaded customer data: records plus their encoded predictors
#[derive(Debug, Clone)]
pub struct CustomerTable {
    pub predictors: Vec<Predictor>,
    pub records: Vec<CustomerRecord>,
    pub features: FeatureMatrix,
    /// Rows removed because Tenure, TotalCharges or MonthlyCharges was missing or not numeric
    pub dropped_rows: usize,
}

impl CustomerTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `true` for customers who left
    pub fn left_flags(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.status.is_left()).collect()
    }

    pub fn predictor_names(&self) -> Vec<String> {
        self.predictors.iter().map(|p| p.name.clone()).collect()
    }

    pub fn count(&self, label: Label) -> usize {
        self.records.iter().filter(|r| r.status == label).count()
    }
}

/// Load customers from a CSV or Parquet file
pub fn load_customers(path: &Path, infer_schema_length: usize, drop_columns: &[String]) -> Result<CustomerTable> {
    let df = load_dataset(path, infer_schema_length)?;
    customers_from_frame(&df, drop_columns)
}

/// Build a customer table from a loaded frame.
///
/// Every column except `Status` and `drop_columns` becomes a predictor.
/// Rows missing tenure or either charge are dropped. Gaps in other numeric
/// columns are filled with the column median; text gaps get their own level.
pub fn customers_from_frame(df: &DataFrame, drop_columns: &[String]) -> Result<CustomerTable> {
    require_columns(
        df,
        "customer data",
        &[TENURE, TOTAL_CHARGES, MONTHLY_CHARGES, PAYMENT_METHOD, STATUS],
    )?;

    // Rows missing tenure or a charge are dropped
    let tenure = float_values(df, TENURE)?;
    let total_charges = float_values(df, TOTAL_CHARGES)?;
    let monthly = float_values(df, MONTHLY_CHARGES)?;
    fn defined(column: &[Option<f64>], i: usize) -> Option<f64> {
        column[i].filter(|v| v.is_finite())
    }
    let measured: Vec<(usize, f64, f64, f64)> = (0..df.height())
        .filter_map(|i| {
            Some((
                i,
                defined(&tenure, i)?,
                defined(&total_charges, i)?,
                defined(&monthly, i)?,
            ))
        })
        .collect();
    let keep: Vec<usize> = measured.iter().map(|m| m.0).collect();
    let dropped_rows = df.height() - keep.len();

    if keep.is_empty() {
        return Err(AnalysisError::EmptyInput("customer data".to_string()).into());
    }

    let statuses = string_values(df, STATUS)?;
    let mut labels = Vec::with_capacity(keep.len());
    for &i in &keep {
        let raw = statuses[i].as_deref().unwrap_or("");
        let label = raw.parse::<Label>().map_err(|_| AnalysisError::InvalidStatus {
            row: i + 1,
            value: raw.to_string(),
        })?;
        labels.push(label);
    }

    let payment = string_values(df, PAYMENT_METHOD)?;

    let records: Vec<CustomerRecord> = measured
        .iter()
        .zip(&labels)
        .map(|(&(i, tenure, total_charges, monthly_charges), &status)| CustomerRecord {
            tenure,
            total_charges,
            monthly_charges,
            payment_method: payment[i].clone(),
            status,
        })
        .collect();

    let mut predictors = Vec::new();
    let mut columns = Vec::new();
    for name in column_names(df) {
        if name == STATUS || drop_columns.iter().any(|d| d == &name) {
            continue;
        }
        let (predictor, values) = encode_column(df, &name, &keep)?;
        predictors.push(predictor);
        columns.push(values);
    }

    Ok(CustomerTable {
        predictors,
        records,
        features: FeatureMatrix::from_columns(columns),
        dropped_rows,
    })
}

fn encode_column(df: &DataFrame, name: &str, keep: &[usize]) -> Result<(Predictor, Vec<f64>)> {
    if is_numeric_column(df, name) || name == TOTAL_CHARGES {
        let all = float_values(df, name)?;
        let kept: Vec<Option<f64>> = keep.iter().map(|&i| all[i]).collect();
        let defined: Vec<f64> = kept.iter().flatten().copied().collect();
        let fill = quantile(&defined, 0.5).unwrap_or(0.0);
        let values = kept.into_iter().map(|v| v.unwrap_or(fill)).collect();
        return Ok((
            Predictor {
                name: name.to_string(),
                kind: PredictorKind::Numeric,
            },
            values,
        ));
    }

    let all = string_values(df, name)?;
    let kept: Vec<&str> = keep
        .iter()
        .map(|&i| all[i].as_deref().unwrap_or(MISSING_LEVEL))
        .collect();
    let levels: Vec<String> = kept
        .iter()
        .map(|s| s.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let values = kept
        .iter()
        .map(|s| levels.iter().position(|l| l == s).unwrap_or(0) as f64)
        .collect();

    Ok((
        Predictor {
            name: name.to_string(),
            kind: PredictorKind::Categorical { levels },
        },
        values,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "Gender" => ["Male", "Female", "Female", "Male"],
            "Tenure" => [1i64, 40, 0, 12],
            "MonthlyCharges" => [50.0f64, 80.0, 20.0, 65.5],
            "TotalCharges" => ["50", "3200", " ", "786"],
            "PaymentMethod" => ["Mailed check", "Bank transfer", "Mailed check", "Credit card"],
            "Status" => ["Left", "Current", "Current", "current"],
        }
        .unwrap()
    }

    #[test]
    fn test_drops_missing_total_charges() {
        let table = customers_from_frame(&frame(), &[]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.dropped_rows, 1);
        assert_eq!(table.records[1].total_charges, 3200.0);
        assert_eq!(table.records[2].status, Label::Current);
    }

    #[test]
    fn test_drops_missing_monthly_charges_and_tenure() {
        let df = df! {
            "Tenure" => [Some(1i64), None, Some(5), Some(12)],
            "MonthlyCharges" => [Some(50.0f64), Some(80.0), None, Some(65.5)],
            "TotalCharges" => [50.0f64, 3200.0, 100.0, 786.0],
            "PaymentMethod" => ["Mailed check", "Bank transfer", "Mailed check", "Credit card"],
            "Status" => ["Left", "Current", "Left", "Current"],
        }
        .unwrap();

        let table = customers_from_frame(&df, &[]).unwrap();
        assert_eq!(table.dropped_rows, 2);
        let monthly: Vec<f64> = table.records.iter().map(|r| r.monthly_charges).collect();
        assert_eq!(monthly, vec![50.0, 65.5]);
        // Records and encoded predictors agree on every kept row
        let monthly_column = table
            .predictor_names()
            .iter()
            .position(|n| n == "MonthlyCharges")
            .unwrap();
        assert_eq!(table.features.columns[monthly_column], monthly);
        assert_eq!(table.features.columns[0], vec![1.0, 12.0]);
    }

    #[test]
    fn test_predictors_exclude_status() {
        let table = customers_from_frame(&frame(), &[]).unwrap();
        let names = table.predictor_names();
        assert!(!names.contains(&STATUS.to_string()));
        assert_eq!(names.len(), 5);
        assert_eq!(table.features.n_rows(), 3);
    }

    #[test]
    fn test_categorical_levels_sorted() {
        let table = customers_from_frame(&frame(), &[]).unwrap();
        let gender = &table.predictors[0];
        assert_eq!(
            gender.kind,
            PredictorKind::Categorical {
                levels: vec!["Female".to_string(), "Male".to_string()]
            }
        );
        assert_eq!(table.features.columns[0], vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_total_charges_is_numeric_predictor() {
        let table = customers_from_frame(&frame(), &[]).unwrap();
        let idx = table
            .predictors
            .iter()
            .position(|p| p.name == TOTAL_CHARGES)
            .unwrap();
        assert_eq!(table.predictors[idx].kind, PredictorKind::Numeric);
        assert_eq!(table.features.columns[idx], vec![50.0, 3200.0, 786.0]);
    }

    #[test]
    fn test_drop_columns() {
        let table = customers_from_frame(&frame(), &["Gender".to_string()]).unwrap();
        assert!(!table.predictor_names().contains(&"Gender".to_string()));
    }

    #[test]
    fn test_invalid_status() {
        let df = df! {
            "Tenure" => [1i64],
            "MonthlyCharges" => [50.0f64],
            "TotalCharges" => [50.0f64],
            "PaymentMethod" => ["Mailed check"],
            "Status" => ["Gone"],
        }
        .unwrap();
        let err = customers_from_frame(&df, &[]).unwrap_err();
        assert!(err.to_string().contains("Gone"));
    }

    #[test]
    fn test_missing_required_column() {
        let df = df! { "Tenure" => [1i64] }.unwrap();
        assert!(customers_from_frame(&df, &[]).is_err());
    }

    #[test]
    fn test_matrix_select_rows() {
        let m = FeatureMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        let s = m.select_rows(&[2, 0]);
        assert_eq!(s.n_rows(), 2);
        assert_eq!(s.row(0), vec![5.0, 6.0]);
        assert_eq!(s.get(1, 1), 2.0);
    }
}
