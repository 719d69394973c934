//! JSON, CSV and zip export of pipeline results

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;

use super::pricing_report::AnalysisOutcome;
use crate::pipeline::churn::{Evaluation, FamilySearch, TrainingOptions};
use crate::pipeline::SalesPoint;

/// File name of the pricing JSON report
pub const PRICING_REPORT_FILE: &str = "pricing_report.json";

/// File name of the churn JSON report
pub const CHURN_REPORT_FILE: &str = "churn_report.json";

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Timestamp of the run (RFC 3339)
    pub timestamp: String,
    pub shelfphi_version: String,
    pub command: String,
    pub inputs: Vec<String>,
}

impl ReportMetadata {
    pub fn new(command: &str, inputs: &[&Path]) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            shelfphi_version: env!("CARGO_PKG_VERSION").to_string(),
            command: command.to_string(),
            inputs: inputs.iter().map(|p| p.display().to_string()).collect(),
        }
    }
}

/// Row counts of the retail tables
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetailStats {
    pub products: usize,
    pub normalized_products: usize,
    pub transactions: usize,
    pub demographics: usize,
}

/// Complete pricing report
#[derive(Debug, Clone, Serialize)]
pub struct PricingReport {
    pub metadata: ReportMetadata,
    pub dataset: RetailStats,
    pub histogram_bins: usize,
    pub analyses: Vec<AnalysisOutcome>,
}

/// Row and class counts of the customer data
#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomerStats {
    pub rows: usize,
    pub dropped_rows: usize,
    pub left: usize,
    pub current: usize,
    pub predictors: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Complete churn report
#[derive(Debug, Clone, Serialize)]
pub struct ChurnReport {
    pub metadata: ReportMetadata,
    pub dataset: CustomerStats,
    pub options: TrainingOptions,
    pub searches: Vec<FamilySearch>,
    pub evaluation: Evaluation,
}

/// Serialize a report as pretty JSON
pub fn write_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

/// File-system safe slug of an analysis name
pub fn slug(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let trimmed = slug.trim_matches('_');
    if trimmed.is_empty() {
        "analysis".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Path of the per-product CSV for an analysis
pub fn product_csv_path(output_dir: &Path, outcome: &AnalysisOutcome) -> PathBuf {
    output_dir.join(format!("pricing_{}.csv", slug(&outcome.spec.name)))
}

/// Write per-product averages of one analysis as CSV.
///
/// Sales columns are empty for products missing from that sales view.
pub fn export_product_averages(outcome: &AnalysisOutcome, path: &Path) -> Result<()> {
    let averages = &outcome.analysis.averages;
    let sales_column = |name: &str, points: &[SalesPoint]| {
        let by_product: HashMap<&str, f64> = points
            .iter()
            .map(|p| (p.product_id.as_str(), p.sales_value))
            .collect();
        Column::new(
            name.into(),
            averages
                .iter()
                .map(|a| by_product.get(a.product_id.as_str()).copied())
                .collect::<Vec<Option<f64>>>(),
        )
    };
    let mut df = DataFrame::new(vec![
        Column::new(
            "product_id".into(),
            averages.iter().map(|a| a.product_id.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "avg_price_per_unit".into(),
            averages.iter().map(|a| a.avg_price_per_unit).collect::<Vec<_>>(),
        ),
        Column::new(
            "transactions".into(),
            averages.iter().map(|a| a.transactions as u64).collect::<Vec<_>>(),
        ),
        sales_column("mean_sales_value", &outcome.mean_sales.points),
        sales_column("total_sales_value", &outcome.total_sales.points),
    ])
    .context("Failed to build product averages table")?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(&mut df)
        .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
    Ok(())
}

/// Package report files into a zip archive and remove the originals
pub fn package_reports(files: &[PathBuf], zip_path: &Path) -> Result<()> {
    use std::io::{Read, Write};
    use ::zip::write::SimpleFileOptions;
    use ::zip::ZipWriter;

    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(::zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?;
        zip.start_file(filename, options)
            .with_context(|| format!("Failed to add {} to zip", filename))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
    }

    zip.finish().context("Failed to finalize zip file")?;

    for path in files {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove bundled file: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Beer"), "beer");
        assert_eq!(slug("Ounces (all)"), "ounces__all");
        assert_eq!(slug("***"), "analysis");
    }

    #[test]
    fn test_metadata_records_inputs() {
        let meta = ReportMetadata::new("churn", &[Path::new("customers.csv")]);
        assert_eq!(meta.command, "churn");
        assert_eq!(meta.inputs, vec!["customers.csv"]);
        assert_eq!(meta.shelfphi_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_package_reports_removes_originals() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.csv");
        std::fs::write(&a, "{}").unwrap();
        std::fs::write(&b, "x\n1\n").unwrap();

        let zip_path = dir.path().join("bundle.zip");
        package_reports(&[a.clone(), b.clone()], &zip_path).unwrap();

        assert!(zip_path.exists());
        assert!(!a.exists());
        assert!(!b.exists());
    }
}
