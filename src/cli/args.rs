//! Command-line argument definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::pipeline::churn::TrainingOptions;

/// Shelf-φ - Price-per-unit analysis of retail data and customer churn modelling
#[derive(Parser, Debug)]
#[command(name = "shelfphi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory for reports (defaults to the current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub output_dir: PathBuf,

    /// Overwrite existing reports without asking
    #[arg(long, global = true, default_value = "false")]
    pub no_confirm: bool,

    /// Package all written reports into a single zip archive
    #[arg(long, global = true, default_value = "false")]
    pub bundle: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (very slow for large files).
    #[arg(long, global = true, default_value = "10000")]
    pub infer_schema_length: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Price-per-unit distributions by unit group and product category
    Pricing(PricingArgs),

    /// Tune, select and evaluate churn classifiers
    Churn(ChurnArgs),
}

#[derive(Args, Debug)]
pub struct PricingArgs {
    /// Directory holding the products, transactions and demographics tables (.csv or .parquet)
    pub data_dir: PathBuf,

    /// TOML pricing plan. Defaults to the count, pounds, ounces, beer and bread analyses.
    #[arg(short, long)]
    pub plan: Option<PathBuf>,

    /// Number of histogram bins (overrides the plan)
    #[arg(long, value_parser = validate_bins)]
    pub bins: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ChurnArgs {
    /// Customer file (CSV or Parquet) with a Status column of Current/Left
    pub input: PathBuf,

    /// Base seed for the split, folds and bootstrap samples
    #[arg(long, default_value = "123")]
    pub seed: u64,

    /// Share of each class used for training
    #[arg(long, default_value = "0.7", value_parser = validate_train_fraction)]
    pub train_fraction: f64,

    /// Cross-validation folds
    #[arg(long, default_value = "5", value_parser = validate_folds)]
    pub folds: usize,

    /// Probability of leaving at or above which a customer is predicted to leave
    #[arg(long, default_value = "0.5", value_parser = validate_threshold)]
    pub threshold: f64,

    /// Levels per parameter of the spline grid
    #[arg(long, default_value = "25", value_parser = validate_levels)]
    pub mars_levels: usize,

    /// Levels per parameter of the random forest grid.
    /// The grid has levels^3 configurations, each fitted once per fold.
    #[arg(long, default_value = "5", value_parser = validate_levels)]
    pub rf_levels: usize,

    /// Columns to drop before modelling (comma-separated), e.g. customer IDs
    #[arg(long, value_delimiter = ',')]
    pub drop_columns: Vec<String>,
}

impl ChurnArgs {
    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            seed: self.seed,
            train_fraction: self.train_fraction,
            folds: self.folds,
            mars_levels: self.mars_levels,
            forest_levels: self.rf_levels,
        }
    }
}

impl Cli {
    /// Path of a report file inside the output directory
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Path of the zip archive for a pipeline run
    pub fn bundle_path(&self, pipeline: &str) -> PathBuf {
        self.output_dir.join(format!("shelfphi_{}_reports.zip", pipeline))
    }

    /// Input path of the selected subcommand
    pub fn input(&self) -> &Path {
        match &self.command {
            Commands::Pricing(args) => &args.data_dir,
            Commands::Churn(args) => &args.input,
        }
    }
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for train_fraction parameter
fn validate_train_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = parse_number(s)?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!(
            "train_fraction must be strictly between 0.0 and 1.0, got {}",
            value
        ))
    }
}

/// Validator for threshold parameter
fn validate_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = parse_number(s)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threshold must be between 0.0 and 1.0, got {}", value))
    }
}

/// Validator for folds parameter
fn validate_folds(s: &str) -> Result<usize, String> {
    let value: usize = parse_number(s)?;
    if (2..=20).contains(&value) {
        Ok(value)
    } else {
        Err(format!("folds must be between 2 and 20, got {}", value))
    }
}

/// Validator for grid level parameters
fn validate_levels(s: &str) -> Result<usize, String> {
    let value: usize = parse_number(s)?;
    if (1..=50).contains(&value) {
        Ok(value)
    } else {
        Err(format!("grid levels must be between 1 and 50, got {}", value))
    }
}

/// Validator for bins parameter
fn validate_bins(s: &str) -> Result<usize, String> {
    let value: usize = parse_number(s)?;
    if (1..=200).contains(&value) {
        Ok(value)
    } else {
        Err(format!("bins must be between 1 and 200, got {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_churn_defaults() {
        let cli = Cli::parse_from(["shelfphi", "churn", "customers.csv"]);
        let Commands::Churn(args) = &cli.command else {
            panic!("expected churn subcommand");
        };
        let options = args.training_options();
        assert_eq!(options.seed, 123);
        assert_eq!(options.train_fraction, 0.7);
        assert_eq!(options.folds, 5);
        assert_eq!(options.mars_levels, 25);
        assert_eq!(options.forest_levels, 5);
        assert_eq!(args.threshold, 0.5);
        assert!(args.drop_columns.is_empty());
        assert_eq!(cli.input(), Path::new("customers.csv"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "shelfphi",
            "pricing",
            "data",
            "--no-confirm",
            "--output-dir",
            "out",
            "--bundle",
        ]);
        assert!(cli.no_confirm);
        assert!(cli.bundle);
        assert_eq!(cli.output_file("x.json"), PathBuf::from("out/x.json"));
        assert_eq!(cli.bundle_path("pricing"), PathBuf::from("out/shelfphi_pricing_reports.zip"));
    }

    #[test]
    fn test_drop_columns_split_on_comma() {
        let cli = Cli::parse_from(["shelfphi", "churn", "c.csv", "--drop-columns", "CustomerID,Region"]);
        let Commands::Churn(args) = cli.command else {
            panic!("expected churn subcommand");
        };
        assert_eq!(args.drop_columns, vec!["CustomerID", "Region"]);
    }

    #[test]
    fn test_validators_reject_out_of_range() {
        assert!(validate_train_fraction("1.0").is_err());
        assert!(validate_train_fraction("0.7").is_ok());
        assert!(validate_threshold("1.5").is_err());
        assert!(validate_folds("1").is_err());
        assert!(validate_levels("0").is_err());
        assert!(validate_bins("abc").is_err());
    }

    #[test]
    fn test_invalid_fraction_fails_parse() {
        let result = Cli::try_parse_from(["shelfphi", "churn", "c.csv", "--train-fraction", "2"]);
        assert!(result.is_err());
    }
}
