//! Retail reference tables: products, transactions and household demographics

use anyhow::{Context, Result};
use std::path::Path;

use super::loader::{find_table, float_values, load_dataset, require_columns, string_values};

pub const PRODUCTS_TABLE: &str = "products";
pub const TRANSACTIONS_TABLE: &str = "transactions";
pub const DEMOGRAPHICS_TABLE: &str = "demographics";

/// Product row as delivered, before the package size is split
#[derive(Debug, Clone, PartialEq)]
pub struct RawProduct {
    pub product_id: String,
    pub category: Option<String>,
    pub package_size: Option<String>,
}

/// One purchase line
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub product_id: String,
    pub household_id: String,
    pub sales_value: Option<f64>,
    pub quantity: Option<f64>,
}

/// Household attributes used for faceting
#[derive(Debug, Clone, PartialEq)]
pub struct Demographic {
    pub household_id: String,
    pub income: Option<String>,
    pub household_size: Option<String>,
}

/// The three retail tables
#[derive(Debug, Clone, Default)]
pub struct RetailTables {
    pub products: Vec<RawProduct>,
    pub transactions: Vec<Transaction>,
    pub demographics: Vec<Demographic>,
}

/// Load products, transactions and demographics from a directory.
///
/// Rows without an identifier are skipped; any other read failure aborts.
pub fn load_retail_tables(dir: &Path, infer_schema_length: usize) -> Result<RetailTables> {
    let products = load_products(&find_table(dir, PRODUCTS_TABLE)?, infer_schema_length)?;
    let transactions =
        load_transactions(&find_table(dir, TRANSACTIONS_TABLE)?, infer_schema_length)?;
    let demographics =
        load_demographics(&find_table(dir, DEMOGRAPHICS_TABLE)?, infer_schema_length)?;

    Ok(RetailTables {
        products,
        transactions,
        demographics,
    })
}

/// Load the products table. The size column may be named `package_size` or `package_size_raw`.
pub fn load_products(path: &Path, infer_schema_length: usize) -> Result<Vec<RawProduct>> {
    let df = load_dataset(path, infer_schema_length)?;
    let size_column = if df.column("package_size").is_ok() {
        "package_size"
    } else {
        "package_size_raw"
    };
    require_columns(&df, PRODUCTS_TABLE, &["product_id", "product_category", size_column])?;

    let ids = string_values(&df, "product_id")?;
    let categories = string_values(&df, "product_category")?;
    let sizes = string_values(&df, size_column)?;

    Ok(ids
        .into_iter()
        .zip(categories)
        .zip(sizes)
        .filter_map(|((id, category), package_size)| {
            id.map(|product_id| RawProduct {
                product_id,
                category,
                package_size,
            })
        })
        .collect())
}

pub fn load_transactions(path: &Path, infer_schema_length: usize) -> Result<Vec<Transaction>> {
    let df = load_dataset(path, infer_schema_length)?;
    require_columns(
        &df,
        TRANSACTIONS_TABLE,
        &["product_id", "household_id", "sales_value", "quantity"],
    )?;

    let products = string_values(&df, "product_id")?;
    let households = string_values(&df, "household_id")?;
    let sales = float_values(&df, "sales_value")
        .with_context(|| format!("Reading sales_value from {}", path.display()))?;
    let quantities = float_values(&df, "quantity")
        .with_context(|| format!("Reading quantity from {}", path.display()))?;

    Ok(products
        .into_iter()
        .zip(households)
        .zip(sales.into_iter().zip(quantities))
        .filter_map(|((product, household), (sales_value, quantity))| {
            Some(Transaction {
                product_id: product?,
                household_id: household?,
                sales_value,
                quantity,
            })
        })
        .collect())
}

pub fn load_demographics(path: &Path, infer_schema_length: usize) -> Result<Vec<Demographic>> {
    let df = load_dataset(path, infer_schema_length)?;
    require_columns(&df, DEMOGRAPHICS_TABLE, &["household_id", "income", "household_size"])?;

    let households = string_values(&df, "household_id")?;
    let incomes = string_values(&df, "income")?;
    let sizes = string_values(&df, "household_size")?;

    Ok(households
        .into_iter()
        .zip(incomes)
        .zip(sizes)
        .filter_map(|((household, income), household_size)| {
            household.map(|household_id| Demographic {
                household_id,
                income,
                household_size,
            })
        })
        .collect())
}
