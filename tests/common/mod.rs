//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a retail directory with known prices per unit:
///
/// - product 1: BEER 12 OZ, transactions at 0.25/oz (plus one with quantity 0)
/// - product 2: BEER LIGHT 24 OZ at 0.20/oz
/// - product 3: BREAD 20 OZ at 0.15/oz
/// - product 4: EGGS 12 CT at 0.20/ct
/// - product 5: MEAT 1 LB at 5.00/lb
/// - product 6 has no package size, product 7 no separator, product 8 a text size
pub fn create_retail_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_retail_tables(dir.path());
    dir
}

pub fn write_retail_tables(dir: &Path) {
    std::fs::write(
        dir.join("products.csv"),
        "product_id,product_category,package_size\n\
         1,BEER,12 OZ\n\
         2,BEER LIGHT,24 OZ\n\
         3,BREAD,20 OZ\n\
         4,EGGS,12 CT\n\
         5,MEAT,1 LB\n\
         6,SODA,\n\
         7,CHIPS,BAG\n\
         8,MILK,ABC OZ\n",
    )
    .unwrap();

    std::fs::write(
        dir.join("transactions.csv"),
        "product_id,household_id,sales_value,quantity\n\
         1,h1,3.0,1\n\
         1,h2,6.0,2\n\
         1,h3,3.0,0\n\
         2,h1,4.8,1\n\
         3,h2,3.0,1\n\
         4,h1,2.4,1\n\
         4,h3,4.8,2\n\
         5,h2,5.0,1\n\
         6,h1,1.0,1\n\
         8,h3,2.0,1\n",
    )
    .unwrap();

    std::fs::write(
        dir.join("demographics.csv"),
        "household_id,income,household_size\n\
         h1,35-49K,2\n\
         h2,50-74K,1\n",
    )
    .unwrap();
}

/// Customer rows where tenure separates the classes:
/// leavers have tenure 1 and pay 50, stayers have tenure 40 and pay 80.
pub fn create_separable_customers(per_class: usize) -> DataFrame {
    let n = per_class * 2;
    let ids: Vec<String> = (0..n).map(|i| format!("C{:04}", i)).collect();
    let left: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();
    let tenure: Vec<i64> = left.iter().map(|&l| if l { 1 } else { 40 }).collect();
    let monthly: Vec<f64> = left.iter().map(|&l| if l { 50.0 } else { 80.0 }).collect();
    let total: Vec<Option<f64>> = tenure
        .iter()
        .zip(&monthly)
        .map(|(&t, &m)| Some(t as f64 * m))
        .collect();
    let payment: Vec<&str> = (0..n)
        .map(|i| if i % 3 == 0 { "Mailed check" } else { "Credit card" })
        .collect();
    let status: Vec<&str> = left.iter().map(|&l| if l { "Left" } else { "Current" }).collect();

    DataFrame::new(vec![
        Column::new("CustomerID".into(), ids),
        Column::new("Tenure".into(), tenure),
        Column::new("TotalCharges".into(), total),
        Column::new("MonthlyCharges".into(), monthly),
        Column::new("PaymentMethod".into(), payment),
        Column::new("Status".into(), status),
    ])
    .unwrap()
}

/// Noisy customer rows with a tenure signal and a few missing TotalCharges
pub fn create_noisy_customers(rows: usize) -> DataFrame {
    let tenure: Vec<i64> = (0..rows).map(|i| ((i * 7) % 72) as i64).collect();
    let monthly: Vec<f64> = (0..rows).map(|i| 20.0 + ((i * 13) % 90) as f64).collect();
    let total: Vec<Option<f64>> = (0..rows)
        .map(|i| {
            if i % 50 == 7 {
                None
            } else {
                Some(tenure[i] as f64 * monthly[i])
            }
        })
        .collect();
    let contract: Vec<&str> = (0..rows)
        .map(|i| match i % 3 {
            0 => "Month-to-month",
            1 => "One year",
            _ => "Two year",
        })
        .collect();
    let payment: Vec<&str> = (0..rows)
        .map(|i| if i % 4 == 0 { "Electronic check" } else { "Bank transfer" })
        .collect();
    // Short tenure mostly leaves; every fifth row breaks the rule
    let status: Vec<&str> = (0..rows)
        .map(|i| {
            let short = tenure[i] < 20;
            let flipped = i % 5 == 0;
            if short != flipped {
                "Left"
            } else {
                "Current"
            }
        })
        .collect();

    DataFrame::new(vec![
        Column::new("Tenure".into(), tenure),
        Column::new("TotalCharges".into(), total),
        Column::new("MonthlyCharges".into(), monthly),
        Column::new("Contract".into(), contract),
        Column::new("PaymentMethod".into(), payment),
        Column::new("Status".into(), status),
    ])
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("customers.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}
