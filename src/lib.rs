//! Shelf-φ: Retail Pricing and Churn Analysis Library
//!
//! Two batch pipelines over tabular data: price-per-unit analysis of retail
//! products by unit group and category, and churn prediction with
//! cross-validated spline, bagged tree and random forest models.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
