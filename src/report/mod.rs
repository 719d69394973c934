//! Report module - console tables and file export

pub mod churn_report;
pub mod export;
pub mod pricing_report;

pub use churn_report::*;
pub use export::*;
pub use pricing_report::*;
