//! Pipeline module - data loading, pricing analysis and churn modelling

pub mod churn;
pub mod error;
pub mod loader;
pub mod plan;
pub mod pricing;
pub mod products;
pub mod retail;
pub mod sales;
pub mod stats;

pub use error::AnalysisError;
pub use loader::*;
pub use plan::*;
pub use pricing::*;
pub use products::*;
pub use retail::*;
pub use sales::*;
pub use stats::*;
