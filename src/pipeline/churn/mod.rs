//! Churn prediction: customer loading, resampling, model tuning and evaluation

pub mod customers;
pub mod ensemble;
pub mod evaluate;
pub mod grid;
pub mod mars;
pub mod metrics;
pub mod model;
pub mod recipe;
pub mod split;
pub mod trainer;
pub mod tree;

pub use customers::*;
pub use ensemble::{EnsembleParams, TreeEnsemble};
pub use evaluate::*;
pub use grid::*;
pub use mars::{MarsModel, MarsParams};
pub use metrics::*;
pub use model::*;
pub use split::*;
pub use trainer::*;
