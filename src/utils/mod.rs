//! Utilities - progress bars and terminal styling

mod progress;
mod styling;

pub use progress::*;
pub use styling::*;
