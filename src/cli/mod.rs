//! CLI module - argument parsing and interactive prompts

mod args;
mod prompts;

pub use args::{ChurnArgs, Cli, Commands, PricingArgs};
pub use prompts::*;
