//! Spinners and trial counters for long-running steps

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICK: Duration = Duration::from_millis(100);

/// How a spinner or bar ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Warning,
}

/// Spinner for work of unknown length (table loads, resampling, final fits)
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("    {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Counter of grid search trials for one model family.
///
/// Worker threads call `inc(1)` as each (configuration, fold) trial finishes.
pub fn create_trial_bar(family: &str, trials: usize) -> ProgressBar {
    let pb = ProgressBar::new(trials as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("    {prefix:>14.bold} [{bar:32.cyan/blue}] {pos}/{len} trials, {per_sec} ({eta})")
            .unwrap()
            .progress_chars("█▓▒░"),
    );
    pb.set_prefix(family.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Stop a spinner or bar and leave a final line
pub fn finish(pb: &ProgressBar, outcome: Outcome, message: &str) {
    let marker = match outcome {
        Outcome::Success => "✅",
        Outcome::Warning => "⚠️ ",
    };
    pb.set_style(ProgressStyle::with_template("    {msg}").unwrap());
    pb.finish_with_message(format!("{} {}", marker, message));
}
