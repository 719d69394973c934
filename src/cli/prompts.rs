//! Interactive prompts using dialoguer

use std::path::PathBuf;

use anyhow::Result;
use dialoguer::Confirm;

/// Prompt user to confirm proceeding with an action
pub fn confirm_step(message: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(message)
        .default(true)
        .interact()?;
    Ok(confirmed)
}

/// Ask before replacing report files that already exist.
///
/// Returns `true` when nothing exists, or when `no_confirm` is set.
pub fn confirm_overwrite(paths: &[PathBuf], no_confirm: bool) -> Result<bool> {
    let existing: Vec<&PathBuf> = paths.iter().filter(|p| p.exists()).collect();
    if existing.is_empty() || no_confirm {
        return Ok(true);
    }

    let message = if existing.len() == 1 {
        format!("Overwrite {}?", existing[0].display())
    } else {
        format!("Overwrite {} existing report file(s)?", existing.len())
    };
    confirm_step(&message)
}
