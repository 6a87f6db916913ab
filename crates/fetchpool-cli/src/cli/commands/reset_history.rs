//! `fetchpool reset-history` – forget completed jobs.

use anyhow::{Context, Result};
use fetchpool_core::config::FetchpoolConfig;

use super::open_history;

pub fn run_reset_history(cfg: &FetchpoolConfig) -> Result<()> {
    let history = open_history(cfg)?;
    let forgotten = history.len();
    history
        .reset()
        .with_context(|| format!("reset history at {}", history.path().display()))?;
    tracing::info!(forgotten, "history reset");
    println!("Forgot {forgotten} completed job(s).");
    Ok(())
}
