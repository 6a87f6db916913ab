//! `fetchpool status` – show the completion history.

use anyhow::Result;
use fetchpool_core::config::FetchpoolConfig;

use super::open_history;

pub fn run_status(cfg: &FetchpoolConfig) -> Result<()> {
    let history = open_history(cfg)?;
    let done = history.done_jobs();
    println!("History: {}", history.path().display());
    if done.is_empty() {
        println!("No completed jobs.");
    } else {
        println!("{} completed job(s):", done.len());
        for job in done {
            println!("  {job}");
        }
    }
    Ok(())
}
