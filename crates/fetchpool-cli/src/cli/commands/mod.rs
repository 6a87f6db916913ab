//! CLI command handlers. Each command is in its own file.

mod reset_history;
mod run;
mod status;

use anyhow::Result;
use fetchpool_core::config::FetchpoolConfig;
use fetchpool_core::HistoryStore;

pub use reset_history::run_reset_history;
pub use run::{run_pool, RunRequest};
pub use status::run_status;

/// Open the history at the configured path, or the XDG default.
fn open_history(cfg: &FetchpoolConfig) -> Result<HistoryStore> {
    let path = match &cfg.history_path {
        Some(p) => p.clone(),
        None => HistoryStore::default_path()?,
    };
    Ok(HistoryStore::open(path))
}
