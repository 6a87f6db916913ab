//! CLI for the fetchpool download pool.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fetchpool_core::config;
use std::path::PathBuf;

use commands::{run_pool, run_reset_history, run_status, RunRequest};

/// Exit code when `--deadline` elapsed before the backlog drained.
pub const EXIT_NOT_DRAINED: i32 = 2;

/// Top-level CLI for fetchpool.
#[derive(Debug, Parser)]
#[command(name = "fetchpool")]
#[command(about = "fetchpool: download a backlog with a CPU-adaptive worker pool", long_about = None)]
pub struct Cli {
    /// More detailed logs (ignored when RUST_LOG is set).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every URL not yet recorded as completed.
    Run {
        /// URLs to download.
        urls: Vec<String>,
        /// File with one URL per line (`#` starts a comment).
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Override `min_workers` from the config file.
        #[arg(long, value_name = "N")]
        min_workers: Option<usize>,
        /// Override `max_workers` from the config file.
        #[arg(long, value_name = "N")]
        max_workers: Option<usize>,
        /// Directory for downloaded files (default: current directory).
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Stop taking new jobs after this many seconds; exits with status 2 if work remains.
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,
    },

    /// Show the completion history.
    Status,

    /// Forget every completed job so the next run downloads everything again.
    ResetHistory,
}

impl Cli {
    /// Dispatch the parsed command. Returns the process exit code.
    pub fn run(self) -> Result<i32> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Run {
                urls,
                input,
                min_workers,
                max_workers,
                output_dir,
                deadline,
            } => {
                let request = RunRequest {
                    urls,
                    input,
                    min_workers,
                    max_workers,
                    output_dir,
                    deadline: deadline.map(std::time::Duration::from_secs),
                };
                let drained = run_pool(&cfg, request)?;
                return Ok(if drained { 0 } else { EXIT_NOT_DRAINED });
            }
            CliCommand::Status => run_status(&cfg)?,
            CliCommand::ResetHistory => run_reset_history(&cfg)?,
        }

        Ok(0)
    }
}

#[cfg(test)]
mod tests;
