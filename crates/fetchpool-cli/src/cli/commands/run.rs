//! `fetchpool run` – drain a backlog of URLs through the adaptive pool.

use anyhow::{Context, Result};
use fetchpool_core::config::FetchpoolConfig;
use fetchpool_core::download::YtDlpDownloader;
use fetchpool_core::job::parse_job_lines;
use fetchpool_core::pool::PoolStats;
use fetchpool_core::{Job, JobQueue, PoolEvent, SysinfoProbe, WorkerPool};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::open_history;

const PROGRESS_INTERVAL_MS: u64 = 500;

/// Arguments of `fetchpool run` after parsing.
#[derive(Debug, Default)]
pub struct RunRequest {
    pub urls: Vec<String>,
    pub input: Option<PathBuf>,
    pub min_workers: Option<usize>,
    pub max_workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub deadline: Option<Duration>,
}

/// Runs the pool over every pending job. Returns true if the backlog drained,
/// false if the deadline passed first (remaining jobs stay pending for the next run).
pub fn run_pool(cfg: &FetchpoolConfig, request: RunRequest) -> Result<bool> {
    let history = Arc::new(open_history(cfg)?);
    let jobs = collect_jobs(&request.urls, request.input.as_deref())?;
    let pending: Vec<Job> = jobs.iter().filter(|j| !history.is_done(j)).cloned().collect();
    println!("Total: {} | Pending: {}", jobs.len(), pending.len());
    if pending.is_empty() {
        println!("Nothing to download.");
        return Ok(true);
    }

    let mut pool_cfg = cfg.pool_config();
    if let Some(n) = request.min_workers {
        pool_cfg.min_workers = n;
    }
    if let Some(n) = request.max_workers {
        pool_cfg.max_workers = n;
    }

    let output_dir = match request.output_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output dir: {}", output_dir.display()))?;
    let options = cfg.download.to_options(&output_dir);
    let downloader = match &cfg.download.ytdlp_path {
        Some(path) => YtDlpDownloader::new(path),
        None => YtDlpDownloader::default(),
    };

    let queue = Arc::new(JobQueue::new());
    queue.enqueue_all(pending);

    let (events_tx, events_rx) = std::sync::mpsc::channel();
    let printer = thread::spawn(move || print_events(events_rx));

    let mut pool = WorkerPool::new(
        pool_cfg,
        Arc::clone(&queue),
        history,
        Arc::new(downloader),
        Arc::new(SysinfoProbe::new()),
        options,
    )
    .with_events(events_tx);
    pool.start()?;

    let drained = match request.deadline {
        Some(limit) => queue.wait_until_drained_timeout(limit),
        None => {
            queue.wait_until_drained();
            true
        }
    };
    if !drained {
        let left = queue.take_pending_jobs();
        tracing::warn!(left = left.len(), "deadline reached");
        println!("Deadline reached; {} job(s) left for the next run.", left.len());
    }

    pool.stop()?;
    let stats = pool.stats();
    // Dropping the pool closes the event channel and ends the printer.
    drop(pool);
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }

    print_summary(&stats, drained);
    Ok(drained)
}

/// URLs from the command line, then from `input`. Bad command-line URLs are an
/// error; bad lines in the file are reported and skipped.
fn collect_jobs(urls: &[String], input: Option<&Path>) -> Result<Vec<Job>> {
    let mut jobs = Vec::with_capacity(urls.len());
    for url in urls {
        jobs.push(Job::parse_url(url)?);
    }
    if let Some(path) = input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read input: {}", path.display()))?;
        let (from_file, invalid) = parse_job_lines(&text);
        for bad in &invalid {
            eprintln!("{}:{}: skipped: {}", path.display(), bad.line, bad.reason);
        }
        jobs.extend(from_file);
    }
    if jobs.is_empty() {
        anyhow::bail!("no URLs given (pass URLs or --input FILE)");
    }
    Ok(jobs)
}

fn print_events(rx: Receiver<PoolEvent>) {
    let mut last_print: Option<Instant> = None;
    for event in rx {
        match event {
            PoolEvent::Completed { job, outcome } => {
                let mib = outcome.bytes as f64 / 1_048_576.0;
                println!(
                    "[OK] {} ({:.1} MiB in {:.1}s)",
                    job,
                    mib,
                    outcome.elapsed.as_secs_f64()
                );
            }
            PoolEvent::Failed { job, error } => println!("[ERROR] Failed: {} -> {}", job, error),
            PoolEvent::Skipped { job } => tracing::debug!(job = %job, "skipped"),
            PoolEvent::Scaled { live, cpu } => {
                tracing::debug!(live, cpu = %cpu, "worker count changed")
            }
            PoolEvent::Progress(stats) => {
                let now = Instant::now();
                let due = last_print.map_or(true, |t| {
                    now.duration_since(t) >= Duration::from_millis(PROGRESS_INTERVAL_MS)
                });
                if due || stats.done >= stats.total {
                    println!(
                        "  {}/{} done ({:.0}%)",
                        stats.done,
                        stats.total,
                        stats.fraction() * 100.0
                    );
                    last_print = Some(now);
                }
            }
        }
    }
}

fn print_summary(stats: &PoolStats, drained: bool) {
    if drained && stats.failed == 0 {
        println!("\nAll downloads completed!");
    } else {
        println!(
            "\nFinished: {} completed, {} failed, {} skipped.",
            stats.completed, stats.failed, stats.skipped
        );
    }
}
