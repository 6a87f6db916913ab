//! Shared fixtures for pool integration tests.

#![allow(dead_code)]

pub mod fakes;

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fetchpool_core::config::PoolConfig;
use fetchpool_core::{
    DownloadOptions, Downloader, HistoryStore, JobQueue, LoadProbe, PoolEvent, WorkerPool,
};
use tempfile::TempDir;

/// Short intervals so scaling and shutdown happen within milliseconds.
pub fn fast_config(min_workers: usize, max_workers: usize) -> PoolConfig {
    PoolConfig {
        scale_interval: Duration::from_millis(15),
        poll_interval: Duration::from_millis(20),
        ..PoolConfig::with_bounds(min_workers, max_workers)
    }
}

/// Poll `cond` every few milliseconds until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Queue + on-disk history in a temp dir.
pub struct Fixture {
    pub dir: TempDir,
    pub queue: Arc<JobQueue>,
    pub history: Arc<HistoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(HistoryStore::open(dir.path().join("history.json")));
        Self {
            dir,
            queue: Arc::new(JobQueue::new()),
            history,
        }
    }

    pub fn history_path(&self) -> std::path::PathBuf {
        self.dir.path().join("history.json")
    }

    /// Idle pool wired to this fixture, with an event receiver.
    pub fn pool(
        &self,
        config: PoolConfig,
        downloader: Arc<dyn Downloader>,
        probe: Arc<dyn LoadProbe>,
    ) -> (WorkerPool, Receiver<PoolEvent>) {
        let (tx, rx) = mpsc::channel();
        let pool = WorkerPool::new(
            config,
            Arc::clone(&self.queue),
            Arc::clone(&self.history),
            downloader,
            probe,
            DownloadOptions::default(),
        )
        .with_events(tx);
        (pool, rx)
    }
}
