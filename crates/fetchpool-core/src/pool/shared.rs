//! State shared by the pool handle, every worker thread and the scaler.

use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::PoolConfig;
use crate::download::{DownloadOptions, Downloader};
use crate::history::HistoryStore;
use crate::probe::LoadProbe;
use crate::queue::JobQueue;

use super::stats::{PoolCounters, PoolEvent, ProgressStats};
use super::worker;
use super::PoolState;

pub(super) struct Shared {
    pub(super) config: PoolConfig,
    pub(super) options: DownloadOptions,
    pub(super) queue: Arc<JobQueue>,
    pub(super) history: Arc<HistoryStore>,
    pub(super) downloader: Arc<dyn Downloader>,
    pub(super) probe: Arc<dyn LoadProbe>,
    /// Cleared by `stop`; idle workers exit when they see it.
    pub(super) running: AtomicBool,
    pub(super) counters: PoolCounters,
    pub(super) events: Option<Sender<PoolEvent>>,
    /// Live-worker accounting. `start`, `stop` and the scaler mutate it only under this lock.
    pub(super) workers: Mutex<WorkerSet>,
}

impl Shared {
    pub(super) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(super) fn emit(&self, event: PoolEvent) {
        if let Some(tx) = &self.events {
            // A gone receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    pub(super) fn report_progress(&self) {
        let stats = self.counters.snapshot();
        self.emit(PoolEvent::Progress(ProgressStats {
            done: stats.processed(),
            total: self.queue.total_enqueued(),
        }));
    }
}

/// Workers the pool is accountable for.
pub(super) struct WorkerSet {
    pub(super) state: PoolState,
    /// Workers counted against the bounds. Decremented as soon as a worker is
    /// told to retire, before it has actually exited.
    pub(super) live: usize,
    /// Workers told to retire whose shutdown signal is still queued. Each
    /// may keep running jobs until it reaches the signal.
    pub(super) retiring: usize,
    /// Threads not yet joined, including retiring ones.
    pub(super) handles: Vec<JoinHandle<()>>,
    next_id: usize,
}

impl WorkerSet {
    pub(super) fn new() -> Self {
        Self {
            state: PoolState::Idle,
            live: 0,
            retiring: 0,
            handles: Vec::new(),
            next_id: 0,
        }
    }

    /// A worker consumed a shutdown signal and is leaving.
    pub(super) fn retired(&mut self) {
        self.retiring = self.retiring.saturating_sub(1);
    }

    /// Forget handles of threads that already returned.
    pub(super) fn prune_finished(&mut self) {
        self.handles.retain(|h| !h.is_finished());
    }
}

/// Spawn one worker thread and count it as live.
pub(super) fn spawn_worker(shared: &Arc<Shared>, set: &mut WorkerSet) -> io::Result<()> {
    let worker_id = set.next_id;
    let worker_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("fetchpool-worker-{worker_id}"))
        .spawn(move || worker::run(&worker_shared, worker_id))?;
    set.next_id += 1;
    set.handles.push(handle);
    set.live += 1;
    Ok(())
}
