//! Adaptive worker pool.
//!
//! Owns the worker threads and the scaler thread. Workers drain the shared
//! [`JobQueue`], consult and update the [`HistoryStore`], and call the
//! [`Downloader`] for each job. The scaler periodically samples CPU load and
//! grows or shrinks the live worker count within `[min_workers, max_workers]`.
//!
//! Lifecycle: Idle → Running (`start`) → Stopped (`stop`). A stopped pool
//! cannot be restarted.

mod scaler;
mod shared;
mod stats;
mod worker;

use std::io;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::PoolConfig;
use crate::download::{DownloadOptions, Downloader};
use crate::history::HistoryStore;
use crate::probe::LoadProbe;
use crate::queue::JobQueue;

use shared::{spawn_worker, Shared, WorkerSet};

pub use scaler::{decide, ScaleDecision};
pub use stats::{PoolEvent, PoolStats, ProgressStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool is already running")]
    AlreadyRunning,
    #[error("pool was stopped and cannot be restarted")]
    AlreadyStopped,
    #[error("pool was never started")]
    NotStarted,
    #[error("failed to spawn {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
}

struct ScalerHandle {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Pool of download workers sized by live CPU load.
pub struct WorkerPool {
    shared: Arc<Shared>,
    scaler: Option<ScalerHandle>,
}

impl WorkerPool {
    /// Build an idle pool. `config` is normalized here, so out-of-range bounds
    /// are clamped instead of rejected.
    pub fn new(
        config: PoolConfig,
        queue: Arc<JobQueue>,
        history: Arc<HistoryStore>,
        downloader: Arc<dyn Downloader>,
        probe: Arc<dyn LoadProbe>,
        options: DownloadOptions,
    ) -> Self {
        let shared = Shared {
            config: config.normalized(),
            options,
            queue,
            history,
            downloader,
            probe,
            running: Default::default(),
            counters: Default::default(),
            events: None,
            workers: Mutex::new(WorkerSet::new()),
        };
        Self {
            shared: Arc::new(shared),
            scaler: None,
        }
    }

    /// Send [`PoolEvent`]s to `tx`. Must be called before `start`.
    pub fn with_events(mut self, tx: Sender<PoolEvent>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.events = Some(tx),
            None => tracing::warn!("event channel ignored: pool already started"),
        }
        self
    }

    /// The normalized configuration in effect.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Spawn `min_workers` workers, then the scaler.
    pub fn start(&mut self) -> Result<(), PoolError> {
        let mut set = self.shared.workers.lock();
        match set.state {
            PoolState::Idle => {}
            PoolState::Running => return Err(PoolError::AlreadyRunning),
            PoolState::Stopped => return Err(PoolError::AlreadyStopped),
        }
        // Running before any spawn so a partial start is still cleaned up by `stop`.
        set.state = PoolState::Running;
        self.shared.running.store(true, Ordering::Release);
        for _ in 0..self.shared.config.min_workers {
            spawn_worker(&self.shared, &mut set).map_err(|source| PoolError::Spawn {
                what: "worker",
                source,
            })?;
        }
        drop(set);

        if self.shared.config.scaling_disabled() {
            tracing::debug!("min_workers == max_workers, scaler not started");
        } else {
            let (stop_tx, stop_rx) = mpsc::channel();
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name("fetchpool-scaler".to_string())
                .spawn(move || scaler::run(&shared, stop_rx))
                .map_err(|source| PoolError::Spawn {
                    what: "scaler",
                    source,
                })?;
            self.scaler = Some(ScalerHandle { stop_tx, handle });
        }

        tracing::info!(
            workers = self.shared.config.min_workers,
            max = self.shared.config.max_workers,
            "pool started"
        );
        Ok(())
    }

    /// Stop the pool: one shutdown signal per live worker, then join every
    /// worker thread and the scaler. Workers finish the job they are running
    /// and any jobs queued ahead of their shutdown signal.
    pub fn stop(&mut self) -> Result<(), PoolError> {
        let handles = {
            let mut set = self.shared.workers.lock();
            match set.state {
                PoolState::Running => {}
                PoolState::Idle => return Err(PoolError::NotStarted),
                PoolState::Stopped => return Err(PoolError::AlreadyStopped),
            }
            set.state = PoolState::Stopped;
            self.shared.running.store(false, Ordering::Release);
            for _ in 0..set.live {
                self.shared.queue.enqueue_shutdown();
            }
            set.live = 0;
            std::mem::take(&mut set.handles)
        };

        if let Some(scaler) = self.scaler.take() {
            drop(scaler.stop_tx);
            if scaler.handle.join().is_err() {
                tracing::warn!("scaler thread panicked");
            }
        }
        let joined = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }

        let leftover = self.shared.queue.discard_shutdown_signals();
        let stats = self.stats();
        tracing::info!(
            joined,
            leftover_signals = leftover,
            completed = stats.completed,
            failed = stats.failed,
            skipped = stats.skipped,
            "pool stopped"
        );
        Ok(())
    }

    /// Workers currently counted against the bounds.
    pub fn live_workers(&self) -> usize {
        self.shared.workers.lock().live
    }

    pub fn state(&self) -> PoolState {
        self.shared.workers.lock().state
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.state() == PoolState::Running {
            if let Err(e) = self.stop() {
                tracing::warn!("stopping pool on drop: {}", e);
            }
        }
    }
}
