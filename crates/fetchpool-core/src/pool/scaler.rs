//! Adaptive scaling: grow on low CPU, shrink on high CPU, within bounds.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use crate::config::PoolConfig;

use super::shared::{spawn_worker, Shared};
use super::stats::PoolEvent;
use super::PoolState;

/// Outcome of one scaling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    Grow,
    Shrink,
    Hold,
}

/// The scaling rule.
///
/// Grow by one when `cpu < cpu_soft_limit`, the pool is below `max_workers`
/// and the warm-up (if gated) is over; otherwise shrink by one when
/// `cpu > cpu_hard_limit` and the pool is above `min_workers`.
///
/// `retiring` counts workers told to exit that have not consumed their
/// shutdown signal yet. They still run jobs, so they count against
/// `max_workers` but not against `min_workers`.
pub fn decide(
    config: &PoolConfig,
    cpu: f32,
    live: usize,
    retiring: usize,
    warmed_up: bool,
) -> ScaleDecision {
    if cpu < config.cpu_soft_limit && live + retiring < config.max_workers {
        if warmed_up {
            return ScaleDecision::Grow;
        }
        return ScaleDecision::Hold;
    }
    if cpu > config.cpu_hard_limit && live > config.min_workers {
        return ScaleDecision::Shrink;
    }
    ScaleDecision::Hold
}

/// Tracks the warm-up phase: time since start and samples taken.
#[derive(Debug)]
pub(super) struct Warmup {
    started: Instant,
    samples: u32,
}

impl Warmup {
    pub(super) fn new(started: Instant) -> Self {
        Self {
            started,
            samples: 0,
        }
    }

    pub(super) fn record_sample(&mut self) {
        self.samples = self.samples.saturating_add(1);
    }

    /// Always complete unless `warmup_gate` is set.
    pub(super) fn is_complete(&self, config: &PoolConfig, now: Instant) -> bool {
        if !config.warmup_gate {
            return true;
        }
        let elapsed = now.saturating_duration_since(self.started);
        elapsed >= config.warmup && self.samples >= config.warmup_samples
    }
}

/// Scaler thread body. Wakes every `scale_interval` until `stop_rx` fires or disconnects.
pub(super) fn run(shared: &Arc<Shared>, stop_rx: Receiver<()>) {
    let config = &shared.config;
    let mut warmup = Warmup::new(Instant::now());
    tracing::debug!(
        interval_ms = config.scale_interval.as_millis() as u64,
        min = config.min_workers,
        max = config.max_workers,
        "scaler started"
    );
    loop {
        match stop_rx.recv_timeout(config.scale_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let cpu = shared.probe.cpu_percent();
        warmup.record_sample();
        let warmed_up = warmup.is_complete(config, Instant::now());
        if !step(shared, cpu, warmed_up) {
            break;
        }
    }
    tracing::debug!("scaler exiting");
}

/// Apply one decision under the worker lock. Returns false once the pool is no longer running.
fn step(shared: &Arc<Shared>, cpu: f32, warmed_up: bool) -> bool {
    let mut set = shared.workers.lock();
    if set.state != PoolState::Running {
        return false;
    }
    set.prune_finished();
    match decide(&shared.config, cpu, set.live, set.retiring, warmed_up) {
        ScaleDecision::Grow => match spawn_worker(shared, &mut set) {
            Ok(()) => {
                tracing::info!(cpu = %cpu, live = set.live, "scaled up");
                shared.emit(PoolEvent::Scaled { live: set.live, cpu });
            }
            Err(e) => tracing::warn!("could not spawn worker: {}", e),
        },
        ScaleDecision::Shrink => {
            // Signal and accounting change together so the bounds hold immediately.
            shared.queue.enqueue_shutdown();
            set.live -= 1;
            set.retiring += 1;
            tracing::info!(cpu = %cpu, live = set.live, retiring = set.retiring, "scaled down");
            shared.emit(PoolEvent::Scaled { live: set.live, cpu });
        }
        ScaleDecision::Hold => {
            tracing::trace!(cpu = %cpu, live = set.live, retiring = set.retiring, "holding");
        }
    }
    true
}
