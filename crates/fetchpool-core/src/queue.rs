//! Blocking FIFO job queue with completion tracking.
//!
//! Every enqueued item (job or shutdown signal) counts as outstanding until a
//! consumer calls [`JobQueue::mark_processed`] for it. "Drained" means the
//! outstanding count is zero: nothing pending and nothing in flight.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::job::{Job, QueueItem};

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    /// Pending + in-flight items.
    outstanding: usize,
    /// Real jobs ever enqueued (progress denominator).
    jobs_enqueued: u64,
}

/// Thread-safe job queue shared by the caller, the workers and the scaler.
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    drained: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail. Never blocks.
    pub fn enqueue(&self, job: Job) {
        let mut state = self.state.lock();
        state.jobs_enqueued += 1;
        self.push(&mut state, QueueItem::Task(job));
    }

    /// Append every job in order.
    pub fn enqueue_all<I: IntoIterator<Item = Job>>(&self, jobs: I) {
        let mut state = self.state.lock();
        for job in jobs {
            state.jobs_enqueued += 1;
            self.push(&mut state, QueueItem::Task(job));
        }
    }

    /// Append one shutdown signal. It is consumed by exactly one worker, after
    /// every item enqueued before it.
    pub fn enqueue_shutdown(&self) {
        let mut state = self.state.lock();
        self.push(&mut state, QueueItem::Shutdown);
    }

    fn push(&self, state: &mut QueueState, item: QueueItem) {
        state.items.push_back(item);
        state.outstanding += 1;
        self.available.notify_one();
    }

    /// Pop the head item, waiting up to `timeout`. Returns `None` if nothing
    /// arrived in time. The caller owes one `mark_processed` per returned item.
    /// A timeout too large to express as a deadline waits without limit.
    pub fn dequeue(&self, timeout: Duration) -> Option<QueueItem> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out() {
                        return state.items.pop_front();
                    }
                }
                None => self.available.wait(&mut state),
            }
        }
    }

    /// Mark one dequeued item as fully handled.
    pub fn mark_processed(&self) {
        let mut state = self.state.lock();
        match state.outstanding.checked_sub(1) {
            Some(n) => state.outstanding = n,
            None => {
                tracing::warn!("mark_processed called with nothing outstanding");
                return;
            }
        }
        if state.outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every enqueued item has been processed.
    pub fn wait_until_drained(&self) {
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            self.drained.wait(&mut state);
        }
    }

    /// Like [`wait_until_drained`](Self::wait_until_drained) but gives up after
    /// `timeout`. Returns true if the queue drained. A timeout too large to
    /// express as a deadline waits without limit.
    pub fn wait_until_drained_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_until_drained();
            return true;
        };
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return state.outstanding == 0;
            }
        }
        true
    }

    /// Remove jobs that no worker has picked up yet, returning them in queue
    /// order. Their outstanding accounting is released; shutdown signals stay.
    pub fn take_pending_jobs(&self) -> Vec<Job> {
        let mut state = self.state.lock();
        let mut jobs = Vec::new();
        state.items.retain(|item| match item {
            QueueItem::Task(job) => {
                jobs.push(job.clone());
                false
            }
            QueueItem::Shutdown => true,
        });
        self.release(&mut state, jobs.len());
        jobs
    }

    /// Drop shutdown signals left behind once no worker is there to consume
    /// them, so a later `wait_until_drained` can't hang. Returns how many were removed.
    pub fn discard_shutdown_signals(&self) -> usize {
        let mut state = self.state.lock();
        let before = state.items.len();
        state.items.retain(|item| !matches!(item, QueueItem::Shutdown));
        let removed = before - state.items.len();
        self.release(&mut state, removed);
        removed
    }

    fn release(&self, state: &mut QueueState, n: usize) {
        state.outstanding = state.outstanding.saturating_sub(n);
        if n > 0 && state.outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Pending plus in-flight items.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Items waiting to be dequeued.
    pub fn pending(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Real jobs enqueued since creation.
    pub fn total_enqueued(&self) -> u64 {
        self.state.lock().jobs_enqueued
    }
}
