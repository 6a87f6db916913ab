//! The worker loop: dequeue, skip-if-done, download, record.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::download::{DownloadError, DownloadOutcome};
use crate::job::{Job, QueueItem};

use super::shared::Shared;
use super::stats::PoolEvent;

/// Runs until a shutdown signal is consumed, or the queue stays empty for one
/// poll interval after the pool stopped running. One failing job never ends the loop.
pub(super) fn run(shared: &Shared, worker_id: usize) {
    tracing::debug!(worker_id, "worker started");
    loop {
        let Some(item) = shared.queue.dequeue(shared.config.poll_interval) else {
            if shared.is_running() {
                continue;
            }
            break;
        };
        match item {
            QueueItem::Shutdown => {
                shared.workers.lock().retired();
                shared.queue.mark_processed();
                break;
            }
            QueueItem::Task(job) => {
                process(shared, worker_id, &job);
                shared.queue.mark_processed();
                shared.report_progress();
            }
        }
    }
    tracing::debug!(worker_id, "worker exiting");
}

fn process(shared: &Shared, worker_id: usize, job: &Job) {
    if shared.history.is_done(job) {
        tracing::debug!(worker_id, job = %job, "already done, skipping");
        shared.counters.record_skipped();
        shared.emit(PoolEvent::Skipped { job: job.clone() });
        return;
    }

    tracing::info!(worker_id, job = %job, "download started");
    match invoke(shared, job) {
        Ok(outcome) => {
            if let Err(e) = shared.history.mark_done(job) {
                tracing::error!(worker_id, job = %job, "could not persist completion: {:#}", e);
            }
            tracing::info!(
                worker_id,
                job = %job,
                bytes = outcome.bytes,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "download completed"
            );
            shared.counters.record_completed();
            shared.emit(PoolEvent::Completed {
                job: job.clone(),
                outcome,
            });
        }
        Err(e) => {
            tracing::warn!(worker_id, job = %job, error = %e, "download failed");
            shared.counters.record_failed();
            shared.emit(PoolEvent::Failed {
                job: job.clone(),
                error: e.to_string(),
            });
        }
    }
}

/// Call the downloader, turning a panic into a per-job error.
fn invoke(shared: &Shared, job: &Job) -> Result<DownloadOutcome, DownloadError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        shared.downloader.download(job, &shared.options)
    }))
    .unwrap_or_else(|payload| Err(DownloadError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
