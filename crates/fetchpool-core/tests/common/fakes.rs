//! Fake downloader recording every call.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fetchpool_core::{DownloadError, DownloadOptions, DownloadOutcome, Downloader, Job};
use parking_lot::Mutex;

#[derive(Default)]
pub struct RecordingDownloader {
    calls: Mutex<Vec<Job>>,
    failing: HashSet<Job>,
    panicking: HashSet<Job>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call for `job` fails.
    pub fn failing(mut self, job: &str) -> Self {
        self.failing.insert(Job::new(job));
        self
    }

    /// Every call for `job` panics.
    pub fn panicking(mut self, job: &str) -> Self {
        self.panicking.insert(Job::new(job));
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, job: &str) -> usize {
        self.calls.lock().iter().filter(|j| j.as_str() == job).count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Most downloads ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Downloader for RecordingDownloader {
    fn download(
        &self,
        job: &Job,
        _options: &DownloadOptions,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.calls.lock().push(job.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.panicking.contains(job) {
            panic!("simulated panic for {job}");
        }
        if self.failing.contains(job) {
            return Err(DownloadError::other(format!("simulated failure for {job}")));
        }
        Ok(DownloadOutcome {
            bytes: 1024,
            elapsed: self.delay,
        })
    }
}
