//! Job identifiers and the items carried by the job queue.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of work: an opaque download target identifier (a URL in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Job(String);

impl Job {
    /// Wrap any identifier as a job. No validation is done.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse `input` as an absolute URL and use it as the job identifier.
    pub fn parse_url(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let url = url::Url::parse(trimmed).with_context(|| format!("invalid URL: {trimmed}"))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            anyhow::bail!("URL has no host: {trimmed}");
        }
        // Keep the caller's spelling so history keys match across runs.
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Job {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Job {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An element of the job queue: a real job or a request for one worker to exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Task(Job),
    Shutdown,
}

/// A line of a job list that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLine {
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

/// Parse a job list: one URL per line. Blank lines and `#` comments are skipped;
/// lines that are not URLs are returned separately so the caller can report them.
pub fn parse_job_lines(input: &str) -> (Vec<Job>, Vec<InvalidLine>) {
    let mut jobs = Vec::new();
    let mut invalid = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Job::parse_url(line) {
            Ok(job) => jobs.push(job),
            Err(e) => invalid.push(InvalidLine {
                line: idx + 1,
                reason: format!("{e:#}"),
            }),
        }
    }
    (jobs, invalid)
}
