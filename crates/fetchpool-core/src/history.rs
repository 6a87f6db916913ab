//! Durable record of completed jobs (JSON under the XDG state dir).
//!
//! The file is a JSON object mapping each job to its completion flag. Every
//! `mark_done` rewrites it through a temp file + fsync + rename, so a crash
//! leaves either the previous valid file or the new one.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::job::Job;

/// Idempotent ledger of completed jobs, safe to share between workers.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<Job, bool>>,
}

impl HistoryStore {
    /// Default path for the history file: `~/.local/state/fetchpool/history.json`.
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchpool")?;
        Ok(xdg_dirs.get_state_home().join("fetchpool").join("history.json"))
    }

    /// Open the store backed by `path`. A missing file is an empty history; an
    /// unreadable or corrupt one is logged and also treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(Some(entries)) => {
                tracing::debug!(path = %path.display(), done = entries.len(), "loaded history");
                entries
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("ignoring unreadable history, starting empty: {:#}", e);
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_done(&self, job: &Job) -> bool {
        self.entries.lock().get(job).copied().unwrap_or(false)
    }

    /// Record `job` as completed and persist before returning. Marking a job
    /// that is already done does not touch the file.
    ///
    /// On a write error the in-memory record is rolled back, so the job is
    /// only ever reported done once it reached disk.
    pub fn mark_done(&self, job: &Job) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.get(job).copied().unwrap_or(false) {
            return Ok(());
        }
        let previous = entries.insert(job.clone(), true);
        if let Err(e) = persist(&self.path, &entries) {
            match previous {
                Some(flag) => entries.insert(job.clone(), flag),
                None => entries.remove(job),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Forget every completed job (the explicit external reset).
    pub fn reset(&self) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.clear();
        persist(&self.path, &entries)
    }

    /// Number of completed jobs.
    pub fn len(&self) -> usize {
        self.entries.lock().values().filter(|done| **done).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed jobs in sorted order.
    pub fn done_jobs(&self) -> Vec<Job> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, done)| **done)
            .map(|(job, _)| job.clone())
            .collect()
    }
}

fn load_entries(path: &Path) -> Result<Option<BTreeMap<Job, bool>>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read history: {}", path.display())),
    };
    let entries = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse history: {}", path.display()))?;
    Ok(Some(entries))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(".tmp");
    PathBuf::from(o)
}

/// Write `entries` to `<path>.tmp`, fsync, rename over `path`, then fsync the
/// directory so the rename itself survives a crash.
fn persist(path: &Path, entries: &BTreeMap<Job, bool>) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(entries).context("serialize history")?;
    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp)
        .with_context(|| format!("create temp history: {}", tmp.display()))?;
    file.write_all(&json)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("write temp history: {}", tmp.display()))?;
    drop(file);
    fs::rename(&tmp, path).with_context(|| {
        format!("failed to rename {} to {}", tmp.display(), path.display())
    })?;
    sync_dir(parent.unwrap_or_else(|| Path::new(".")))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .with_context(|| format!("sync dir: {}", dir.display()))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
