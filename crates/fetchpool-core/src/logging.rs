//! Logging init: file under XDG state dir, or graceful fallback to stderr.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,fetchpool=debug,fetchpool_core=debug";
const VERBOSE_FILTER: &str = "debug,fetchpool=trace,fetchpool_core=trace";

/// Writer that is either the shared log file or stderr (used when the file handle can't be cloned).
enum LogSink {
    File(fs::File),
    Stderr,
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct SharedFile(fs::File);

impl<'a> MakeWriter<'a> for SharedFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogSink::File)
            .unwrap_or(LogSink::Stderr)
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Directory holding `fetchpool.log`: `~/.local/state/fetchpool`.
pub fn log_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchpool")?;
    Ok(xdg_dirs.get_state_home().join("fetchpool"))
}

/// Initialize structured logging appending to `<dir>/fetchpool.log`.
/// Returns Err (without installing a subscriber) if the file can't be opened.
pub fn init_logging_in(dir: &Path, verbose: bool) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let log_file_path = dir.join("fetchpool.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(BoxMakeWriter::new(SharedFile(file)))
        .with_ansi(false)
        .with_thread_names(true)
        .init();

    tracing::info!("fetchpool logging initialized at {}", log_file_path.display());
    Ok(log_file_path)
}

/// Initialize logging to stderr only (no file).
pub fn init_logging_stderr(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_thread_names(true)
        .init();
}

/// Log to the XDG state file when possible, otherwise to stderr.
/// Returns the log file path when file logging is active.
pub fn init(verbose: bool) -> Option<PathBuf> {
    match log_dir().and_then(|dir| init_logging_in(&dir, verbose)) {
        Ok(path) => Some(path),
        Err(e) => {
            init_logging_stderr(verbose);
            tracing::warn!("file logging unavailable, using stderr: {:#}", e);
            None
        }
    }
}
