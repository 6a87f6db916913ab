pub mod config;
pub mod logging;

pub mod download;
pub mod history;
pub mod job;
pub mod pool;
pub mod probe;
pub mod queue;

pub use download::{DownloadError, DownloadOptions, DownloadOutcome, Downloader};
pub use history::HistoryStore;
pub use job::{Job, QueueItem};
pub use pool::{PoolError, PoolEvent, PoolState, WorkerPool};
pub use probe::{LoadProbe, StaticProbe, SysinfoProbe};
pub use queue::JobQueue;
