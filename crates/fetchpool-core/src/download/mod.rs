//! The download capability consumed by workers.
//!
//! Workers treat a [`Downloader`] as opaque and synchronous: one call fetches
//! one job and may block for the whole transfer. [`YtDlpDownloader`] is the
//! implementation used by the CLI.

mod error;
mod sanitize;
mod ytdlp;

use std::path::PathBuf;
use std::time::Duration;

use crate::job::Job;

pub use error::DownloadError;
pub use sanitize::sanitize_filename;
pub use ytdlp::YtDlpDownloader;

/// Output container used when audio and video streams are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
}

impl MergeFormat {
    /// Parse a format name, falling back to mp4 for anything unknown.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "mkv" => MergeFormat::Mkv,
            "webm" => MergeFormat::Webm,
            _ => MergeFormat::Mp4,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MergeFormat::Mp4 => "mp4",
            MergeFormat::Mkv => "mkv",
            MergeFormat::Webm => "webm",
        }
    }
}

/// Per-run download options, built once and shared read-only by all workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub quiet: bool,
    /// None when audio-only or video-only.
    pub merge_format: Option<MergeFormat>,
    pub audio_only: bool,
    pub video_only: bool,
    pub filename_replacement: char,
    pub output_dir: PathBuf,
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            quiet: true,
            merge_format: Some(MergeFormat::Mp4),
            audio_only: false,
            video_only: false,
            filename_replacement: '_',
            output_dir: PathBuf::from("."),
            ffmpeg_location: None,
        }
    }
}

impl DownloadOptions {
    /// Extension of the produced file.
    pub fn output_extension(&self) -> &'static str {
        match self.merge_format {
            Some(f) => f.extension(),
            None if self.audio_only => "mp3",
            None => "mp4",
        }
    }
}

/// What a successful download reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadOutcome {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl DownloadOutcome {
    /// Average rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs
    }
}

/// Fetches one job. Implementations must be shareable across worker threads.
pub trait Downloader: Send + Sync {
    fn download(&self, job: &Job, options: &DownloadOptions)
        -> Result<DownloadOutcome, DownloadError>;
}

impl<F> Downloader for F
where
    F: Fn(&Job, &DownloadOptions) -> Result<DownloadOutcome, DownloadError> + Send + Sync,
{
    fn download(
        &self,
        job: &Job,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome, DownloadError> {
        self(job, options)
    }
}
