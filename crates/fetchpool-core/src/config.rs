use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::{DownloadOptions, MergeFormat};

/// Default worker poll interval: how long an idle worker blocks on the queue
/// before re-checking the running flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_SCALE_INTERVAL_SECS: f64 = 5.0;

/// Download options (the `[download]` table in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Suppress the external downloader's progress output.
    pub quiet: bool,
    /// Container for merged audio+video output: "mp4", "mkv" or "webm".
    pub merge_format: String,
    /// Extract audio only (mp3).
    pub audio_only: bool,
    /// Fetch the video stream only, no merge.
    pub video_only: bool,
    /// Replacement for characters that are not allowed in file names.
    pub filename_replacement: String,
    /// Path to the yt-dlp binary (None = look up `yt-dlp` on PATH).
    pub ytdlp_path: Option<PathBuf>,
    /// Directory containing ffmpeg, passed through to yt-dlp when merging or extracting.
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quiet: true,
            merge_format: "mp4".to_string(),
            audio_only: false,
            video_only: false,
            filename_replacement: "_".to_string(),
            ytdlp_path: None,
            ffmpeg_location: None,
        }
    }
}

impl DownloadConfig {
    /// Build normalized download options writing into `output_dir`.
    ///
    /// Unknown merge formats fall back to mp4; audio-only or video-only runs never merge.
    pub fn to_options(&self, output_dir: &Path) -> DownloadOptions {
        let merge_format = if self.audio_only || self.video_only {
            None
        } else {
            Some(MergeFormat::parse_lenient(&self.merge_format))
        };
        let filename_replacement = self.filename_replacement.chars().next().unwrap_or('_');
        DownloadOptions {
            quiet: self.quiet,
            merge_format,
            audio_only: self.audio_only,
            video_only: self.video_only,
            filename_replacement,
            output_dir: output_dir.to_path_buf(),
            ffmpeg_location: self.ffmpeg_location.clone(),
        }
    }
}

/// Global configuration loaded from `~/.config/fetchpool/config.toml`.
/// Missing keys take their default value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchpoolConfig {
    /// Workers started with the pool; the scaler never goes below this.
    pub min_workers: usize,
    /// Upper bound for the scaler.
    pub max_workers: usize,
    /// Seconds between two scaling decisions.
    pub scale_interval_secs: f64,
    /// Reserved for a throughput-aware policy; validated but not used by the scaler.
    pub speed_threshold: f64,
    /// CPU percentage below which the pool may grow.
    pub cpu_soft_limit: f32,
    /// CPU percentage above which the pool shrinks.
    pub cpu_hard_limit: f32,
    /// Warm-up duration in seconds (only used when `warmup_gate` is on).
    pub warmup_seconds: f64,
    /// CPU samples to take before the pool may grow (only used when `warmup_gate` is on).
    pub warmup_samples: u32,
    /// Suppress scale-up during the warm-up phase.
    pub warmup_gate: bool,
    /// Completion history file (None = `~/.local/state/fetchpool/history.json`).
    pub history_path: Option<PathBuf>,
    pub download: DownloadConfig,
}

impl Default for FetchpoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: 8,
            scale_interval_secs: DEFAULT_SCALE_INTERVAL_SECS,
            speed_threshold: 0.10,
            cpu_soft_limit: 70.0,
            cpu_hard_limit: 90.0,
            warmup_seconds: 15.0,
            warmup_samples: 3,
            warmup_gate: false,
            history_path: None,
            download: DownloadConfig::default(),
        }
    }
}

impl FetchpoolConfig {
    /// Pool parameters, normalized (see [`PoolConfig::normalized`]).
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            scale_interval: secs_or(self.scale_interval_secs, DEFAULT_SCALE_INTERVAL_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cpu_soft_limit: self.cpu_soft_limit,
            cpu_hard_limit: self.cpu_hard_limit,
            warmup: secs_or(self.warmup_seconds.max(0.0), 0.0),
            warmup_samples: self.warmup_samples,
            warmup_gate: self.warmup_gate,
            speed_threshold: self.speed_threshold,
        }
        .normalized()
    }
}

/// Converts seconds to a Duration; negative, NaN or infinite values use
/// `fallback`, values past the Duration range saturate at `Duration::MAX`.
fn secs_or(secs: f64, fallback: f64) -> Duration {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::from_secs_f64(fallback)
    }
}

/// Immutable pool configuration shared read-only by every worker and the scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub scale_interval: Duration,
    pub poll_interval: Duration,
    pub cpu_soft_limit: f32,
    pub cpu_hard_limit: f32,
    pub warmup: Duration,
    pub warmup_samples: u32,
    pub warmup_gate: bool,
    pub speed_threshold: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        FetchpoolConfig::default().pool_config()
    }
}

impl PoolConfig {
    /// Default scaling parameters with the given worker bounds.
    pub fn with_bounds(min_workers: usize, max_workers: usize) -> Self {
        Self {
            min_workers,
            max_workers,
            ..Self::default()
        }
        .normalized()
    }

    /// Clamp every field into a usable range instead of failing:
    /// `min_workers >= 1`, `max_workers >= min_workers`, non-zero intervals,
    /// `cpu_soft_limit < cpu_hard_limit` and `warmup_samples >= 1`.
    pub fn normalized(mut self) -> Self {
        self.min_workers = self.min_workers.max(1);
        self.max_workers = self.max_workers.max(self.min_workers);
        if self.scale_interval.is_zero() {
            self.scale_interval = Duration::from_secs_f64(DEFAULT_SCALE_INTERVAL_SECS);
        }
        if self.poll_interval.is_zero() {
            self.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        if !self.cpu_hard_limit.is_finite() {
            self.cpu_hard_limit = 90.0;
        }
        if !self.cpu_soft_limit.is_finite() || self.cpu_soft_limit >= self.cpu_hard_limit {
            self.cpu_soft_limit = (self.cpu_hard_limit - 5.0).max(0.0);
        }
        self.warmup_samples = self.warmup_samples.max(1);
        if !self.speed_threshold.is_finite() {
            self.speed_threshold = 0.10;
        }
        self
    }

    /// True when the bounds leave the scaler nothing to do.
    pub fn scaling_disabled(&self) -> bool {
        self.min_workers == self.max_workers
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchpool")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchpoolConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchpoolConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from `path`. An unparsable file falls back to defaults
/// with a warning; only I/O errors are returned.
pub fn load_from_path(path: &Path) -> Result<FetchpoolConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    match toml::from_str(&data) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            tracing::warn!("invalid config at {}, using defaults: {}", path.display(), e);
            Ok(FetchpoolConfig::default())
        }
    }
}
