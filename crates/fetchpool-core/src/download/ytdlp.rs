//! Download capability backed by an external `yt-dlp` process.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Instant;

use super::{sanitize_filename, DownloadError, DownloadOptions, DownloadOutcome, Downloader};
use crate::job::Job;

/// Stem used when the title is empty after sanitization.
const FALLBACK_STEM: &str = "video";

/// Runs `yt-dlp` once to read the title and once to download.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: PathBuf,
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: &[OsString]) -> Result<Output, DownloadError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| DownloadError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(DownloadError::Exited {
                program: self.program.display().to_string(),
                status: output.status.to_string(),
                message: last_line(&output.stderr).unwrap_or_default(),
            });
        }
        Ok(output)
    }

    fn fetch_title(&self, job: &Job) -> Result<String, DownloadError> {
        let args: Vec<OsString> = vec![
            "--skip-download".into(),
            "--no-warnings".into(),
            "--no-playlist".into(),
            "--print".into(),
            "title".into(),
            job.as_str().into(),
        ];
        let output = self.run(&args)?;
        Ok(last_line(&output.stdout).unwrap_or_default())
    }
}

/// Build the `yt-dlp` arguments for downloading `job` into `<output_dir>/<stem>.<ext>`.
pub(crate) fn download_args(job: &Job, options: &DownloadOptions, stem: &str) -> Vec<OsString> {
    let ext = options.output_extension();
    // `%` starts a yt-dlp template field.
    let file_name = format!("{}.{}", stem.replace('%', "%%"), ext);
    let template = options.output_dir.join(file_name);

    let mut args: Vec<OsString> = vec![
        "--no-warnings".into(),
        "--no-playlist".into(),
        "-o".into(),
        template.into_os_string(),
        "--print".into(),
        "after_move:filepath".into(),
    ];
    if options.quiet {
        args.push("--no-progress".into());
    }

    let mut uses_ffmpeg = true;
    if options.audio_only {
        args.extend(
            ["-f", "bestaudio/best", "-x", "--audio-format", ext, "--audio-quality", "192K"]
                .map(OsString::from),
        );
    } else if options.video_only {
        args.extend(["-f", "bestvideo/best"].map(OsString::from));
        uses_ffmpeg = false;
    } else {
        args.extend(
            ["-f", "bestvideo+bestaudio/best", "--merge-output-format", ext].map(OsString::from),
        );
    }
    if uses_ffmpeg {
        if let Some(ffmpeg) = &options.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone().into_os_string());
        }
    }

    args.push(job.as_str().into());
    args
}

fn last_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
}

impl Downloader for YtDlpDownloader {
    fn download(
        &self,
        job: &Job,
        options: &DownloadOptions,
    ) -> Result<DownloadOutcome, DownloadError> {
        let start = Instant::now();
        let title = self.fetch_title(job)?;
        let mut stem = sanitize_filename(&title, options.filename_replacement);
        if stem.is_empty() {
            stem = FALLBACK_STEM.to_string();
        }
        tracing::debug!(job = %job, file = %stem, "resolved title");

        let output = self.run(&download_args(job, options, &stem))?;
        let bytes = last_line(&output.stdout)
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(DownloadOutcome {
            bytes,
            elapsed: start.elapsed(),
        })
    }
}
