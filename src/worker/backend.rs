//! Worker contracts: how a job is turned into an argument vector

use crate::config::{WorkerConfig, WorkerProgram};
use crate::error::{Error, Result};
use crate::types::{JobSpec, MediaKind, Quality};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// How progress is obtained for jobs run by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Parse progress from the worker's streamed output
    Derived,
    /// The worker is silent until it exits; fabricate time-based progress
    Synthetic,
}

/// A fully built worker invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments, in order
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    /// Render as a single line for logs
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// A worker contract
///
/// Implementations decide the argument vector and which progress strategy the
/// job uses. Exactly one strategy is active per job.
pub trait WorkerBackend: Send + Sync {
    /// Build the invocation for one job
    ///
    /// `output_dir` is where the artifact is expected to appear.
    fn command(&self, job: &JobSpec, output_dir: &Path) -> WorkerCommand;

    /// Progress strategy for jobs run by this backend
    fn progress_mode(&self) -> ProgressMode;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Quality-specialized executables: `<program> <url> <height|bitrate>`
///
/// These workers print nothing until they finish, then report the output file
/// with a `DOWNLOADED_FILE:` line.
pub struct SpecializedWorker {
    video: WorkerProgram,
    audio: WorkerProgram,
}

impl SpecializedWorker {
    /// Create a backend with explicit video and audio programs
    pub fn new(video: WorkerProgram, audio: WorkerProgram) -> Self {
        Self { video, audio }
    }
}

impl WorkerBackend for SpecializedWorker {
    fn command(&self, job: &JobSpec, _output_dir: &Path) -> WorkerCommand {
        let program = match job.quality.media_kind() {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        };

        let mut args: Vec<OsString> = program.args.iter().map(OsString::from).collect();
        args.push(job.url.clone().into());
        args.push(job.quality.parameter().into());

        WorkerCommand {
            program: program.program.clone(),
            args,
        }
    }

    fn progress_mode(&self) -> ProgressMode {
        ProgressMode::Synthetic
    }

    fn name(&self) -> &'static str {
        "specialized"
    }
}

/// Progress template emitting `<downloaded>/<total> <percent> <eta>` per update
pub const YTDLP_PROGRESS_TEMPLATE: &str = "download:%(progress.downloaded_bytes)s/%(progress.total_bytes)s %(progress._percent_str)s %(progress._eta_str)s";

/// General-purpose yt-dlp with a machine-readable progress template
pub struct YtDlpWorker {
    program: WorkerProgram,
}

impl YtDlpWorker {
    /// Create a backend with an explicit yt-dlp program
    pub fn new(program: WorkerProgram) -> Self {
        Self { program }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp")
            .ok()
            .map(|p| Self::new(WorkerProgram::new(p)))
    }
}

impl WorkerBackend for YtDlpWorker {
    fn command(&self, job: &JobSpec, output_dir: &Path) -> WorkerCommand {
        let mut args: Vec<OsString> = self.program.args.iter().map(OsString::from).collect();

        let mut push = |arg: &str| args.push(OsString::from(arg));
        push("--no-warnings");
        push("--newline");
        push("--no-playlist");
        push("--progress");
        push("--progress-template");
        push(YTDLP_PROGRESS_TEMPLATE);
        push("--print");
        push("after_move:DOWNLOADED_FILE:%(filepath)s");
        push("--no-simulate");

        match job.quality {
            Quality::Video { height } => {
                push("-f");
                push(&format!(
                    "bestvideo[ext=mp4][height<={height}]+bestaudio[ext=m4a]/best[ext=mp4]/best"
                ));
                push("--merge-output-format");
                push("mp4");
            }
            Quality::Audio { bitrate } => {
                push("--extract-audio");
                push("--audio-format");
                push("mp3");
                push("--audio-quality");
                push(&format!("{bitrate}K"));
            }
        }

        args.push(OsString::from("-o"));
        args.push(output_dir.join("%(title)s.%(ext)s").into_os_string());
        args.push(OsString::from(job.url.as_str()));

        WorkerCommand {
            program: self.program.program.clone(),
            args,
        }
    }

    fn progress_mode(&self) -> ProgressMode {
        ProgressMode::Derived
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Build the backend selected in the worker configuration
pub fn backend_from_config(config: &WorkerConfig) -> Result<Box<dyn WorkerBackend>> {
    use crate::config::WorkerBackendKind;

    match config.backend {
        WorkerBackendKind::Specialized => Ok(Box::new(SpecializedWorker::new(
            config.video_program.clone(),
            config.audio_program.clone(),
        ))),
        WorkerBackendKind::YtDlp => {
            if let Some(path) = &config.ytdlp_path {
                return Ok(Box::new(YtDlpWorker::new(WorkerProgram::new(path))));
            }
            if config.search_path
                && let Some(worker) = YtDlpWorker::from_path()
            {
                return Ok(Box::new(worker));
            }
            Err(Error::Config {
                message: "yt-dlp backend selected but no yt-dlp binary configured or found in PATH"
                    .into(),
                key: Some("worker.ytdlp_path".into()),
            })
        }
    }
}
