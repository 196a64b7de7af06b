//! Configuration types for tubetap

use crate::error::{Error, Result};
use crate::types::{MediaKind, Quality};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Which worker contract jobs are run with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerBackendKind {
    /// Quality-specialized executables (`<program> <url> <quality>`) that print
    /// no progress and report the output file with a `DOWNLOADED_FILE:` line
    #[default]
    Specialized,
    /// General-purpose yt-dlp driven with a machine-readable progress template
    YtDlp,
}

/// An executable plus leading arguments placed before the job arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkerProgram {
    /// Path to the executable
    pub program: PathBuf,

    /// Arguments inserted before the job arguments (default: none)
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerProgram {
    /// Program without leading arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

/// External worker configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkerConfig {
    /// Worker contract (default: specialized)
    #[serde(default)]
    pub backend: WorkerBackendKind,

    /// Video worker for the specialized backend
    #[serde(default = "default_video_program")]
    pub video_program: WorkerProgram,

    /// Audio worker for the specialized backend
    #[serde(default = "default_audio_program")]
    pub audio_program: WorkerProgram,

    /// Path to yt-dlp (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Feed stderr lines through the progress line handler too (default: false)
    #[serde(default)]
    pub merge_stderr: bool,

    /// Quality used when the selector carries neither `p` nor `K` (default: "720p")
    #[serde(default = "default_quality")]
    pub default_quality: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backend: WorkerBackendKind::default(),
            video_program: default_video_program(),
            audio_program: default_audio_program(),
            ytdlp_path: None,
            search_path: true,
            merge_stderr: false,
            default_quality: default_quality(),
        }
    }
}

impl WorkerConfig {
    /// The parsed fallback quality
    pub fn fallback_quality(&self) -> Result<Quality> {
        Quality::parse(&self.default_quality, Quality::Video { height: 720 })
    }
}

/// Artifact storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Directory video artifacts are written to (default: "/tmp/Videos")
    #[serde(default = "default_video_dir")]
    pub video_dir: PathBuf,

    /// Directory audio artifacts are written to (default: "/tmp/Audios")
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// Allow-listed video extensions, without the dot (default: ["mp4"])
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    /// Allow-listed audio extensions, without the dot (default: ["mp3"])
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,

    /// How recently a file must have been modified to be picked up by the
    /// filename-reconciliation fallbacks (default: 5 minutes)
    #[serde(default = "default_recency_window", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub recency_window: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            video_dir: default_video_dir(),
            audio_dir: default_audio_dir(),
            video_extensions: default_video_extensions(),
            audio_extensions: default_audio_extensions(),
            recency_window: default_recency_window(),
        }
    }
}

impl StorageConfig {
    /// Directory artifacts of the given kind live in
    pub fn dir_for(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Video => &self.video_dir,
            MediaKind::Audio => &self.audio_dir,
        }
    }

    /// Allow-listed extensions for the given kind
    pub fn extensions_for(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Video => &self.video_extensions,
            MediaKind::Audio => &self.audio_extensions,
        }
    }

    /// Media kind an extension is allow-listed for, compared case-insensitively
    pub fn kind_for_extension(&self, extension: &str) -> Option<MediaKind> {
        let matches = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(extension));
        if matches(&self.video_extensions) {
            Some(MediaKind::Video)
        } else if matches(&self.audio_extensions) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

/// Progress reporting configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressConfig {
    /// Per-observer queue capacity; a full queue drops the observer (default: 10)
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,

    /// Tick interval of synthetic progress (default: 1500 ms)
    #[serde(default = "default_synthetic_interval", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub synthetic_interval: Duration,

    /// Highest value synthetic progress reaches on its own (default: 95)
    #[serde(default = "default_synthetic_cap")]
    pub synthetic_cap: u8,

    /// Pause between the 100% event and `download_complete` (default: 500 ms)
    #[serde(default = "default_completion_delay", with = "duration_ms_serde")]
    #[schema(value_type = u64)]
    pub completion_delay: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: default_subscriber_capacity(),
            synthetic_interval: default_synthetic_interval(),
            synthetic_cap: default_synthetic_cap(),
            completion_delay: default_completion_delay(),
        }
    }
}

/// Request validation configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationConfig {
    /// Hosts a job URL may point at; `www.` is accepted in front of each
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for TubeTap
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// External worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Artifact directories and allow-lists
    #[serde(default)]
    pub storage: StorageConfig,

    /// Progress stream settings
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Request validation
    #[serde(default)]
    pub validation: ValidationConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the job pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| Error::Config {
            message: message.to_string(),
            key: Some(key.to_string()),
        };

        if self.progress.subscriber_capacity == 0 {
            return Err(invalid(
                "progress.subscriber_capacity",
                "subscriber capacity must be at least 1",
            ));
        }
        if self.progress.synthetic_interval.is_zero() {
            return Err(invalid(
                "progress.synthetic_interval",
                "synthetic progress interval must be positive",
            ));
        }
        if self.progress.synthetic_cap >= 100 {
            return Err(invalid(
                "progress.synthetic_cap",
                "synthetic progress must stay below 100",
            ));
        }
        if self.validation.allowed_hosts.is_empty() {
            return Err(invalid(
                "validation.allowed_hosts",
                "at least one allowed host is required",
            ));
        }
        if self.storage.video_dir == self.storage.audio_dir {
            return Err(invalid(
                "storage.audio_dir",
                "video and audio directories must differ",
            ));
        }
        self.worker
            .fallback_quality()
            .map_err(|_| invalid("worker.default_quality", "invalid default quality"))?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_video_program() -> WorkerProgram {
    WorkerProgram::new("/opt/my_youtube_downloader/tubetapVideoDownloader")
}

fn default_audio_program() -> WorkerProgram {
    WorkerProgram::new("/opt/my_youtube_downloader/tubetapAudioDownloader")
}

fn default_quality() -> String {
    "720p".into()
}

fn default_video_dir() -> PathBuf {
    PathBuf::from("/tmp/Videos")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("/tmp/Audios")
}

fn default_video_extensions() -> Vec<String> {
    vec!["mp4".into()]
}

fn default_audio_extensions() -> Vec<String> {
    vec!["mp3".into()]
}

fn default_recency_window() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_subscriber_capacity() -> usize {
    10
}

fn default_synthetic_interval() -> Duration {
    Duration::from_millis(1500)
}

fn default_synthetic_cap() -> u8 {
    95
}

fn default_completion_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["youtube.com".into(), "youtu.be".into()]
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
