//! Core types for tubetap

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Progress event published to every observer of the progress stream
///
/// Serialized with a `status` tag, matching the wire payload
/// `{status, progress?, message, file_path?, downloaded?, total?}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Download in progress
    Downloading {
        /// Progress percentage (0 to 100, non-decreasing within a job)
        progress: u8,
        /// Human-readable status line
        message: String,
        /// Bytes downloaded so far (only when derived from worker output)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        downloaded: Option<u64>,
        /// Total bytes expected (only when derived from worker output)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Artifact is ready for one-shot retrieval
    DownloadComplete {
        /// Percent-encoded basename to pass to the retrieval endpoint
        file_path: String,
        /// Human-readable status line
        message: String,
    },

    /// Job failed
    Error {
        /// Error message
        message: String,
    },
}

impl ProgressEvent {
    /// Synthesized or raw progress without byte counters
    pub fn downloading(progress: u8, message: impl Into<String>) -> Self {
        Self::Downloading {
            progress,
            message: message.into(),
            downloaded: None,
            total: None,
        }
    }

    /// Terminal failure event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends a job's event sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DownloadComplete { .. } | Self::Error { .. })
    }

    /// Progress percentage, for `downloading` events
    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::Downloading { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

/// Kind of media a job produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video container (mp4)
    Video,
    /// Extracted audio (mp3)
    Audio,
}

/// Parsed quality selector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Quality {
    /// Video capped at the given height in pixels (`"720p"`)
    Video {
        /// Maximum frame height
        height: u32,
    },
    /// Audio at the given bitrate in kbit/s (`"192K"`)
    Audio {
        /// Target bitrate
        bitrate: u32,
    },
}

impl Quality {
    /// Parse a quality selector such as `"720p"` or `"192K"`
    ///
    /// Selectors containing neither marker fall back to `default`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tubetap::types::Quality;
    ///
    /// let default = Quality::Video { height: 720 };
    /// assert_eq!(Quality::parse("1080p", default).unwrap(), Quality::Video { height: 1080 });
    /// assert_eq!(Quality::parse("320K", default).unwrap(), Quality::Audio { bitrate: 320 });
    /// assert_eq!(Quality::parse("best", default).unwrap(), default);
    /// ```
    pub fn parse(selector: &str, default: Quality) -> Result<Self> {
        let selector = selector.trim();

        if selector.contains('p') {
            let height = parse_number(&selector.replace('p', ""), selector)?;
            Ok(Self::Video { height })
        } else if selector.contains('K') {
            let bitrate = parse_number(&selector.replace('K', ""), selector)?;
            Ok(Self::Audio { bitrate })
        } else {
            Ok(default)
        }
    }

    /// Kind of media this quality produces
    pub fn media_kind(&self) -> MediaKind {
        match self {
            Self::Video { .. } => MediaKind::Video,
            Self::Audio { .. } => MediaKind::Audio,
        }
    }

    /// The bare number handed to the quality-specialized workers
    pub fn parameter(&self) -> String {
        match self {
            Self::Video { height } => height.to_string(),
            Self::Audio { bitrate } => bitrate.to_string(),
        }
    }
}

fn parse_number(digits: &str, selector: &str) -> Result<u32> {
    match digits.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Validation(format!(
            "Invalid quality selector: {selector}"
        ))),
    }
}

/// Request body for POST /download
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Media page URL (must match the host allow-list)
    #[serde(default)]
    pub url: Option<String>,

    /// Quality selector: `"<height>p"` for video, `"<bitrate>K"` for audio
    #[serde(default)]
    pub quality: Option<String>,
}

/// A validated request ready to run as a job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSpec {
    /// Media page URL
    pub url: String,
    /// Parsed quality
    pub quality: Quality,
}
