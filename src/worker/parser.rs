//! Parsers for worker output
//!
//! Recognizes three kinds of lines:
//! - byte/percent progress lines (`512000/1024000 50.0% 00:10`)
//! - the `DOWNLOADED_FILE:` marker naming the finished artifact
//! - yt-dlp destination lines used as hints for locating and cleaning up files

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Prefix of the line a worker prints to name its finished output file
pub const DOWNLOADED_FILE_MARKER: &str = "DOWNLOADED_FILE:";

/// Message used when the worker reports an access/rate-limit rejection
pub const RATE_LIMITED_MESSAGE: &str =
    "Download failed: YouTube access forbidden (rate limited). Please try again later.";

// Patterns are literals; a failure here is a programming error.
#[allow(clippy::expect_used)]
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)/(\d+|NA)\s+([\d.]+)%").expect("valid regex")
});

#[allow(clippy::expect_used)]
static EXTRACT_DEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[ExtractAudio\]\s+Destination:\s+(.+?)\s*$").expect("valid regex")
});

#[allow(clippy::expect_used)]
static MERGER_DEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\[Merger\]\s+Merging formats into\s+(.+?)\s*$"#).expect("valid regex")
});

#[allow(clippy::expect_used)]
static DOWNLOAD_DEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[download\]\s+Destination:\s+(.+?)\s*$").expect("valid regex")
});

#[allow(clippy::expect_used)]
static ALREADY_DOWNLOADED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[download\]\s+(.+?)\s+has already been downloaded").expect("valid regex")
});

/// A progress sample parsed from one output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Whole percent, 0 to 100
    pub percent: u8,
    /// Bytes downloaded so far
    pub downloaded: u64,
    /// Total bytes, `None` when the worker does not know
    pub total: Option<u64>,
}

/// Parse a byte-pair + percentage progress line
///
/// Progress is `floor(downloaded / total * 100)` when the total is known and
/// positive, otherwise the worker's own percentage token.
///
/// # Examples
///
/// ```
/// use tubetap::worker::parse_progress_line;
///
/// let sample = parse_progress_line("512000/1024000 50.0% 00:10").unwrap();
/// assert_eq!(sample.percent, 50);
/// assert!(parse_progress_line("abc/1024000 x").is_none());
/// ```
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let caps = PROGRESS_RE.captures(line)?;
    let downloaded: u64 = caps[1].parse().ok()?;
    let total: Option<u64> = caps[2].parse().ok();
    let raw_percent: f64 = caps[3].parse().ok()?;

    let percent = match total {
        Some(total) if total > 0 => {
            // Integer math keeps the floor exact for large byte counts.
            let pct = (u128::from(downloaded) * 100) / u128::from(total);
            pct.min(100) as u8
        }
        _ => raw_percent.floor().clamp(0.0, 100.0) as u8,
    };

    Some(ProgressSample {
        percent,
        downloaded,
        total: total.filter(|t| *t > 0),
    })
}

/// Path named by a `DOWNLOADED_FILE:` marker line, if this is one
pub fn parse_marker_line(line: &str) -> Option<PathBuf> {
    let rest = line.trim_start().strip_prefix(DOWNLOADED_FILE_MARKER)?;
    let path = rest.trim();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Find the first marker line in a block of output
pub fn find_marker<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<PathBuf> {
    lines.into_iter().find_map(parse_marker_line)
}

/// Where a destination hint came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationHint {
    /// Post-processed output (audio extraction or format merge); final name
    Final(PathBuf),
    /// Raw download target; may still be renamed by post-processing
    Download(PathBuf),
}

impl DestinationHint {
    /// The hinted path
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Final(p) | Self::Download(p) => p,
        }
    }
}

/// Parse a yt-dlp destination line
pub fn parse_destination_line(line: &str) -> Option<DestinationHint> {
    if let Some(caps) = EXTRACT_DEST_RE.captures(line) {
        return Some(DestinationHint::Final(unquote(&caps[1])));
    }
    if let Some(caps) = MERGER_DEST_RE.captures(line) {
        return Some(DestinationHint::Final(unquote(&caps[1])));
    }
    if let Some(caps) = DOWNLOAD_DEST_RE.captures(line) {
        return Some(DestinationHint::Download(unquote(&caps[1])));
    }
    if let Some(caps) = ALREADY_DOWNLOADED_RE.captures(line) {
        return Some(DestinationHint::Download(unquote(&caps[1])));
    }
    None
}

fn unquote(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(unquoted)
}

/// Build the user-facing message for a worker that exited unsuccessfully
///
/// Access/rate-limit rejections (HTTP 403) get a dedicated message instead of
/// the raw diagnostics.
pub fn classify_failure(code: Option<i32>, stderr: &str) -> String {
    let diagnostics = stderr.trim();
    let mut message = match code {
        Some(code) => format!("Download failed (exit code {code})"),
        None => "Download failed (worker terminated by signal)".to_string(),
    };

    if !diagnostics.is_empty() {
        if diagnostics.contains("403") || diagnostics.contains("Forbidden") {
            return RATE_LIMITED_MESSAGE.to_string();
        }
        message.push_str(": ");
        message.push_str(diagnostics);
    }
    message
}
