//! Finding the file a finished worker produced

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::types::MediaKind;
use crate::worker::{DestinationHint, parse_destination_line, parse_marker_line};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};

/// Everything a job learned from worker output about where its file went
#[derive(Debug, Clone, Default)]
pub struct OutputHints {
    /// Path from the first `DOWNLOADED_FILE:` line
    pub marker: Option<PathBuf>,
    /// Destination lines, in output order
    pub destinations: Vec<DestinationHint>,
}

impl OutputHints {
    /// Record one output line if it names a path
    pub fn observe(&mut self, line: &str) {
        if self.marker.is_none()
            && let Some(path) = parse_marker_line(line)
        {
            self.marker = Some(path);
            return;
        }
        if let Some(hint) = parse_destination_line(line) {
            self.destinations.push(hint);
        }
    }

    /// Build from a finished worker's buffered output
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hints = Self::default();
        for line in lines {
            hints.observe(line);
        }
        hints
    }

    /// Best guess at the final path, used in "file not found" messages
    ///
    /// The marker wins, then the last post-processing destination, then the
    /// last raw download destination.
    pub fn expected(&self) -> Option<PathBuf> {
        if let Some(marker) = &self.marker {
            return Some(marker.clone());
        }
        let last_final = self.destinations.iter().rev().find_map(|h| match h {
            DestinationHint::Final(p) => Some(p.clone()),
            DestinationHint::Download(_) => None,
        });
        last_final.or_else(|| self.destinations.last().map(|h| h.path().clone()))
    }

    /// Whether the worker told us anything at all
    pub fn is_empty(&self) -> bool {
        self.marker.is_none() && self.destinations.is_empty()
    }
}

/// Locate the artifact of a successful job
///
/// Tried in order: the marker path, post-processing destinations, raw
/// download destinations with the kind's extension substituted, and finally
/// the newest allow-listed file in the kind's directory modified within the
/// recency window.
pub async fn locate_artifact(
    hints: &OutputHints,
    kind: MediaKind,
    storage: &StorageConfig,
) -> Result<PathBuf> {
    let extensions = storage.extensions_for(kind);

    if let Some(marker) = &hints.marker {
        if is_file(marker).await {
            if !marker.starts_with(storage.dir_for(kind)) {
                warn!(path = ?marker, dir = ?storage.dir_for(kind), "worker wrote outside the storage directory");
            }
            return Ok(marker.clone());
        }
        debug!(path = ?marker, "reported path does not exist");
    }

    for hint in hints.destinations.iter().rev() {
        if let DestinationHint::Final(path) = hint
            && is_file(path).await
        {
            return Ok(path.clone());
        }
    }

    for hint in hints.destinations.iter().rev() {
        if let DestinationHint::Download(path) = hint {
            for candidate in substituted(path, extensions) {
                if is_file(&candidate).await {
                    return Ok(candidate);
                }
            }
        }
    }

    let dir = storage.dir_for(kind);
    if let Some(newest) = recent_files(dir, extensions, storage.recency_window)
        .await
        .into_iter()
        .next()
    {
        debug!(path = ?newest.path, "located artifact by recency scan");
        return Ok(newest.path);
    }

    Err(Error::ArtifactMissing {
        expected: hints.expected(),
    })
}

/// `path` itself when it already carries an allowed extension, then `path`
/// with each allowed extension substituted
pub(crate) fn substituted(path: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(extensions.len() + 1);
    let current = path.extension().and_then(|e| e.to_str());
    if current.is_some_and(|cur| extensions.iter().any(|e| e.eq_ignore_ascii_case(cur))) {
        candidates.push(path.to_path_buf());
    }
    for ext in extensions {
        let candidate = path.with_extension(ext);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// A regular file found by a directory scan
#[derive(Debug, Clone)]
pub(crate) struct RecentFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Visible regular files in `dir` with an allowed extension, modified within
/// `window`, newest first
///
/// Symlinks are skipped so a scan never leads outside `dir`.
pub(crate) async fn recent_files(
    dir: &Path,
    extensions: &[String],
    window: Duration,
) -> Vec<RecentFile> {
    let mut found = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(?dir, error = %e, "cannot scan directory");
            return found;
        }
    };

    let now = SystemTime::now();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            continue;
        }

        // DirEntry::metadata does not follow symlinks.
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let recent = match now.duration_since(modified) {
            Ok(age) => age <= window,
            // Modified "in the future" (clock skew): treat as fresh.
            Err(_) => true,
        };
        if recent {
            found.push(RecentFile { path, modified });
        }
    }

    found.sort_by(|a, b| b.modified.cmp(&a.modified));
    found
}

/// Normalize a file stem for fuzzy comparison
///
/// Lowercases, folds runs of whitespace, `_` and `-` into a single `_`, drops
/// any other punctuation and trims `_` from both ends.
pub(crate) fn normalize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut pending_sep = false;

    for c in stem.chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_sep = true;
        } else if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        }
    }
    out
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> StorageConfig {
        StorageConfig {
            video_dir: dir.path().join("Videos"),
            audio_dir: dir.path().join("Audios"),
            ..Default::default()
        }
    }

    fn make_dirs(storage: &StorageConfig) {
        std::fs::create_dir_all(&storage.video_dir).unwrap();
        std::fs::create_dir_all(&storage.audio_dir).unwrap();
    }

    fn age(path: &Path, by: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn hints_collect_marker_and_destinations() {
        let hints = OutputHints::from_lines([
            "[download] Destination: /v/Clip.f137.mp4",
            "[Merger] Merging formats into \"/v/Clip.mp4\"",
            "DOWNLOADED_FILE:/v/Clip.mp4",
            "DOWNLOADED_FILE:/v/Other.mp4",
        ]);

        assert_eq!(hints.marker, Some(PathBuf::from("/v/Clip.mp4")));
        assert_eq!(hints.destinations.len(), 2);
        assert!(!hints.is_empty());
    }

    #[test]
    fn expected_prefers_marker_then_final_destination() {
        let mut hints = OutputHints::from_lines([
            "[download] Destination: /a/Song.webm",
            "[ExtractAudio] Destination: /a/Song.mp3",
            "[download] Destination: /a/Later.webm",
        ]);
        assert_eq!(hints.expected(), Some(PathBuf::from("/a/Song.mp3")));

        hints.marker = Some(PathBuf::from("/a/Marker.mp3"));
        assert_eq!(hints.expected(), Some(PathBuf::from("/a/Marker.mp3")));

        assert_eq!(OutputHints::default().expected(), None);
    }

    #[tokio::test]
    async fn marker_path_wins() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        make_dirs(&storage);
        let marked = storage.video_dir.join("Marked.mp4");
        std::fs::write(&marked, b"x").unwrap();
        std::fs::write(storage.video_dir.join("Newer.mp4"), b"y").unwrap();

        let hints = OutputHints {
            marker: Some(marked.clone()),
            ..Default::default()
        };
        let found = locate_artifact(&hints, MediaKind::Video, &storage)
            .await
            .unwrap();
        assert_eq!(found, marked);
    }

    #[tokio::test]
    async fn download_destination_gets_extension_substituted() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        make_dirs(&storage);
        let mp3 = storage.audio_dir.join("Song.mp3");
        std::fs::write(&mp3, b"audio").unwrap();

        let line = format!(
            "[download] Destination: {}",
            storage.audio_dir.join("Song.webm").display()
        );
        let hints = OutputHints::from_lines([line.as_str()]);
        let found = locate_artifact(&hints, MediaKind::Audio, &storage)
            .await
            .unwrap();
        assert_eq!(found, mp3);
    }

    #[tokio::test]
    async fn stale_marker_falls_back_to_recent_scan() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        make_dirs(&storage);
        let old = storage.audio_dir.join("Old.mp3");
        let fresh = storage.audio_dir.join("fresh_song.mp3");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&fresh, b"new").unwrap();
        age(&old, Duration::from_secs(30));

        let hints = OutputHints {
            marker: Some(storage.audio_dir.join("Fresh Song.mp3")),
            ..Default::default()
        };
        let found = locate_artifact(&hints, MediaKind::Audio, &storage)
            .await
            .unwrap();
        assert_eq!(found, fresh);
    }

    #[tokio::test]
    async fn nothing_recent_is_artifact_missing() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp);
        make_dirs(&storage);
        let ancient = storage.video_dir.join("Ancient.mp4");
        std::fs::write(&ancient, b"x").unwrap();
        age(&ancient, Duration::from_secs(3600));

        let hints = OutputHints {
            marker: Some(PathBuf::from("/nowhere/Clip.mp4")),
            ..Default::default()
        };
        match locate_artifact(&hints, MediaKind::Video, &storage).await {
            Err(Error::ArtifactMissing { expected }) => {
                assert_eq!(expected, Some(PathBuf::from("/nowhere/Clip.mp4")))
            }
            other => panic!("expected ArtifactMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recent_scan_skips_hidden_and_disallowed_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join(".hidden.mp4"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.join("Clip.MP4"), b"x").unwrap();
        std::fs::create_dir(dir.join("folder.mp4")).unwrap();

        let found = recent_files(dir, &["mp4".to_string()], Duration::from_secs(60)).await;
        let names: Vec<_> = found
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Clip.MP4"]);
    }

    #[test]
    fn substitution_keeps_allowed_extension_first() {
        let exts = vec!["mp4".to_string()];
        assert_eq!(
            substituted(Path::new("/v/Clip.mp4"), &exts),
            vec![PathBuf::from("/v/Clip.mp4")]
        );
        assert_eq!(
            substituted(Path::new("/v/Clip.f137.webm"), &exts),
            vec![PathBuf::from("/v/Clip.f137.mp4")]
        );
    }

    #[test]
    fn stems_normalize_separators_and_punctuation() {
        assert_eq!(normalize_stem("My Song - Live!"), "my_song_live");
        assert_eq!(normalize_stem("my_song__live"), "my_song_live");
        assert_eq!(normalize_stem("  Ünïcode   Title "), "ünïcode_title");
        assert_eq!(normalize_stem("a.b,c"), "abc");
    }
}
