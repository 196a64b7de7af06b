//! One-shot, self-deleting artifact retrieval

use super::locate::{normalize_stem, recent_files};
use crate::config::StorageConfig;
use crate::error::{Error, Result, RetrievalError};
use crate::types::MediaKind;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

static CLAIM_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A retrieved artifact, already removed from disk
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Basename the file was stored under
    pub file_name: String,
    /// Full file contents
    pub bytes: Vec<u8>,
    /// MIME type derived from the extension
    pub content_type: &'static str,
}

impl Artifact {
    /// `Content-Disposition` value suggesting the original name
    ///
    /// # Examples
    ///
    /// ```
    /// use tubetap::artifact::Artifact;
    ///
    /// let artifact = Artifact {
    ///     file_name: "Canción 1.mp3".into(),
    ///     bytes: vec![],
    ///     content_type: "audio/mpeg",
    /// };
    /// assert_eq!(
    ///     artifact.content_disposition(),
    ///     "attachment; filename*=UTF-8''Canci%C3%B3n%201.mp3"
    /// );
    /// ```
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename*=UTF-8''{}",
            urlencoding::encode(&self.file_name)
        )
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// MIME type for an artifact extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "ogg" | "opus" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Allow-listed artifact directories and the one-shot retrieval over them
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    storage: StorageConfig,
}

impl ArtifactStore {
    /// Create a store over the configured directories
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    /// Storage layout this store serves from
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Create both artifact directories if missing
    pub async fn ensure_dirs(&self) -> Result<()> {
        for kind in [MediaKind::Video, MediaKind::Audio] {
            fs::create_dir_all(self.storage.dir_for(kind)).await?;
        }
        Ok(())
    }

    /// Read and delete the artifact named by `encoded`
    ///
    /// `encoded` is the percent-encoded basename published in the
    /// `download_complete` event. The file is claimed by renaming it to a
    /// hidden name before it is read, so of two concurrent retrievals exactly
    /// one gets the bytes and the other gets `NotFound`. The claimed file is
    /// removed whether or not the read succeeds.
    pub async fn retrieve(&self, encoded: &str) -> Result<Artifact> {
        let name = urlencoding::decode(encoded)
            .map_err(|_| not_found(encoded))?
            .into_owned();
        check_name(&name)?;

        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| forbidden(&name, "extension is not allowed"))?;
        let kind = self
            .storage
            .kind_for_extension(extension)
            .ok_or_else(|| forbidden(&name, "extension is not allowed"))?;

        let base = match fs::canonicalize(self.storage.dir_for(kind)).await {
            Ok(base) => base,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found(&name)),
            Err(e) => return Err(e.into()),
        };

        let resolved = match self.resolve(&base, &name, kind).await? {
            Some(path) => path,
            None => return Err(not_found(&name)),
        };
        let file_name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        // Fixed-length claim name; the artifact name may already be near NAME_MAX.
        let claimed = base.join(format!(
            ".claim-{}-{}",
            std::process::id(),
            CLAIM_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        match fs::rename(&resolved, &claimed).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(name = %name, "artifact claimed by a concurrent retrieval");
                return Err(not_found(&name));
            }
            Err(e) => return Err(e.into()),
        }

        let read = fs::read(&claimed).await;
        if let Err(e) = fs::remove_file(&claimed).await {
            warn!(path = ?claimed, error = %e, "failed to delete served artifact");
        }
        let bytes = read?;

        info!(file = %file_name, size = bytes.len(), "artifact served and deleted");

        let content_type = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(content_type_for)
            .unwrap_or("application/octet-stream");

        Ok(Artifact {
            file_name,
            bytes,
            content_type,
        })
    }

    /// Real path of the requested file inside `base`
    ///
    /// Falls back to a fuzzy match against recently modified files when the
    /// exact name does not exist.
    async fn resolve(&self, base: &Path, name: &str, kind: MediaKind) -> Result<Option<PathBuf>> {
        let candidate = base.join(name);
        match fs::canonicalize(&candidate).await {
            Ok(real) => {
                if !real.starts_with(base) {
                    return Err(forbidden(name, "path escapes the artifact directory"));
                }
                let is_file = fs::metadata(&real).await.map(|m| m.is_file()).unwrap_or(false);
                return Ok(is_file.then_some(real));
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidFilename) => {}
            Err(e) => return Err(e.into()),
        }

        let requested = Path::new(name);
        let wanted_stem = requested
            .file_stem()
            .map(|s| normalize_stem(&s.to_string_lossy()))
            .unwrap_or_default();
        let wanted_ext = requested
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if wanted_stem.is_empty() {
            return Ok(None);
        }

        let matched = recent_files(
            base,
            self.storage.extensions_for(kind),
            self.storage.recency_window,
        )
        .await
        .into_iter()
        .find(|f| {
            let same_ext = f
                .path
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(&wanted_ext));
            let same_stem = f
                .path
                .file_stem()
                .is_some_and(|s| normalize_stem(&s.to_string_lossy()) == wanted_stem);
            same_ext && same_stem
        })
        .map(|f| f.path);

        if let Some(path) = &matched {
            debug!(requested = %name, found = ?path, "artifact resolved by fuzzy match");
        }
        Ok(matched)
    }
}

/// Reject names that are not a plain visible basename
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(not_found(name));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(forbidden(name, "path separators are not allowed"));
    }
    if name.starts_with('.') {
        return Err(forbidden(name, "hidden files are not served"));
    }
    Ok(())
}

fn not_found(name: &str) -> Error {
    Error::Retrieval(RetrievalError::NotFound {
        name: name.to_string(),
    })
}

fn forbidden(name: &str, reason: &str) -> Error {
    Error::Retrieval(RetrievalError::Forbidden {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}
