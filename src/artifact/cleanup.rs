//! Removal of partially written files after a failed job

use super::locate::{OutputHints, substituted};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files a job may have left behind, deleted unless the job succeeds
///
/// Each tracked path is expanded to its extension-substituted variants and the
/// matching `.part` files. Call [`commit`](Self::commit) once the artifact has
/// been located; otherwise [`discard`](Self::discard) or dropping the guard
/// removes every variant that exists.
#[derive(Debug)]
pub struct PartialFiles {
    paths: Vec<PathBuf>,
    armed: bool,
}

impl PartialFiles {
    /// Empty, armed guard
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            armed: true,
        }
    }

    /// Track `path` and its variants
    pub fn track(&mut self, path: &Path, extensions: &[String]) {
        let mut variants = substituted(path, extensions);
        if !variants.iter().any(|p| p == path) {
            variants.insert(0, path.to_path_buf());
        }
        for variant in variants {
            let mut part = variant.clone().into_os_string();
            part.push(".part");
            self.push(variant);
            self.push(PathBuf::from(part));
        }
    }

    /// Track every path the worker mentioned
    pub fn track_hints(&mut self, hints: &OutputHints, extensions: &[String]) {
        if let Some(marker) = &hints.marker {
            self.track(marker, extensions);
        }
        for hint in &hints.destinations {
            self.track(hint.path(), extensions);
        }
    }

    /// Paths that would be removed
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Keep everything
    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Remove every tracked file that exists; returns how many were removed
    pub async fn discard(mut self) -> usize {
        self.armed = false;
        let mut removed = 0;
        for path in &self.paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    debug!(?path, "deleted partial file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(?path, error = %e, "failed to delete partial file"),
            }
        }
        removed
    }

    fn push(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }
}

impl Default for PartialFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PartialFiles {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for path in &self.paths {
            if std::fs::remove_file(path).is_ok() {
                debug!(?path, "deleted partial file");
            }
        }
    }
}
