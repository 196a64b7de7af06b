//! Per-request job execution
//!
//! A job moves through `Started -> Downloading -> {Complete | Failed}` and
//! always ends with exactly one terminal event, even if orchestration panics.

use super::TubeTap;
use crate::artifact::{OutputHints, PartialFiles, locate_artifact};
use crate::error::{Error, Result};
use crate::progress::{DerivedProgress, SyntheticProgress};
use crate::types::{JobSpec, ProgressEvent};
use crate::worker::{ProgressMode, WorkerOutput, classify_failure};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// First event of every job
pub(crate) const STARTING_MESSAGE: &str = "Starting download...";
/// Progress message published once the artifact is located
pub(crate) const FINISHED_MESSAGE: &str = "Download complete!";
/// Message of the `download_complete` event
pub(crate) const READY_MESSAGE: &str = "Download complete. Ready for streaming.";

impl TubeTap {
    /// Run one job to its terminal event
    pub(crate) async fn run_job(&self, job: JobSpec) {
        info!(
            url = %job.url,
            quality = %job.quality.parameter(),
            kind = ?job.quality.media_kind(),
            backend = self.backend.name(),
            "starting download job"
        );
        self.bus
            .publish(&ProgressEvent::downloading(0, STARTING_MESSAGE));

        // The ticker lives outside the guarded future so it can be stopped
        // (and joined) on every exit path, including a panic.
        let mut ticker: Option<SyntheticProgress> = None;
        let outcome = AssertUnwindSafe(self.execute(&job, &mut ticker))
            .catch_unwind()
            .await;

        if let Some(ticker) = ticker.take() {
            let reached = ticker.stop().await;
            debug!(reached, "synthetic progress stopped");
        }

        match outcome {
            Ok(Ok(path)) => self.complete(&path).await,
            Ok(Err(e)) => self.fail(&e),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unexpected panic".to_string());
                error!(url = %job.url, reason = %reason, "download job panicked");
                self.bus.publish(&ProgressEvent::error(format!(
                    "Server error during download: {reason}"
                )));
            }
        }
    }

    /// Launch the worker, wait for it and locate the artifact
    async fn execute(
        &self,
        job: &JobSpec,
        ticker: &mut Option<SyntheticProgress>,
    ) -> Result<PathBuf> {
        let kind = job.quality.media_kind();
        let storage = &self.config.storage;
        let extensions = storage.extensions_for(kind);
        let command = self.backend.command(job, storage.dir_for(kind));
        info!(command = %command.display(), "executing worker");

        let (output, hints) = match self.backend.progress_mode() {
            ProgressMode::Synthetic => {
                *ticker = Some(SyntheticProgress::start(
                    self.bus.clone(),
                    self.config.progress.synthetic_interval,
                    self.config.progress.synthetic_cap,
                ));
                let output = self.supervisor.run(&command).await?;
                let hints = OutputHints::from_lines(output.stdout.iter().map(String::as_str));
                (output, hints)
            }
            ProgressMode::Derived => {
                let mut derived = DerivedProgress::new();
                let mut hints = OutputHints::default();
                let bus = self.bus.clone();
                let output = self
                    .supervisor
                    .run_streaming(&command, |line| {
                        if let Some(event) = derived.observe(line) {
                            bus.publish(&event);
                        }
                        hints.observe(line);
                    })
                    .await?;
                (output, hints)
            }
        };
        log_output(&output);

        let mut partial = PartialFiles::new();
        partial.track_hints(&hints, extensions);

        if !output.success {
            let message = classify_failure(output.code, &output.stderr_text());
            warn!(code = ?output.code, message = %message, "worker failed");
            let removed = partial.discard().await;
            debug!(removed, "partial files cleaned up");
            return Err(Error::WorkerExit {
                code: output.code,
                message,
            });
        }

        match locate_artifact(&hints, kind, storage).await {
            Ok(path) => {
                partial.commit();
                Ok(path)
            }
            Err(e) => {
                let removed = partial.discard().await;
                debug!(removed, "partial files cleaned up");
                Err(e)
            }
        }
    }

    /// Publish 100%, pause briefly, then announce the artifact
    async fn complete(&self, path: &Path) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            self.fail(&Error::ArtifactMissing {
                expected: Some(path.to_path_buf()),
            });
            return;
        };

        self.bus
            .publish(&ProgressEvent::downloading(100, FINISHED_MESSAGE));
        tokio::time::sleep(self.config.progress.completion_delay).await;

        let file_path = urlencoding::encode(&name).into_owned();
        info!(path = %path.display(), file_path = %file_path, "download complete");
        self.bus.publish(&ProgressEvent::DownloadComplete {
            file_path,
            message: READY_MESSAGE.into(),
        });
    }

    fn fail(&self, e: &Error) {
        let message = match e {
            Error::WorkerExit { message, .. } => message.clone(),
            Error::ArtifactMissing { .. } => e.to_string(),
            other => format!("Server error during download: {other}"),
        };
        error!(error = %e, "download job failed");
        self.bus.publish(&ProgressEvent::error(message));
    }
}

fn log_output(output: &WorkerOutput) {
    debug!(code = ?output.code, "worker exited");
    for line in &output.stdout {
        debug!(target: "tubetap::worker::stdout", "{line}");
    }
    for line in &output.stderr {
        debug!(target: "tubetap::worker::stderr", "{line}");
    }
}
