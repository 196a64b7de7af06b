//! Download job orchestration.
//!
//! The `TubeTap` struct and its methods are organized by concern:
//! - [`validate`] - Request validation (URL allow-list, quality selector)
//! - [`job`] - Per-request job execution and terminal-event emission
//!
//! Each accepted request runs as its own task. There is no queue, no
//! concurrency limit and no job registry; the event bus is the only state
//! shared between jobs.

mod job;
mod validate;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::artifact::{Artifact, ArtifactStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, Subscription};
use crate::types::DownloadRequest;
use crate::worker::{Supervisor, WorkerBackend, backend_from_config};
use regex::Regex;
use std::sync::Arc;

/// Main service instance (cloneable - all fields are Arc-wrapped or Copy)
#[derive(Clone)]
pub struct TubeTap {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Progress fan-out shared by every job and every observer
    pub(crate) bus: EventBus,
    /// Worker contract selected at startup
    pub(crate) backend: Arc<dyn WorkerBackend>,
    /// Process runner
    pub(crate) supervisor: Supervisor,
    /// One-shot artifact retrieval
    pub(crate) artifacts: ArtifactStore,
    /// Compiled URL allow-list
    pub(crate) url_pattern: Arc<Regex>,
}

impl TubeTap {
    /// Create a new instance with the worker backend named in the configuration
    ///
    /// This validates the configuration, creates both artifact directories and
    /// resolves the worker backend (searching `PATH` for yt-dlp if configured).
    pub async fn new(config: Config) -> Result<Self> {
        let backend: Arc<dyn WorkerBackend> = Arc::from(backend_from_config(&config.worker)?);
        Self::with_backend(config, backend).await
    }

    /// Create a new instance with an explicit worker backend
    pub async fn with_backend(config: Config, backend: Arc<dyn WorkerBackend>) -> Result<Self> {
        config.validate()?;

        let artifacts = ArtifactStore::new(config.storage.clone());
        artifacts.ensure_dirs().await.map_err(|e| match e {
            Error::Io(io) => Error::Io(std::io::Error::new(
                io.kind(),
                format!(
                    "Failed to create artifact directories '{}' / '{}': {}",
                    config.storage.video_dir.display(),
                    config.storage.audio_dir.display(),
                    io
                ),
            )),
            other => other,
        })?;

        let url_pattern = Arc::new(validate::url_pattern(&config.validation.allowed_hosts)?);
        let bus = EventBus::new(config.progress.subscriber_capacity);
        let supervisor = Supervisor::new(config.worker.merge_stderr);

        tracing::info!(
            backend = backend.name(),
            progress_mode = ?backend.progress_mode(),
            video_dir = %config.storage.video_dir.display(),
            audio_dir = %config.storage.audio_dir.display(),
            "tubetap initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            bus,
            backend,
            supervisor,
            artifacts,
            url_pattern,
        })
    }

    /// Subscribe to progress events
    ///
    /// Each subscriber gets its own bounded queue. A subscriber that falls
    /// `subscriber_capacity` events behind is dropped; its
    /// [`recv`](Subscription::recv) then returns `None` once drained.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tubetap::{Config, TubeTap};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let tubetap = TubeTap::new(Config::default()).await?;
    ///
    ///     let mut events = tubetap.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Some(event) = events.recv().await {
    ///             println!("progress: {event}");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// The shared event bus
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Name of the active worker backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Accept a download request and start its job in the background
    ///
    /// Validation failures are returned synchronously and no job is started.
    /// Everything after that is reported only through the event bus; the
    /// returned handle completes once the job's terminal event is published.
    pub fn submit(&self, request: &DownloadRequest) -> Result<tokio::task::JoinHandle<()>> {
        let job = self.validate(request)?;
        let service = self.clone();
        Ok(tokio::spawn(async move { service.run_job(job).await }))
    }

    /// Serve a finished artifact once and delete it
    ///
    /// `encoded` is the `file_path` of a `download_complete` event.
    pub async fn retrieve(&self, encoded: &str) -> Result<Artifact> {
        self.artifacts.retrieve(encoded).await
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on the configured bind address (default: 0.0.0.0:5000).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let service = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }
}
