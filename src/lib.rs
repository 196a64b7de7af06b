//! # tubetap
//!
//! Progress broadcast and download-job lifecycle manager for media downloads
//! performed by an external worker process.
//!
//! ## Overview
//!
//! - **Event bus** - every observer owns a bounded queue; a slow observer is
//!   dropped instead of slowing anyone else down
//! - **Process supervision** - one worker process per job, batch or streaming
//! - **Progress** - derived from worker output, or synthesized on a timer for
//!   workers that stay silent until they exit
//! - **Job orchestration** - every started job ends with exactly one
//!   `download_complete` or `error` event
//! - **Artifact handoff** - a finished file is served once and deleted
//!
//! ## Quick Start
//!
//! ```no_run
//! use tubetap::{Config, DownloadRequest, TubeTap};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tubetap = TubeTap::new(Config::default()).await?;
//!
//!     // Subscribe before submitting so no event is missed
//!     let mut events = tubetap.subscribe();
//!
//!     tubetap.submit(&DownloadRequest {
//!         url: Some("https://youtu.be/abc123".into()),
//!         quality: Some("192K".into()),
//!     })?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Artifact location, cleanup and one-shot retrieval
pub mod artifact;
/// Configuration types
pub mod config;
/// Job orchestration
pub mod downloader;
/// Error types
pub mod error;
/// Progress event fan-out
pub mod event_bus;
/// Derived and synthetic progress
pub mod progress;
/// Core types and events
pub mod types;
/// External worker contracts, supervision and output parsing
pub mod worker;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactStore};
pub use config::Config;
pub use downloader::TubeTap;
pub use error::{ApiError, Error, ErrorDetail, Result, RetrievalError, ToHttpStatus};
pub use event_bus::{EventBus, Subscription};
pub use types::{DownloadRequest, JobSpec, MediaKind, ProgressEvent, Quality};
pub use worker::{ProgressMode, SpecializedWorker, WorkerBackend, YtDlpWorker};

/// Serve the REST API until a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Running jobs are not awaited; their worker processes are killed when the
/// runtime shuts down.
///
/// # Example
///
/// ```no_run
/// use tubetap::{Config, TubeTap, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tubetap = TubeTap::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(Arc::new(tubetap)).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: std::sync::Arc<TubeTap>) -> Result<()> {
    let config = service.get_config();
    api::start_api_server_with_shutdown(service, config, wait_for_signal()).await?;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
