//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] - Job submission
//! - [`progress`] - Server-sent progress stream
//! - [`artifacts`] - One-shot artifact retrieval
//! - [`system`] - Health, OpenAPI

use serde::{Deserialize, Serialize};

mod artifacts;
mod downloads;
mod progress;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use artifacts::*;
pub use downloads::*;
pub use progress::*;
pub use system::*;

/// Response body for an accepted POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadAccepted {
    /// Where to look next
    pub message: String,
}
