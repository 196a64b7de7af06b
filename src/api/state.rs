//! Application state for the API server

use crate::{Config, TubeTap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the service instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main TubeTap instance
    pub service: Arc<TubeTap>,

    /// Configuration (read-only)
    pub config: Arc<Config>,

    /// Cancelled when the server begins shutting down; ends open progress streams
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<TubeTap>, config: Arc<Config>) -> Self {
        Self {
            service,
            config,
            shutdown: CancellationToken::new(),
        }
    }
}
