//! Error types for tubetap
//!
//! This module provides error handling for the library, including:
//! - The job error taxonomy (validation, worker launch, worker exit, missing artifact)
//! - Retrieval errors for the one-shot artifact handoff
//! - HTTP status code mapping and structured JSON error bodies for the API

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for tubetap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tubetap
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.video_dir")
        key: Option<String>,
    },

    /// Request rejected before any job was started
    #[error("{0}")]
    Validation(String),

    /// The worker executable could not be started
    #[error("failed to start worker {program}: {reason}")]
    WorkerLaunch {
        /// Program that was executed
        program: PathBuf,
        /// Underlying OS error text
        reason: String,
    },

    /// The worker ran but exited unsuccessfully
    #[error("{message}")]
    WorkerExit {
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Classified, user-facing message
        message: String,
    },

    /// Worker reported success but no output file could be located
    #[error("Downloaded file not found. Expected path: {}", expected.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ArtifactMissing {
        /// Path the worker reported or the locator derived, if any
        expected: Option<PathBuf>,
    },

    /// Artifact retrieval failed
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors of the one-shot artifact handoff
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// No file with this name exists (or it was already served)
    #[error("file not found: {name}")]
    NotFound {
        /// Requested (decoded) name
        name: String,
    },

    /// The name resolves outside the allow-listed directories or has a disallowed extension
    #[error("access to {name} denied: {reason}")]
    Forbidden {
        /// Requested (decoded) name
        name: String,
        /// Why the request was refused
        reason: String,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "file not found: clip.mp4"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 403 / 404 from the handoff
            Error::Retrieval(RetrievalError::Forbidden { .. }) => 403,
            Error::Retrieval(RetrievalError::NotFound { .. }) => 404,

            // 502 Bad Gateway - the worker talked to the remote and failed
            Error::WorkerExit { .. } => 502,
            Error::ArtifactMissing { .. } => 502,

            // 503 Service Unavailable - worker cannot be run at all
            Error::WorkerLaunch { .. } => 503,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::WorkerLaunch { .. } => "worker_launch_error",
            Error::WorkerExit { .. } => "worker_exit_error",
            Error::ArtifactMissing { .. } => "artifact_missing",
            Error::Retrieval(RetrievalError::NotFound { .. }) => "not_found",
            Error::Retrieval(RetrievalError::Forbidden { .. }) => "forbidden",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::WorkerExit { code, .. } => Some(serde_json::json!({ "exit_code": code })),
            Error::Retrieval(RetrievalError::Forbidden { reason, .. }) => {
                Some(serde_json::json!({ "reason": reason }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
