//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the tubetap REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the tubetap REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tubetap REST API",
        version = "0.1.0",
        description = "Start media downloads, follow their progress as server-sent events and fetch each finished file exactly once",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::start_download,

        // Progress
        crate::api::routes::progress_stream,

        // Artifacts
        crate::api::routes::serve_artifact,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::DownloadRequest,
        crate::types::ProgressEvent,
        crate::types::MediaKind,
        crate::types::Quality,

        // Config types from config.rs
        crate::config::Config,
        crate::config::WorkerConfig,
        crate::config::WorkerProgram,
        crate::config::WorkerBackendKind,
        crate::config::StorageConfig,
        crate::config::ProgressConfig,
        crate::config::ValidationConfig,
        crate::config::ApiConfig,

        // API request/response types
        crate::api::routes::DownloadAccepted,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Job submission - Validate a media URL and start its download"),
        (name = "progress", description = "Progress - Server-sent events for every running job"),
        (name = "artifacts", description = "Artifacts - One-shot, self-deleting retrieval of finished files"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
