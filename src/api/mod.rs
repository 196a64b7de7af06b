//! REST API server module
//!
//! Exposes job submission, the server-sent progress stream and one-shot
//! artifact retrieval over HTTP, plus an OpenAPI description of all of it.

use crate::{Config, Result, TubeTap};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Jobs
/// - `POST /download` - Validate a request and start its download job
///
/// ## Progress
/// - `GET /progress` - Server-sent `progress` events for all jobs
///
/// ## Artifacts
/// - `GET /serve_video/*filename` - Serve a finished file once, then delete it
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(service: Arc<TubeTap>, config: Arc<Config>) -> Router {
    build_router(AppState::new(service, config))
}

fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        // Jobs
        .route("/download", post(routes::start_download))
        // Progress
        .route("/progress", get(routes::progress_stream))
        // Artifacts
        .route("/serve_video/*filename", get(routes::serve_artifact))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Swagger UI serves its own copy at /api-docs/openapi.json; /openapi.json is routed above
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    // Progress is consumed from browser front ends on other origins
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails. See [`start_api_server_with_shutdown`] for a
/// server that stops when a future resolves.
///
/// # Example
///
/// ```no_run
/// use tubetap::{Config, TubeTap};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let service = Arc::new(TubeTap::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// tubetap::api::start_api_server(service, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(service: Arc<TubeTap>, config: Arc<Config>) -> Result<()> {
    start_api_server_with_shutdown(service, config, std::future::pending()).await
}

/// Start the API server and stop it gracefully once `shutdown` resolves
///
/// Open progress streams are ended when `shutdown` resolves so the graceful
/// phase does not wait on them; running jobs are not awaited.
pub async fn start_api_server_with_shutdown<F>(
    service: Arc<TubeTap>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve(listener, service, config, shutdown).await
}

async fn serve<F>(
    listener: TcpListener,
    service: Arc<TubeTap>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::new(service, config);
    let streams = state.shutdown.clone();
    let app = build_router(state);

    if let Ok(address) = listener.local_addr() {
        tracing::info!(address = %address, "API server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            streams.cancel();
        })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
