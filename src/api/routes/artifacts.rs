//! One-shot artifact retrieval.

use crate::api::AppState;
use axum::{
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

const ROUTE_PREFIX: &str = "/serve_video/";

/// GET /serve_video/{filename} - Serve a finished artifact once, then delete it
///
/// `filename` is the percent-encoded `file_path` of a `download_complete`
/// event. The raw path is used so the name is decoded exactly once.
#[utoipa::path(
    get,
    path = "/serve_video/{filename}",
    tag = "artifacts",
    params(
        ("filename" = String, Path, description = "Percent-encoded artifact name")
    ),
    responses(
        (status = 200, description = "Artifact bytes (the file is deleted afterwards)", content_type = "application/octet-stream"),
        (status = 403, description = "Name escapes the artifact directories or has a disallowed extension", body = crate::error::ApiError),
        (status = 404, description = "No such artifact, or it was already served", body = crate::error::ApiError)
    )
)]
pub async fn serve_artifact(State(state): State<AppState>, uri: Uri) -> Response {
    let encoded = uri.path().strip_prefix(ROUTE_PREFIX).unwrap_or_default();

    match state.service.retrieve(encoded).await {
        Ok(artifact) => {
            let disposition = artifact.content_disposition();
            let length = artifact.len().to_string();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, artifact.content_type.to_string()),
                    (header::CONTENT_LENGTH, length),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.bytes,
            )
                .into_response()
        }
        Err(e) => {
            tracing::info!(name = encoded, error = %e, "artifact retrieval refused");
            e.into_response()
        }
    }
}
