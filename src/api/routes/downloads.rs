//! Job submission handler.

use super::DownloadAccepted;
use crate::api::AppState;
use crate::error::Error;
use crate::types::DownloadRequest;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Body of a 202 response
pub const DOWNLOAD_INITIATED: &str = "Download initiated, check /progress for status.";

/// POST /download - Start a download job
///
/// The body is parsed by hand so that malformed JSON yields the same error
/// shape as every other validation failure.
#[utoipa::path(
    post,
    path = "/download",
    tag = "downloads",
    request_body = DownloadRequest,
    responses(
        (status = 202, description = "Job started; follow /progress", body = DownloadAccepted),
        (status = 400, description = "Invalid JSON, missing URL or URL outside the allow-list", body = crate::error::ApiError)
    )
)]
pub async fn start_download(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match state.service.submit(&request) {
        Ok(_job) => (
            StatusCode::ACCEPTED,
            Json(DownloadAccepted {
                message: DOWNLOAD_INITIATED.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "download request rejected");
            e.into_response()
        }
    }
}

fn parse_request(body: &[u8]) -> Result<DownloadRequest, Error> {
    let invalid = || Error::Validation("Invalid JSON".into());

    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| invalid())?;
    if !value.is_object() || value.as_object().is_some_and(|o| o.is_empty()) {
        return Err(invalid());
    }
    serde_json::from_value(value).map_err(|_| invalid())
}
