//! Server-sent progress stream.

use crate::api::AppState;
use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use std::convert::Infallible;
use std::time::Duration;
use futures::{Stream, StreamExt};

/// Interval between keep-alive comments on an idle stream
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /progress - Server-sent events stream
///
/// Every connection is its own observer with a bounded queue. Each message is
/// an `event: progress` frame whose data is one serialized progress event.
/// An observer that falls too far behind is dropped and its stream ends.
/// Every stream also ends when the server starts shutting down.
#[utoipa::path(
    get,
    path = "/progress",
    tag = "progress",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream", body = crate::types::ProgressEvent)
    )
)]
pub async fn progress_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.service.subscribe();
    let shutdown = state.shutdown.clone();

    let stream = subscription
        .into_stream()
        .map(|payload| Ok(SseEvent::default().event("progress").data(&*payload)))
        .take_until(async move { shutdown.cancelled().await });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
