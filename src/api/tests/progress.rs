use super::*;
use crate::types::ProgressEvent;

#[tokio::test]
async fn test_progress_stream_headers() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;
    let app = router_for(&service);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/progress")
                .header("Accept", "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(
        content_type.contains("text/event-stream"),
        "Content-Type should be text/event-stream, got: {content_type}"
    );
}

#[tokio::test]
async fn test_progress_stream_delivers_published_events() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;
    let app = router_for(&service);

    let response = app.oneshot(get("/progress")).await.unwrap();
    let mut stream = response.into_body().into_data_stream();
    assert_eq!(service.bus().observer_count(), 1);

    service
        .bus()
        .publish(&ProgressEvent::downloading(42, "Downloading: 42%"));

    let text = read_sse_until(&mut stream, "Downloading: 42%").await;
    assert!(text.contains("event: progress"));
    assert!(text.contains(
        r#"data: {"status":"downloading","progress":42,"message":"Downloading: 42%"}"#
    ));
}

#[tokio::test]
async fn test_each_connection_gets_every_event() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;
    let app = router_for(&service);

    let mut first = app
        .clone()
        .oneshot(get("/progress"))
        .await
        .unwrap()
        .into_body()
        .into_data_stream();
    let mut second = app
        .oneshot(get("/progress"))
        .await
        .unwrap()
        .into_body()
        .into_data_stream();

    service.bus().publish(&ProgressEvent::error("boom"));

    assert!(read_sse_until(&mut first, "boom").await.contains(r#""status":"error""#));
    assert!(read_sse_until(&mut second, "boom").await.contains(r#""status":"error""#));
}

#[tokio::test]
async fn test_closed_connection_is_pruned() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;
    let app = router_for(&service);

    let response = app.oneshot(get("/progress")).await.unwrap();
    assert_eq!(service.bus().observer_count(), 1);
    drop(response);

    service.bus().publish(&ProgressEvent::downloading(1, "x"));
    assert_eq!(service.bus().observer_count(), 0);
}
