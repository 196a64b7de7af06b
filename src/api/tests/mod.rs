use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use std::time::Duration;
use tower::ServiceExt;

mod progress;

const VIDEO_OK: &str = r#"printf 'video-bytes' > "{videos}/My Clip.mp4"
echo "DOWNLOADED_FILE:{videos}/My Clip.mp4""#;

/// Helper to create a test TubeTap instance wrapped in Arc
async fn create_test_service(video_script: &str) -> (Arc<TubeTap>, tempfile::TempDir) {
    let (service, temp_dir) =
        crate::downloader::test_helpers::create_test_tubetap(video_script, "exit 1").await;
    (Arc::new(service), temp_dir)
}

fn router_for(service: &Arc<TubeTap>) -> Router {
    create_router(service.clone(), service.get_config())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Read an SSE body until `needle` appears, returning everything read
async fn read_sse_until(stream: &mut axum::body::BodyDataStream, needle: &str) -> String {
    let mut text = String::new();
    while !text.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("timed out waiting for SSE data")
            .expect("SSE stream ended")
            .unwrap();
        text.push_str(&String::from_utf8_lossy(&chunk));
    }
    text
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;

    // Port 0 = OS assigns a free port
    let mut config = (*service.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let api_handle = tokio::spawn({
        let service = service.clone();
        async move {
            start_api_server_with_shutdown(service, config, async {
                stop_rx.await.ok();
            })
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .expect("server should stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_shutdown_closes_open_progress_streams() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let api_handle = tokio::spawn({
        let service = service.clone();
        let config = service.get_config();
        async move {
            serve(listener, service, config, async {
                stop_rx.await.ok();
            })
            .await
        }
    });

    let mut client = tokio::net::TcpStream::connect(address).await.unwrap();
    client
        .write_all(b"GET /progress HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .unwrap();
    let mut head = vec![0u8; 1024];
    let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut head))
        .await
        .expect("progress stream should answer")
        .unwrap();
    assert!(String::from_utf8_lossy(&head[..n]).starts_with("HTTP/1.1 200 OK"));

    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .expect("server should stop while a progress stream is open")
        .unwrap();
    assert!(result.is_ok());

    // The client sees the stream end rather than hang.
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
        .await
        .expect("connection should be closed")
        .unwrap();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;

    let mut config = (*service.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(service, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;

    let mut config = (*service.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(service, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = crate::downloader::test_helpers::test_config(temp_dir.path());
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let service = Arc::new(TubeTap::new(config).await.unwrap());

    let api_handle = service.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_download_progress_and_serve_flow() {
    let (service, _temp_dir) = create_test_service(VIDEO_OK).await;
    let app = router_for(&service);

    let response = app.clone().oneshot(get("/progress")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut events = response.into_body().into_data_stream();

    let response = app
        .clone()
        .oneshot(post_json(
            "/download",
            r#"{"url": "https://www.youtube.com/watch?v=abc", "quality": "720p"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let text = read_sse_until(&mut events, "download_complete").await;
    assert!(text.contains("event: progress"));
    assert!(text.contains(r#""message":"Starting download...""#));
    assert!(text.contains(r#""file_path":"My%20Clip.mp4""#));

    let response = app
        .clone()
        .oneshot(get("/serve_video/My%20Clip.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/serve_video/My%20Clip.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
