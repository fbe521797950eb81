use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use vidgate::api::models::{ErrorResponse, HealthResponse};
use vidgate::api::{AppState, build_router};
use vidgate::config::Config;
use vidgate::extractor::{
    ExtractionReport, ExtractionRequest, Extractor, ExtractorError, Result as ExtractResult,
};

const TEN_MB: usize = 10 * 1024 * 1024;

/// Stands in for yt-dlp: applies the duration limit, then writes `bytes`
/// to the output template
struct FakeExtractor {
    duration: f64,
    bytes: usize,
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn new(duration: f64, bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            duration,
            bytes,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> ExtractResult<ExtractionReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !request.limits.allows_duration(self.duration) {
            return Err(ExtractorError::Rejected(format!(
                "duration {} is too long",
                self.duration
            )));
        }

        let path = request
            .output_template
            .to_string_lossy()
            .replace("%(id)s", "dQw4w9WgXcQ")
            .replace("%(ext)s", "mp4");
        tokio::fs::write(&path, vec![0x42u8; self.bytes]).await?;

        Ok(ExtractionReport {
            id: "dQw4w9WgXcQ".to_string(),
            ext: "mp4".to_string(),
            duration: Some(self.duration),
            requested_downloads: vec![path.into()],
            filename: None,
        })
    }
}

fn create_test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.scratch.dir = temp_dir.path().join("scratch");
    config.rate_limit.enabled = false;
    config
}

/// Builds a test app with an isolated scratch directory
async fn build_test_app(config: Config, extractor: Arc<FakeExtractor>) -> (Router, AppState) {
    let state = AppState::with_extractor(config, extractor)
        .await
        .expect("Failed to build app state");

    (build_router(state.clone()), state)
}

fn download_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/download")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn error_message(response: axum::response::Response) -> String {
    let body: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    body.message
}

#[tokio::test]
async fn test_download_streams_file() {
    let temp_dir = TempDir::new().unwrap();
    let extractor = FakeExtractor::new(100.0, TEN_MB);
    let (app, state) = build_test_app(create_test_config(&temp_dir), Arc::clone(&extractor)).await;

    let response = app
        .oneshot(download_request(json!({
            "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "quality": "720"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"dQw4w9WgXcQ.mp4\""
    );
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        TEN_MB.to_string().as_str()
    );

    let bytes = body_bytes(response).await;
    assert_eq!(bytes.len(), TEN_MB);
    assert!(bytes.iter().all(|&b| b == 0x42));

    let gate = state.orchestrator.gate();
    assert_eq!(gate.available(), gate.capacity());
    assert_eq!(state.orchestrator.store().pending(), 1);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_download_too_long_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let (app, state) =
        build_test_app(create_test_config(&temp_dir), FakeExtractor::new(1000.0, TEN_MB)).await;

    let response = app
        .oneshot(download_request(json!({
            "url": "https://www.youtube.com/watch?v=long",
            "quality": "best"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "Video too large, too long, or not accessible"
    );

    let gate = state.orchestrator.gate();
    assert_eq!(gate.available(), gate.capacity());
    // The rejected request's workspace is cleaned up like a delivered one
    assert_eq!(state.orchestrator.store().pending(), 1);
}

#[tokio::test]
async fn test_download_missing_url() {
    let temp_dir = TempDir::new().unwrap();
    let extractor = FakeExtractor::new(100.0, 16);
    let (app, _state) = build_test_app(create_test_config(&temp_dir), Arc::clone(&extractor)).await;

    let response = app
        .oneshot(download_request(json!({"url": "   ", "quality": "best"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Video URL is required");
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_download_empty_body_reports_missing_url() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _state) =
        build_test_app(create_test_config(&temp_dir), FakeExtractor::new(100.0, 16)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/download")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Video URL is required");
}

#[tokio::test]
async fn test_download_malformed_json() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _state) =
        build_test_app(create_test_config(&temp_dir), FakeExtractor::new(100.0, 16)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/download")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"url\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_invalid_quality() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _state) =
        build_test_app(create_test_config(&temp_dir), FakeExtractor::new(100.0, 16)).await;

    let response = app
        .oneshot(download_request(json!({"url": "https://x", "quality": "ultra"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("ultra"));
}

#[tokio::test]
async fn test_download_busy_when_gate_saturated() {
    let temp_dir = TempDir::new().unwrap();
    let extractor = FakeExtractor::new(100.0, 16);
    let (app, state) = build_test_app(create_test_config(&temp_dir), Arc::clone(&extractor)).await;

    let gate = state.orchestrator.gate();
    let _held: Vec<_> = (0..gate.capacity())
        .map(|_| gate.try_acquire_slot().unwrap())
        .collect();

    let response = app
        .oneshot(download_request(json!({"url": "https://x", "quality": "best"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        error_message(response).await,
        "Server busy. Please try again shortly."
    );
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _state) =
        build_test_app(create_test_config(&temp_dir), FakeExtractor::new(100.0, 16)).await;

    let padding = "x".repeat(128 * 1024);
    let response = app
        .oneshot(download_request(json!({"url": "https://x", "quality": padding})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_bat_script() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _state) =
        build_test_app(create_test_config(&temp_dir), FakeExtractor::new(100.0, 16)).await;

    let request = Request::builder()
        .uri("/bat?url=%20https%3A%2F%2Fyoutu.be%2Fabc%20")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"download.bat\""
    );

    let script = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(
        script,
        "@echo off\r\nyt-dlp -f bestvideo+bestaudio --merge-output-format mp4 \"https://youtu.be/abc\"\r\npause\r\n"
    );
}

#[tokio::test]
async fn test_index_page() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _state) =
        build_test_app(create_test_config(&temp_dir), FakeExtractor::new(100.0, 16)).await;

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("/download"));
}

#[tokio::test]
async fn test_health_reports_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&temp_dir);
    config.limits.max_concurrent_downloads = 3;
    let (app, state) = build_test_app(config, FakeExtractor::new(100.0, 16)).await;

    let _held = state.orchestrator.gate().try_acquire_slot().unwrap();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.downloads.capacity, 3);
    assert_eq!(health.downloads.available, 2);
    assert_eq!(health.pending_cleanups, 0);
}

#[tokio::test]
async fn test_download_rate_limit() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&temp_dir);
    config.rate_limit.enabled = true;
    config.rate_limit.download_per_minute = 1;
    let (app, _state) = build_test_app(config, FakeExtractor::new(100.0, 16)).await;

    let first = app
        .clone()
        .oneshot(download_request(json!({"url": ""})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = app
        .oneshot(download_request(json!({"url": ""})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        error_message(second).await,
        "Server busy. Please try again shortly."
    );
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&temp_dir);
    config.rate_limit.enabled = true;
    config.rate_limit.default_per_hour = 1;
    let (app, _state) = build_test_app(config, FakeExtractor::new(100.0, 16)).await;

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let bat = || Request::builder().uri("/bat?url=x").body(Body::empty()).unwrap();
    let first = app.clone().oneshot(bat()).await.unwrap();
    let second = app.oneshot(bat()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
