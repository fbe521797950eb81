use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tokio_util::io::ReaderStream;

use super::{
    error::ApiError,
    models::{BatQuery, DownloadCapacity, HealthResponse},
    state::AppState,
    utils::{BAT_FILENAME, content_disposition, parse_content_type, render_bat_script},
};
use crate::request::DownloadRequest;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Landing page (GET /)
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Windows helper script (GET /bat?url=...)
pub async fn bat_script(Query(query): Query<BatQuery>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(BAT_FILENAME)),
        ],
        render_bat_script(&query.url),
    )
}

/// Synchronous download (POST /download)
///
/// ## Flow:
/// 1. Read the JSON body (bounded by `server.max_body_bytes`)
/// 2. Hand it to the orchestrator: validate, admit, extract
/// 3. Stream the file back as an attachment
///
/// The response body streams from a handle opened before the file was
/// scheduled for removal.
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    if let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        parse_content_type(content_type)?;
    }

    let limit = usize::try_from(state.config.server.max_body_bytes.as_u64()).unwrap_or(usize::MAX);
    let body_bytes = read_body(body, limit).await?;

    // An empty body reads as an empty object so the URL check reports it
    let request: DownloadRequest = if body_bytes.iter().all(u8::is_ascii_whitespace) {
        DownloadRequest::default()
    } else {
        serde_json::from_slice(&body_bytes)?
    };

    let delivered = state.orchestrator.handle(&request).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, delivered.content_type)
        .header(header::CONTENT_LENGTH, delivered.size)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&delivered.filename),
        )
        .body(Body::from_stream(ReaderStream::new(delivered.file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Reads the request body, refusing anything over `limit` bytes
async fn read_body(body: Body, limit: usize) -> Result<Vec<u8>, ApiError> {
    let collected = Limited::new(body, limit).collect().await.map_err(|err| {
        if err.downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge(limit)
        } else {
            ApiError::Internal(err.to_string())
        }
    })?;

    Ok(collected.to_bytes().to_vec())
}

/// Health check endpoint (GET /health)
///
/// Reports slot availability and pending cleanups. Always 200 while the
/// process can answer.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let orchestrator = &state.orchestrator;
    let gate = orchestrator.gate();

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        downloads: DownloadCapacity {
            capacity: gate.capacity(),
            available: gate.available(),
        },
        pending_cleanups: orchestrator.store().pending(),
        metrics: orchestrator.metrics().snapshot(),
    };

    (StatusCode::OK, Json(response))
}
