//! Wire types for the HTTP surface
//!
//! `POST /download` takes a [`DownloadRequest`](crate::request::DownloadRequest)
//! body and answers with the file itself, so the only JSON responses here are
//! errors and health.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;

/// Every non-2xx JSON body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Query string of `GET /bat`
#[derive(Debug, Default, Deserialize)]
pub struct BatQuery {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub downloads: DownloadCapacity,
    pub pending_cleanups: usize,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadCapacity {
    pub capacity: usize,
    pub available: usize,
}
