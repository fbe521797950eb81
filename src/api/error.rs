use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::orchestrator::DownloadError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error("Request body too large: limit is {0} bytes")]
    PayloadTooLarge(usize),
    /// Shares its message with [`DownloadError::Busy`]
    #[error("Server busy. Please try again shortly.")]
    RateLimited,
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("Error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Download(err) => match err {
                DownloadError::Validation(_) | DownloadError::Rejected(_) => {
                    StatusCode::BAD_REQUEST
                }
                DownloadError::Busy => StatusCode::TOO_MANY_REQUESTS,
                DownloadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(format!("Invalid JSON body: {value}"))
    }
}
