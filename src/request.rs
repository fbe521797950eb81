//! Download request validation
//!
//! Turns the raw JSON body of `POST /download` into a [`JobSpec`]. Validation
//! is a pure function of the input; nothing here touches the gate or disk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;

/// Quality keyword that selects the best available streams
pub const BEST_QUALITY: &str = "best";

/// Raw request body as sent by clients
///
/// Both fields are optional at the wire level so that a missing URL produces
/// a descriptive validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub quality: Option<String>,
}

/// Accept `"720"` and `720` alike for the quality field
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            quality: Some(quality.into()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Video URL is required")]
    MissingUrl,

    #[error("Invalid quality '{0}': expected \"best\" or a positive height such as 720")]
    InvalidQuality(String),
}

/// Requested output quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityHint {
    Best,
    /// Best video stream whose height does not exceed the bound
    MaxHeight(NonZeroU32),
}

impl QualityHint {
    pub fn parse(raw: Option<&str>) -> Result<Self, RequestError> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() || raw.eq_ignore_ascii_case(BEST_QUALITY) {
            return Ok(QualityHint::Best);
        }

        raw.parse::<NonZeroU32>()
            .map(QualityHint::MaxHeight)
            .map_err(|_| RequestError::InvalidQuality(raw.to_string()))
    }

    /// yt-dlp format selector: merged best video and audio, falling back to
    /// the best single file
    pub fn format_selector(&self) -> String {
        match self {
            QualityHint::Best => "bv*+ba/best".to_string(),
            QualityHint::MaxHeight(height) => format!("bv*[height<={height}]+ba/best"),
        }
    }
}

impl fmt::Display for QualityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityHint::Best => f.write_str(BEST_QUALITY),
            QualityHint::MaxHeight(height) => write!(f, "{height}p"),
        }
    }
}

/// Validated download job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub url: String,
    pub quality: QualityHint,
}

impl JobSpec {
    pub fn validate(raw: &DownloadRequest) -> Result<Self, RequestError> {
        let url = raw
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(RequestError::MissingUrl)?;

        let quality = QualityHint::parse(raw.quality.as_deref())?;

        Ok(Self {
            url: url.to_string(),
            quality,
        })
    }
}
