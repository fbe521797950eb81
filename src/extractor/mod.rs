//! Extractor boundary
//!
//! The extractor is the black box that turns a source URL into a media file on
//! disk. Production uses [`YtDlpExtractor`]; tests plug in their own
//! [`Extractor`] implementations.
//!
//! ## Error contract
//!
//! [`ExtractorError::Rejected`] is the distinguished kind: the source was
//! refused by policy (too large, too long), the requested format is not
//! available, or the site is not accessible. Callers report it to clients with
//! a generic message. Every other variant is an internal failure.

mod ytdlp;

pub use ytdlp::YtDlpExtractor;

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::LimitsConfig;
use crate::humanize::ByteSize;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("extraction rejected: {0}")]
    Rejected(String),

    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("extractor exited with {status}: {detail}")]
    Crashed { status: String, detail: String },

    #[error("unreadable extractor output: {0}")]
    MalformedOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractorError {
    /// Whether this failure is the client-facing policy/access rejection
    pub fn is_rejection(&self) -> bool {
        matches!(self, ExtractorError::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

/// Process-wide download limits, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLimits {
    pub max_file_size: ByteSize,
    pub max_duration: Duration,
}

impl PolicyLimits {
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self {
            max_file_size: limits.max_file_size,
            max_duration: Duration::from_secs(limits.max_duration_seconds),
        }
    }

    /// Sources must be strictly shorter than the limit
    pub fn allows_duration(&self, seconds: f64) -> bool {
        seconds < self.max_duration.as_secs_f64()
    }

    pub fn allows_size(&self, bytes: u64) -> bool {
        bytes <= self.max_file_size.as_u64()
    }
}

/// Everything the extractor needs for one job
#[derive(Debug, Clone, bon::Builder)]
pub struct ExtractionRequest {
    #[builder(into)]
    pub url: String,
    /// yt-dlp style format selector
    #[builder(into)]
    pub format: String,
    /// Output path template containing `%(id)s` and `%(ext)s`
    pub output_template: PathBuf,
    pub limits: PolicyLimits,
}

/// What the extractor reports after a successful run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    /// Extractor-assigned media identifier
    pub id: String,
    pub ext: String,
    pub duration: Option<f64>,
    /// Final files, in the order the extractor produced them
    pub requested_downloads: Vec<PathBuf>,
    /// Path the extractor computed from the output template, if reported
    pub filename: Option<PathBuf>,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Download the media for `request`, returning where it ended up
    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionReport>;
}
