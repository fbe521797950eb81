//! Per-request download pipeline
//!
//! ```text
//! Idle -> Admitted -> Extracting -> {Succeeded, Failed} -> SlotReleased
//! ```
//!
//! Validation happens before admission, so a malformed request never touches
//! the gate. Once admitted, the [`DownloadSlot`](crate::admission::DownloadSlot)
//! lives until [`DownloadOrchestrator::handle`] returns or unwinds.
//!
//! Each admitted request downloads into its own scratch workspace. The
//! workspace is scheduled for removal when the request finishes, whatever the
//! outcome, so partial and intermediate files never outlive the cleanup delay.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::admission::AdmissionGate;
use crate::extractor::{ExtractionReport, ExtractionRequest, Extractor, PolicyLimits};
use crate::observability::Metrics;
use crate::request::{DownloadRequest, JobSpec, RequestError};
use crate::scratch::{TempStore, remove_quietly};

/// Content type of every delivered file
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Fallback attachment name when the output path has no usable file name
const FALLBACK_FILENAME: &str = "video.mp4";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Validation(#[from] RequestError),

    #[error("Server busy. Please try again shortly.")]
    Busy,

    /// The detail is for logs only
    #[error("Video too large, too long, or not accessible")]
    Rejected(String),

    #[error("Error: {0}")]
    Internal(String),
}

impl DownloadError {
    /// Diagnostic text, including details hidden from clients
    pub fn detail(&self) -> String {
        match self {
            DownloadError::Rejected(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Lifecycle phase, attached to log events as `phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Admitted,
    Extracting,
    Succeeded,
    Failed,
    SlotReleased,
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownloadPhase::Admitted => "admitted",
            DownloadPhase::Extracting => "extracting",
            DownloadPhase::Succeeded => "succeeded",
            DownloadPhase::Failed => "failed",
            DownloadPhase::SlotReleased => "slot_released",
        };
        f.write_str(name)
    }
}

/// A downloaded file ready to stream back to the client
///
/// The handle is opened before the workspace is scheduled for removal, so the
/// bytes stay readable on Unix even if removal fires mid-stream.
#[derive(Debug)]
pub struct DeliveredFile {
    pub file: File,
    pub path: PathBuf,
    /// Base name for `Content-Disposition`
    pub filename: String,
    pub size: u64,
    pub content_type: &'static str,
}

#[derive(bon::Builder)]
pub struct DownloadOrchestrator {
    gate: Arc<AdmissionGate>,
    extractor: Arc<dyn Extractor>,
    store: Arc<TempStore>,
    limits: PolicyLimits,
    #[builder(default)]
    metrics: Arc<Metrics>,
}

impl DownloadOrchestrator {
    pub fn gate(&self) -> &Arc<AdmissionGate> {
        &self.gate
    }

    pub fn store(&self) -> &Arc<TempStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn handle(&self, raw: &DownloadRequest) -> Result<DeliveredFile, DownloadError> {
        let job = JobSpec::validate(raw).inspect_err(|e| {
            debug!(error = %e, "Rejected invalid download request");
        })?;

        let request_id = Uuid::new_v4();

        let Some(slot) = self.gate.try_acquire_slot() else {
            self.metrics.download_rejected_busy();
            warn!(
                %request_id,
                url = %job.url,
                capacity = self.gate.capacity(),
                "All download slots busy"
            );
            return Err(DownloadError::Busy);
        };

        self.metrics.download_admitted();
        info!(
            %request_id,
            phase = %DownloadPhase::Admitted,
            url = %job.url,
            quality = %job.quality,
            in_flight = self.gate.in_flight(),
            "Download admitted"
        );

        let outcome = self.run_admitted(request_id, &job).await;

        drop(slot);
        debug!(
            %request_id,
            phase = %DownloadPhase::SlotReleased,
            available = self.gate.available(),
            "Download slot released"
        );

        outcome
    }

    async fn run_admitted(
        &self,
        request_id: Uuid,
        job: &JobSpec,
    ) -> Result<DeliveredFile, DownloadError> {
        let workspace = self
            .store
            .workspace(&request_id.to_string())
            .await
            .map_err(|e| {
                self.metrics.download_failed();
                error!(%request_id, phase = %DownloadPhase::Failed, error = %e, "Could not create workspace");
                DownloadError::Internal(e.to_string())
            })?;
        let template = workspace.output_template();
        let request = ExtractionRequest::builder()
            .url(job.url.as_str())
            .format(job.quality.format_selector())
            .output_template(template.clone())
            .limits(self.limits)
            .build();

        debug!(%request_id, phase = %DownloadPhase::Extracting, format = %request.format, "Starting extraction");

        let report = match self.extractor.extract(&request).await {
            Ok(report) => report,
            Err(e) if e.is_rejection() => {
                self.metrics.download_rejected();
                warn!(%request_id, phase = %DownloadPhase::Failed, detail = %e, "Extraction rejected");
                return Err(DownloadError::Rejected(e.to_string()));
            }
            Err(e) => {
                self.metrics.download_failed();
                error!(%request_id, phase = %DownloadPhase::Failed, error = %e, "Extraction failed");
                return Err(DownloadError::Internal(e.to_string()));
            }
        };

        let path = resolve_output_path(&report, &template);
        match self.deliver(&path).await {
            Ok(delivered) => {
                self.metrics.download_succeeded();
                info!(
                    %request_id,
                    phase = %DownloadPhase::Succeeded,
                    path = %delivered.path.display(),
                    size = delivered.size,
                    "Download ready"
                );
                Ok(delivered)
            }
            Err(e) => {
                match &e {
                    DownloadError::Rejected(_) => self.metrics.download_rejected(),
                    _ => self.metrics.download_failed(),
                }
                warn!(%request_id, phase = %DownloadPhase::Failed, path = %path.display(), detail = %e.detail(), "Delivery failed");
                Err(e)
            }
        }
    }

    async fn deliver(&self, path: &Path) -> Result<DeliveredFile, DownloadError> {
        let file = File::open(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => DownloadError::Internal("Downloaded file not found".to_string()),
            _ => DownloadError::Internal(format!("failed to open {}: {e}", path.display())),
        })?;

        let metadata = file
            .metadata()
            .await
            .map_err(|e| DownloadError::Internal(e.to_string()))?;

        if !metadata.is_file() {
            return Err(DownloadError::Internal("Downloaded file not found".to_string()));
        }

        if !self.limits.allows_size(metadata.len()) {
            remove_quietly(path).await;
            return Err(DownloadError::Rejected(format!(
                "file is {} bytes, limit is {}",
                metadata.len(),
                self.limits.max_file_size
            )));
        }

        Ok(DeliveredFile {
            file,
            path: path.to_path_buf(),
            filename: attachment_name(path),
            size: metadata.len(),
            content_type: VIDEO_CONTENT_TYPE,
        })
    }
}

/// Where the extractor left its output
///
/// Prefers the first requested download, then the reported filename, then
/// the template with the media id and extension substituted.
pub fn resolve_output_path(report: &ExtractionReport, template: &Path) -> PathBuf {
    if let Some(first) = report.requested_downloads.first() {
        return first.clone();
    }
    if let Some(filename) = &report.filename {
        return filename.clone();
    }

    let rendered = template
        .to_string_lossy()
        .replace("%(id)s", &report.id)
        .replace("%(ext)s", &report.ext);
    PathBuf::from(rendered)
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}
