//! yt-dlp command-line extractor
//!
//! Runs the binary once per job with `--dump-single-json --no-simulate`, so a
//! single invocation both downloads the media and reports the resulting
//! metadata on stdout.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{ExtractionReport, ExtractionRequest, Extractor, ExtractorError, PolicyLimits, Result};
use crate::config::ExtractorConfig;

/// Extractor backed by the `yt-dlp` binary
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Command-line arguments for one job
    pub fn build_args(&self, request: &ExtractionRequest) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            request.format.clone(),
            "--merge-output-format".to_string(),
            self.config.merge_output_format.clone(),
            "--output".to_string(),
            request.output_template.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--dump-single-json".to_string(),
            "--no-simulate".to_string(),
        ];

        // Policy limits
        args.push("--max-filesize".to_string());
        args.push(request.limits.max_file_size.to_cli_arg());
        args.push("--match-filter".to_string());
        args.push(format!(
            "duration < {}",
            request.limits.max_duration.as_secs()
        ));

        args.push("--add-headers".to_string());
        args.push(format!("User-Agent:{}", self.config.user_agent));

        if let Some(referer) = self.config.referer.as_deref().filter(|r| !r.is_empty()) {
            args.push("--add-headers".to_string());
            args.push(format!("Referer:{referer}"));
        }

        if !self.config.youtube_player_clients.is_empty() {
            args.push("--extractor-args".to_string());
            args.push(format!(
                "youtube:player_client={}",
                self.config.youtube_player_clients.join(",")
            ));
        }

        // Keep URLs that start with '-' from being read as options
        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<Output> {
        Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExtractorError::Spawn {
                binary: self.config.binary.clone(),
                source,
            })
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionReport> {
        let args = self.build_args(request);
        debug!(binary = %self.config.binary, ?args, "Invoking yt-dlp");

        let output = self.run(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&output.status.to_string(), &stderr));
        }

        let report = parse_report(&output.stdout, &request.limits)?;

        info!(
            id = %report.id,
            duration = ?report.duration,
            files = report.requested_downloads.len(),
            "yt-dlp finished"
        );

        Ok(report)
    }
}

/// yt-dlp reports download errors as `ERROR: ...` lines; anything else that
/// exits non-zero is a crash of the tool itself
fn classify_failure(status: &str, stderr: &str) -> ExtractorError {
    if let Some(line) = stderr
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
    {
        warn!(error = %line, "yt-dlp rejected the download");
        return ExtractorError::Rejected(line.trim_start_matches("ERROR:").trim().to_string());
    }

    let detail = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no diagnostic output")
        .to_string();

    ExtractorError::Crashed {
        status: status.to_string(),
        detail,
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
    #[serde(default)]
    requested_downloads: Vec<RequestedDownload>,
    #[serde(default, rename = "_filename")]
    filename: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RequestedDownload {
    #[serde(default)]
    filepath: Option<PathBuf>,
    #[serde(default, rename = "_filename")]
    filename: Option<PathBuf>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
}

fn size_of(exact: Option<u64>, approx: Option<f64>) -> Option<u64> {
    exact.or_else(|| approx.map(|approx| approx as u64))
}

struct ParsedInfo {
    report: ExtractionReport,
    size_hint: Option<u64>,
}

fn parse_info(stdout: &[u8]) -> Result<ParsedInfo> {
    let text = String::from_utf8_lossy(stdout);
    let json = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| {
            ExtractorError::Rejected("no media passed the download filters".to_string())
        })?;

    let info: InfoJson = serde_json::from_str(json)
        .map_err(|e| ExtractorError::MalformedOutput(e.to_string()))?;

    // Merged downloads report sizes per stream only
    let stream_sizes: Option<u64> = if info.requested_downloads.is_empty() {
        None
    } else {
        info.requested_downloads
            .iter()
            .map(|download| size_of(download.filesize, download.filesize_approx))
            .sum()
    };
    let size_hint = size_of(info.filesize, info.filesize_approx).or(stream_sizes);

    let requested_downloads = info
        .requested_downloads
        .into_iter()
        .filter_map(|download| download.filepath.or(download.filename))
        .collect();

    Ok(ParsedInfo {
        report: ExtractionReport {
            id: info.id,
            ext: info.ext.unwrap_or_else(|| "mp4".to_string()),
            duration: info.duration,
            requested_downloads,
            filename: info.filename,
        },
        size_hint,
    })
}

fn parse_report(stdout: &[u8], limits: &PolicyLimits) -> Result<ExtractionReport> {
    let parsed = parse_info(stdout)?;
    enforce_policy(&parsed, limits)?;
    Ok(parsed.report)
}

/// yt-dlp's filters skip rather than fail, and an aborted oversized download
/// is still listed in `requested_downloads`; turn both into a rejection
fn enforce_policy(parsed: &ParsedInfo, limits: &PolicyLimits) -> Result<()> {
    if let Some(duration) = parsed.report.duration {
        if !limits.allows_duration(duration) {
            return Err(ExtractorError::Rejected(format!(
                "duration {duration:.0}s exceeds limit of {}s",
                limits.max_duration.as_secs()
            )));
        }
    }

    if let Some(size) = parsed.size_hint {
        if !limits.allows_size(size) {
            return Err(ExtractorError::Rejected(format!(
                "reported size {size} bytes exceeds limit of {}",
                limits.max_file_size
            )));
        }
        if parsed.report.requested_downloads.is_empty() {
            return Err(ExtractorError::Rejected(format!(
                "nothing downloaded, reported size {size} bytes"
            )));
        }
    }

    Ok(())
}
