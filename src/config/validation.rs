use super::models::Config;
use thiserror::Error;

/// Output containers yt-dlp can merge into
const MERGE_FORMATS: &[&str] = &["mp4", "mkv", "webm", "mov", "flv", "avi"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("limits.max_concurrent_downloads must be at least 1")]
    NoDownloadSlots,

    #[error("limits.max_file_size must be positive")]
    InvalidMaxFileSize,

    #[error("limits.max_duration_seconds must be positive")]
    InvalidMaxDuration,

    #[error("scratch.cleanup_delay_secs must be positive")]
    InvalidCleanupDelay,

    #[error("Rate limit quota must be positive when enabled: {field}")]
    InvalidRateLimit { field: String },

    #[error("extractor.binary must not be empty")]
    MissingExtractorBinary,

    #[error("Unsupported merge output format '{format}'")]
    UnsupportedMergeFormat { format: String },

    #[error("server.max_body_bytes must be positive")]
    InvalidBodyLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_limits(config)?;
    validate_scratch(config)?;
    validate_rate_limit(config)?;
    validate_extractor(config)?;
    Ok(())
}

fn validate_limits(config: &Config) -> Result<(), ValidationError> {
    if config.limits.max_concurrent_downloads == 0 {
        return Err(ValidationError::NoDownloadSlots);
    }

    if config.limits.max_file_size.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxFileSize);
    }

    if config.limits.max_duration_seconds == 0 {
        return Err(ValidationError::InvalidMaxDuration);
    }

    if config.server.max_body_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidBodyLimit);
    }

    Ok(())
}

fn validate_scratch(config: &Config) -> Result<(), ValidationError> {
    if config.scratch.cleanup_delay_secs == 0 {
        return Err(ValidationError::InvalidCleanupDelay);
    }
    Ok(())
}

fn validate_rate_limit(config: &Config) -> Result<(), ValidationError> {
    if !config.rate_limit.enabled {
        return Ok(());
    }

    if config.rate_limit.download_per_minute == 0 {
        return Err(ValidationError::InvalidRateLimit {
            field: "download_per_minute".to_string(),
        });
    }

    if config.rate_limit.default_per_hour == 0 {
        return Err(ValidationError::InvalidRateLimit {
            field: "default_per_hour".to_string(),
        });
    }

    Ok(())
}

fn validate_extractor(config: &Config) -> Result<(), ValidationError> {
    if config.extractor.binary.trim().is_empty() {
        return Err(ValidationError::MissingExtractorBinary);
    }

    let format = config.extractor.merge_output_format.as_str();
    if !MERGE_FORMATS.contains(&format) {
        return Err(ValidationError::UnsupportedMergeFormat {
            format: format.to_string(),
        });
    }

    Ok(())
}
