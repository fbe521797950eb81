use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for `POST /download` bodies
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize(64 * 1024)
}

/// Download resource limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: ByteSize,
    #[serde(default = "default_max_duration_seconds")]
    pub max_duration_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_file_size: default_max_file_size(),
            max_duration_seconds: default_max_duration_seconds(),
        }
    }
}

fn default_max_concurrent_downloads() -> usize {
    2
}

fn default_max_file_size() -> ByteSize {
    ByteSize::from_megabytes(200)
}

fn default_max_duration_seconds() -> u64 {
    15 * 60
}

/// Scratch directory and cleanup timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScratchConfig {
    #[serde(default = "default_scratch_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,
    /// Remove leftovers from a previous run at startup
    #[serde(default = "default_purge_on_start")]
    pub purge_on_start: bool,
}

impl ScratchConfig {
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: default_scratch_dir(),
            cleanup_delay_secs: default_cleanup_delay_secs(),
            purge_on_start: default_purge_on_start(),
        }
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("video_downloader_temp")
}

fn default_cleanup_delay_secs() -> u64 {
    20
}

fn default_purge_on_start() -> bool {
    true
}

/// Per-client request quotas
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Quota for `POST /download`
    #[serde(default = "default_download_per_minute")]
    pub download_per_minute: u32,
    /// Quota for every other route
    #[serde(default = "default_per_hour")]
    pub default_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            download_per_minute: default_download_per_minute(),
            default_per_hour: default_per_hour(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_download_per_minute() -> u32 {
    5
}

fn default_per_hour() -> u32 {
    20
}

/// yt-dlp invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Sent as the Referer header; an empty string disables it
    #[serde(default = "default_referer", skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default = "default_youtube_player_clients")]
    pub youtube_player_clients: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            merge_output_format: default_merge_output_format(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            youtube_player_clients: default_youtube_player_clients(),
        }
    }
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_referer() -> Option<String> {
    Some("https://www.pinterest.com/".to_string())
}

fn default_youtube_player_clients() -> Vec<String> {
    vec!["tv".to_string(), "web".to_string()]
}
