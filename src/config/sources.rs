use super::models::Config;
use crate::humanize::ByteSize;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const CONFIG_ENV_VAR: &str = "VIDGATE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/vidgate.toml";
const ENV_PREFIX: &str = "VIDGATE";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. `VIDGATE__*` environment variables
/// 5. Plain deployment variables (`PORT`, `MAX_CONCURRENT_DOWNLOADS`, ...)
///
/// An explicit `config_path` takes precedence over `VIDGATE_CONFIG`.
pub fn load(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = config_path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    apply_deployment_overrides(&mut config, |key| env::var(key).ok())?;

    Ok(config)
}

/// Apply the flat variables a PaaS-style deployment sets
///
/// These win over everything else so a bare `PORT=8000` behaves as expected.
pub fn apply_deployment_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = parse_var(&lookup, "PORT")? {
        config.server.port = port;
    }
    if let Some(max) = parse_var(&lookup, "MAX_CONCURRENT_DOWNLOADS")? {
        config.limits.max_concurrent_downloads = max;
    }
    if let Some(mb) = parse_var::<u64, _>(&lookup, "MAX_FILE_SIZE_MB")? {
        config.limits.max_file_size = ByteSize::from_megabytes(mb);
    }
    if let Some(secs) = parse_var(&lookup, "MAX_DURATION_SECONDS")? {
        config.limits.max_duration_seconds = secs;
    }
    Ok(())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Message(format!("{key}={raw:?}: {e}"))),
        _ => Ok(None),
    }
}

/// Load configuration from a specific path and the prefixed environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // VIDGATE__LIMITS__MAX_CONCURRENT_DOWNLOADS -> limits.max_concurrent_downloads
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .list_separator(",")
            .with_list_parse_key("extractor.youtube_player_clients")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.limits.max_concurrent_downloads, 2);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 9000

[limits]
max_concurrent_downloads = 4
max_file_size = "1GB"
max_duration_seconds = 3600

[scratch]
dir = "/var/tmp/vidgate"
cleanup_delay_secs = 60

[rate_limit]
enabled = false

[extractor]
binary = "/usr/local/bin/yt-dlp"
youtube_player_clients = ["web"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.limits.max_concurrent_downloads, 4);
        assert_eq!(config.limits.max_file_size.as_u64(), 1024 * 1024 * 1024);
        assert_eq!(config.limits.max_duration_seconds, 3600);
        assert_eq!(config.scratch.dir, PathBuf::from("/var/tmp/vidgate"));
        assert_eq!(config.scratch.cleanup_delay_secs, 60);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.extractor.binary, "/usr/local/bin/yt-dlp");
        assert_eq!(config.extractor.youtube_player_clients, vec!["web"]);
    }

    #[test]
    fn test_deployment_overrides() {
        let mut config = Config::default();
        let lookup = lookup_from(&[
            ("PORT", "8123"),
            ("MAX_CONCURRENT_DOWNLOADS", "5"),
            ("MAX_FILE_SIZE_MB", "50"),
            ("MAX_DURATION_SECONDS", " 120 "),
        ]);

        apply_deployment_overrides(&mut config, lookup).unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.limits.max_concurrent_downloads, 5);
        assert_eq!(config.limits.max_file_size, ByteSize::from_megabytes(50));
        assert_eq!(config.limits.max_duration_seconds, 120);
    }

    #[test]
    fn test_deployment_overrides_ignore_blank_values() {
        let mut config = Config::default();
        apply_deployment_overrides(&mut config, lookup_from(&[("PORT", "")])).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_deployment_overrides_reject_garbage() {
        let mut config = Config::default();
        let result =
            apply_deployment_overrides(&mut config, lookup_from(&[("PORT", "eighty")]));

        let err = result.unwrap_err().to_string();
        assert!(err.contains("PORT"));
    }
}
