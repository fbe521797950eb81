//! Configuration management for vidgate
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `VIDGATE__<section>__<key>` environment variables
//! 4. Plain deployment variables: `PORT`, `MAX_CONCURRENT_DOWNLOADS`,
//!    `MAX_FILE_SIZE_MB`, `MAX_DURATION_SECONDS`
//!
//! # Usage
//!
//! ```no_run
//! use vidgate::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Listening on: {}", config.server.bind_addr());
//! ```
//!
//! The configuration file defaults to `config/vidgate.toml` and can be
//! pointed elsewhere with the `VIDGATE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, ExtractorConfig, LimitsConfig, RateLimitConfig, ScratchConfig, ServerConfig,
};
pub use sources::apply_deployment_overrides;
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed, an override cannot be
    /// parsed, or the merged result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Like [`Config::load`], reading the TOML layer from `path`
    pub fn load_with_file(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load(Some(path))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Plain deployment variables are not consulted here, which keeps tests
    /// independent of the process environment.
    #[cfg(test)]
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
