mod defaults;
mod env;
pub mod types;
mod validation;

use std::path::Path;

pub use defaults::{
    DEFAULT_CRAWLER_PROCESSES, DEFAULT_DRAIN_INITIAL_WAIT, DEFAULT_DRAIN_POLL_INTERVAL,
    DEFAULT_REQUEST_POLL_INTERVAL, MAX_PROCESS_NAME_LEN,
};
pub use env::interpolate_env;
pub use types::*;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("Crawler process names must not be empty")]
    EmptyCrawlerName,

    #[error("Crawler process '{0}' is listed more than once")]
    DuplicateCrawler(String),

    #[error("Crawler process name '{0}' is longer than {1} bytes and can never match")]
    CrawlerNameTooLong(String, usize),

    #[error("Invalid duration for '{0}': {1}")]
    InvalidDuration(String, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ArbiterConfig {
    /// Parse a configuration from a YAML string.
    /// Environment variables in the format `${VAR_NAME}` will be interpolated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;

        // An empty document means "all defaults".
        if interpolated.trim().is_empty() {
            return Ok(ArbiterConfig::default());
        }

        let config: ArbiterConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load, normalize, and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?.effective();
        config.validate_or_err()?;
        Ok(config)
    }
}
