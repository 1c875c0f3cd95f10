use likeness_core::DEFAULT_MAX_FILE_BYTES;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/classify_image";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid endpoint URL {0}")]
    Endpoint(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Client configuration, loaded from environment variables or a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Classification endpoint (`POST`, form field `image_data`).
    pub endpoint: String,
    /// Service health endpoint (`GET`). Defaults to `/health` on the endpoint's host.
    pub health_endpoint: Option<String>,
    /// Timeout in seconds for one classification request.
    pub timeout_secs: u64,
    /// Largest image accepted for upload, in bytes.
    pub max_file_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            health_endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from `LIKENESS_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("LIKENESS_ENDPOINT").unwrap_or(defaults.endpoint),
            health_endpoint: std::env::var("LIKENESS_HEALTH_ENDPOINT").ok(),
            timeout_secs: env_u64("LIKENESS_TIMEOUT_SECS", defaults.timeout_secs),
            max_file_bytes: env_usize("LIKENESS_MAX_FILE_BYTES", defaults.max_file_bytes),
        }
    }

    /// Parse configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Resolved health endpoint.
    pub fn health_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.health_endpoint {
            return Ok(url.clone());
        }
        let endpoint = reqwest::Url::parse(&self.endpoint)
            .map_err(|_| ConfigError::Endpoint(self.endpoint.clone()))?;
        let health = endpoint
            .join("/health")
            .map_err(|_| ConfigError::Endpoint(self.endpoint.clone()))?;
        Ok(health.to_string())
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
