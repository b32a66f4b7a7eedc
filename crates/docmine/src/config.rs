//! Crate configuration.
//!
//! Loaded from a JSON file with serde defaults, then overlaid with
//! environment variables for the cloud OCR credentials. The OCR endpoint
//! and key are the only secrets this core consumes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunker::ChunkerConfig;
use crate::error::ConfigError;

/// Environment variable overriding the OCR service endpoint.
pub const ENV_OCR_ENDPOINT: &str = "DOCMINE_OCR_ENDPOINT";

/// Environment variable overriding the OCR service API key.
pub const ENV_OCR_KEY: &str = "DOCMINE_OCR_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ocr: OcrServiceConfig,
    #[serde(default)]
    pub chunking: ChunkerConfig,
}

/// Connection settings for the cloud document-intelligence service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrServiceConfig {
    /// Service base URL, e.g. `https://<resource>.cognitiveservices.azure.com`.
    pub endpoint: Option<String>,
    /// API key sent in the subscription-key header.
    pub api_key: Option<String>,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Seconds between long-poll attempts.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Poll attempts before giving up on the remote operation.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model_id() -> String {
    "prebuilt-layout".to_string()
}

fn default_api_version() -> String {
    "2024-11-30".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_poll_max_attempts() -> u32 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model_id: default_model_id(),
            api_version: default_api_version(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_max_attempts: default_poll_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl OcrServiceConfig {
    /// Applies `DOCMINE_OCR_ENDPOINT` / `DOCMINE_OCR_KEY` over the file values.
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENV_OCR_ENDPOINT) {
            if !endpoint.is_empty() {
                self.endpoint = Some(endpoint);
            }
        }
        if let Ok(key) = std::env::var(ENV_OCR_KEY) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
    }
}

/// Loads config from a JSON file and overlays environment variables.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config: Config = serde_json::from_str(&content)?;
    config.ocr.apply_env();
    Ok(config)
}

/// Builds a config purely from defaults and environment variables.
pub fn config_from_env() -> Config {
    let mut config = Config::default();
    config.ocr.apply_env();
    config
}
