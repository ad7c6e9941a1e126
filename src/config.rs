//! Server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::extractor::RetryConfig;

/// Extraction collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Path or name of the yt-dlp executable
    pub binary: String,

    /// Retries for metadata lookups
    pub max_retries: u32,

    /// First backoff step in milliseconds
    pub backoff_inc_ms: u64,

    /// Backoff ceiling in milliseconds
    pub backoff_max_ms: u64,

    /// Extra arguments passed to every yt-dlp invocation (cookies, proxy, ...)
    pub extra_args: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            max_retries: 3,
            backoff_inc_ms: 100,
            backoff_max_ms: 1000,
            extra_args: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    /// Retry policy for `/info` metadata lookups
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff_inc: Duration::from_millis(self.backoff_inc_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// Download naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Product tag prepended to every attachment filename
    pub filename_prefix: String,

    /// Maximum length of the sanitized title part of the filename
    pub max_title_len: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            filename_prefix: "JoyStream".to_string(),
            max_title_len: 50,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Extraction collaborator configuration
    pub extractor: ExtractorConfig,

    /// Download naming configuration
    pub download: DownloadConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            extractor: ExtractorConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Apply `PORT`, `HOST` and `YTDLP_PATH` from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value {:?}", port),
            }
        }
        if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
            self.host = host;
        }
        if let Some(binary) = lookup("YTDLP_PATH").filter(|b| !b.is_empty()) {
            self.extractor.binary = binary;
        }
        self
    }
}
