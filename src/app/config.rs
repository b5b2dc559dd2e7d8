//! Application configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search pattern limits
    pub pattern: PatternConfig,

    /// Bulk scan settings
    pub scan: ScanConfig,

    /// Captured traffic filtering
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Wall-clock budget per search in seconds
    pub timeout_secs: u64,

    /// Maximum match positions returned per search
    pub max_matches: usize,

    /// Maximum pattern length in characters
    pub max_pattern_len: usize,

    /// Maximum quantifier characters in a pattern
    pub max_quantifiers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Thread setting. Only scales the inter-item delay; dispatch is sequential.
    pub threads: usize,

    /// Explicit delay between items in milliseconds, overriding `threads`
    pub delay_ms: Option<u64>,

    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Follow redirects
    pub follow_redirects: bool,

    /// Accept invalid TLS certificates (intercepting proxies, lab targets)
    pub accept_invalid_certs: bool,

    /// Response body size limit in bytes
    pub max_response_size: usize,

    /// User agent string
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Content-type fragments that qualify a captured body for mining
    pub content_types: Vec<String>,

    /// Bodies larger than this are skipped (bytes)
    pub max_body_size: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_matches: 10_000,
            max_pattern_len: 1000,
            max_quantifiers: 10,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            delay_ms: None,
            request_timeout: 30,
            follow_redirects: true,
            accept_invalid_certs: false,
            max_response_size: 10 * 1024 * 1024, // 10MB
            user_agent: format!("auraprobe/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            content_types: vec![
                "javascript".to_string(),
                "json".to_string(),
                "html".to_string(),
            ],
            max_body_size: 20 * 1024 * 1024, // 20MB
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::ReadError {
                path: config_path.display().to_string(),
                source,
            })?;

            let config = Self::from_toml(&contents)?;
            tracing::info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        } else if path.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        } else {
            tracing::debug!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&config_path, self.to_toml()?)?;

        tracing::info!("Saved configuration to {:?}", config_path);
        Ok(())
    }

    /// Reject values the scan core cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| ConfigError::ValidationError {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.pattern.timeout_secs == 0 {
            return Err(invalid("pattern.timeout_secs", "must be greater than 0"));
        }
        if self.pattern.timeout_secs > 300 {
            return Err(invalid("pattern.timeout_secs", "must be at most 300"));
        }
        if self.pattern.max_matches == 0 {
            return Err(invalid("pattern.max_matches", "must be greater than 0"));
        }
        if self.pattern.max_pattern_len == 0 {
            return Err(invalid("pattern.max_pattern_len", "must be greater than 0"));
        }
        if self.scan.threads == 0 {
            return Err(invalid("scan.threads", "must be greater than 0"));
        }
        if self.scan.request_timeout == 0 {
            return Err(invalid("scan.request_timeout", "must be greater than 0"));
        }
        if self.scan.user_agent.trim().is_empty() {
            return Err(invalid("scan.user_agent", "must not be empty"));
        }
        if self.capture.content_types.iter().any(|t| t.trim().is_empty()) {
            return Err(invalid("capture.content_types", "entries must not be empty"));
        }

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "auraprobe", "auraprobe")
            .context("Failed to determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "auraprobe", "auraprobe")
            .context("Failed to determine data directory")?;

        Ok(dirs.data_dir().to_path_buf())
    }
}
