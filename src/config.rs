// src/config.rs - Logbook configuration
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration for the logbook service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub web: WebConfig,
}

/// External printer-controller (Moonraker-style) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Seconds between status polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request timeout for status queries.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Where uploaded G-code files land on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_web_port")]
    pub port: u16,
}

// Default value functions
fn default_base_url() -> String { "http://192.168.1.10:7125".to_string() }
fn default_poll_interval_secs() -> u64 { 15 }
fn default_request_timeout_secs() -> u64 { 5 }
fn default_upload_dir() -> PathBuf { PathBuf::from("uploads") }
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_web_port() -> u16 { 3000 }

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { upload_dir: default_upload_dir() }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_web_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            storage: StorageConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let config = Self::load(path)?;
            tracing::info!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            tracing::info!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.base_url.is_empty() {
            return Err(ConfigError::Invalid("controller base_url must be set".into()));
        }
        if !self.controller.base_url.starts_with("http://")
            && !self.controller.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(
                "controller base_url must be an http(s) URL".into(),
            ));
        }
        if self.controller.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be positive".into()));
        }
        if self.controller.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.web.bind_address.is_empty() {
            return Err(ConfigError::Invalid("web bind_address must be set".into()));
        }
        Ok(())
    }
}
