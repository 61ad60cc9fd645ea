//! Configuration management for the patch pipeline
//!
//! This module handles all configuration settings for both halves of the
//! system: the producer session and the consumer receive loop.

use crate::constants::{
    CONNECT_TIMEOUT_MS, DEFAULT_SOURCE_EXTENSIONS, MAX_PATCH_FRAME_BYTES, READ_RETRY_ATTEMPTS,
    READ_RETRY_DELAY_MS,
};
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Project under edit
    pub project: ProjectConfig,

    /// Shared channel to the target process
    pub channel: ChannelConfig,

    /// Producer-side patch production
    pub producer: ProducerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root directory of the project under edit
    pub root: PathBuf,
}

/// Channel configuration
///
/// The channel itself is opened by an external collaborator; these settings
/// only describe the endpoint and the bounds both halves agree on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the shared channel (ws:// or wss://)
    pub endpoint: String,

    /// Connection timeout for the consumer's initial connect, in milliseconds
    pub connect_timeout_ms: u64,

    /// Maximum inbound frame size in bytes
    pub max_frame_bytes: usize,
}

/// Producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Maximum attempts when reading a changed file
    pub read_retry_attempts: u32,

    /// Fixed delay between read attempts, in milliseconds
    pub read_retry_delay_ms: u64,

    /// Source file extensions that participate in patch attempts
    pub source_extensions: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8123".to_string(),
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            max_frame_bytes: MAX_PATCH_FRAME_BYTES,
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            read_retry_attempts: READ_RETRY_ATTEMPTS,
            read_retry_delay_ms: READ_RETRY_DELAY_MS,
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and config file
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file first
        if let Ok(file_config) = Self::from_file("hotpatch.toml") {
            config = file_config;
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(endpoint) = env::var("HOTPATCH_CHANNEL_ENDPOINT") {
            self.channel.endpoint = endpoint;
        }

        if let Ok(max_frame) = env::var("HOTPATCH_MAX_FRAME_BYTES") {
            self.channel.max_frame_bytes = max_frame
                .parse()
                .map_err(|e| Error::config(format!("Invalid max frame bytes: {}", e)))?;
        }

        if let Ok(root) = env::var("HOTPATCH_PROJECT_ROOT") {
            self.project.root = PathBuf::from(root);
        }

        if let Ok(attempts) = env::var("HOTPATCH_READ_RETRY_ATTEMPTS") {
            self.producer.read_retry_attempts = attempts
                .parse()
                .map_err(|e| Error::config(format!("Invalid read retry attempts: {}", e)))?;
        }

        if let Ok(level) = env::var("HOTPATCH_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("HOTPATCH_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.channel.endpoint.starts_with("ws://")
            && !self.channel.endpoint.starts_with("wss://")
        {
            return Err(Error::config("Channel endpoint must be ws:// or wss://"));
        }

        if self.channel.max_frame_bytes < 1024 {
            return Err(Error::config("Max frame size too small (minimum 1KB)"));
        }

        if self.producer.read_retry_attempts == 0 {
            return Err(Error::config("Read retry attempts must be at least 1"));
        }

        if self.producer.source_extensions.is_empty() {
            return Err(Error::config("At least one source extension is required"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        Ok(())
    }
}
