//! Configuration management for sedbot.
//!
//! The configuration lives at `~/.sedbot/config.json`. Every field has a
//! default, so a missing file is not an error.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (SEDBOT_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SEDBOT_LOG_LEVEL` → observability.log_level
//! - `SEDBOT_LOG_FORMAT` → observability.log_format
//! - `SEDBOT_HISTORY_SIZE` → sed.history_size
//! - `SEDBOT_REPLY_ON_ERROR` → sed.reply_on_error

use crate::error::{Error, Result, ResultExt};
use crate::validation::Validate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Number of recent messages remembered per conversation.
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".sedbot"),
        |dirs| dirs.home_dir().join(".sedbot"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Substitution behaviour
    #[serde(default)]
    pub sed: SedConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Substitution command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SedConfig {
    /// Ring size of recent messages kept per conversation
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Also look for `sed s/../../` embedded anywhere in a message
    #[serde(default = "default_true")]
    pub long_form: bool,

    /// Reply with the regex compiler error when a pattern is malformed
    #[serde(default = "default_true")]
    pub reply_on_error: bool,
}

impl Default for SedConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            long_form: true,
            reply_on_error: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration, apply environment overrides, then validate.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SEDBOT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("SEDBOT_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(size) = std::env::var("SEDBOT_HISTORY_SIZE") {
            match size.parse() {
                Ok(n) => self.sed.history_size = n,
                Err(_) => tracing::warn!(value = %size, "Ignoring invalid SEDBOT_HISTORY_SIZE"),
            }
        }
        if let Ok(flag) = std::env::var("SEDBOT_REPLY_ON_ERROR") {
            match parse_bool(&flag) {
                Some(b) => self.sed.reply_on_error = b,
                None => tracing::warn!(value = %flag, "Ignoring invalid SEDBOT_REPLY_ON_ERROR"),
            }
        }
    }

    /// Save configuration to the given path as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(Error::from)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_history_size() -> usize {
    DEFAULT_HISTORY_SIZE
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}
