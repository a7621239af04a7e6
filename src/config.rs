//! # Configuration Management Module
//!
//! Persistent analysis settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Settings
//! - `unknown_device_policy`: `"generic"` keeps raw payloads from device types
//!   without a decoder, `"reject"` stops at the first such record
//! - `min_capture_gap_secs`: Captures closer together than this are ignored
//!   when estimating clock offsets
//! - `log_filter`: Default log filter when `RUST_LOG` isn't set
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/ant-signal/config.toml
//! - Linux: ~/.config/ant-signal/config.toml
//! - Windows: %APPDATA%\ant-signal\config.toml

use crate::clock_offset::{ClockOffsetEstimator, DEFAULT_MIN_CAPTURE_GAP_SECS};
use crate::error::ConfigError;
use crate::log_parser::{LogParser, UnknownDevicePolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub unknown_device_policy: UnknownDevicePolicy,
    pub min_capture_gap_secs: f64,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unknown_device_policy: UnknownDevicePolicy::Generic,
            min_capture_gap_secs: DEFAULT_MIN_CAPTURE_GAP_SECS,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ant-signal")
            .join("config.toml")
    }

    /// Load config from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).map_err(ConfigError::ParseFailed),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(&path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Load config from a specific file, which must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::ReadFailed)?;
        toml::from_str(&contents).map_err(ConfigError::ParseFailed)
    }

    /// Save config to a file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    pub fn log_parser(&self) -> LogParser {
        LogParser::new(self.unknown_device_policy)
    }

    pub fn estimator(&self) -> ClockOffsetEstimator {
        ClockOffsetEstimator::new(self.min_capture_gap_secs)
    }
}
