//! # Error Types Module
//!
//! Centralized error handling for the ant-signal crate.
//! Provides one error type per concern with proper context and error chaining.
//!
//! ## Error Types
//! - `DecodeError`: Log records that look like data but cannot be decoded
//! - `AnalysisError`: A capture log that cannot be read or decoded to the end
//! - `DeviceSpecError`: Device spec strings that don't follow `TYPE[.UID][pPERIOD][fFREQ]`
//! - `ConfigError`: Configuration file I/O and parsing errors
//! - `InsufficientData`: An estimate that could not be made from the data available
//!
//! ## Insufficient Data Is Not A Failure
//! Clock offset estimation and HRV both return `Result<f64, InsufficientData>`.
//! Callers processing partial logs are expected to check and carry on.

use std::fmt;

/// Errors raised while turning a log line into a `DataPoint`
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Line has the shape of a record but the fields are wrong
    MalformedRecord { line: String, reason: String },
    /// Device type has no decoder and the policy is to reject
    UnsupportedDeviceType { device_type: u8, device_spec: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedRecord { line, reason } => {
                write!(f, "Malformed record {:?}: {}", line, reason)
            }
            DecodeError::UnsupportedDeviceType { device_type, device_spec } => {
                write!(
                    f,
                    "Unsupported ANT+ device type {} (device spec {})",
                    device_type, device_spec
                )
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors that stop the analysis of a capture log
#[derive(Debug)]
pub enum AnalysisError {
    /// Failed to read a line of the log, e.g. invalid UTF-8
    ReadFailed { line: usize, source: std::io::Error },
    /// A record could not be decoded
    Decode(DecodeError),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::ReadFailed { line, source } => {
                write!(f, "Failed to read line {}: {}", line, source)
            }
            AnalysisError::Decode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::ReadFailed { source, .. } => Some(source),
            AnalysisError::Decode(e) => Some(e),
        }
    }
}

impl From<DecodeError> for AnalysisError {
    fn from(e: DecodeError) -> Self {
        AnalysisError::Decode(e)
    }
}

/// Errors that can occur parsing a device spec
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSpecError {
    /// String does not match `TYPE[.UID][pPERIOD][fFREQUENCY]`
    Malformed(String),
    /// A component is syntactically valid but out of range
    OutOfRange { spec: String, field: &'static str },
}

impl fmt::Display for DeviceSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpecError::Malformed(spec) => {
                write!(f, "Malformed ANT+ device spec: {:?}", spec)
            }
            DeviceSpecError::OutOfRange { spec, field } => {
                write!(f, "Device spec {:?} has out of range {}", spec, field)
            }
        }
    }
}

impl std::error::Error for DeviceSpecError {}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// An estimate that cannot be computed from the data supplied
#[derive(Debug, Clone, PartialEq)]
pub struct InsufficientData {
    /// What was being estimated, e.g. "clock offset"
    pub estimate: &'static str,
    /// How many usable items were required
    pub required: usize,
    /// How many usable items were found
    pub found: usize,
}

impl InsufficientData {
    pub fn new(estimate: &'static str, required: usize, found: usize) -> Self {
        Self {
            estimate,
            required,
            found,
        }
    }
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Insufficient data for {}: need {}, have {}",
            self.estimate, self.required, self.found
        )
    }
}

impl std::error::Error for InsufficientData {}
