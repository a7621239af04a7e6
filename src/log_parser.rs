//! # Log Parser Module
//!
//! Reads the text log written by the capture tool, one broadcast per line:
//!
//! ```text
//! <timestamp> <device-spec> <b0> <b1> <b2> <b3> <b4> <b5> <b6> <b7>
//! 1000.25 120.1 0 0 10 0 20 0 5 70
//! ```
//!
//! Anything else the capture tool wrote (status messages, blank lines) is
//! passed through untouched as `LogRecord::Passthrough`. A line that starts
//! like a record (a timestamp followed by something shaped like a device spec)
//! but doesn't finish like one is a `DecodeError::MalformedRecord`.
//!
//! ## Per-device State
//! The parser keeps the last `DataPoint` decoded for each device spec and
//! hands it to the next decode for that device, which is how wraparound
//! correction carries forward. A failed line never touches this state.

use crate::device_spec::DeviceSpec;
use crate::devices::{DataPoint, DeviceKind, Payload, PAYLOAD_LEN};
use crate::error::DecodeError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// What to do with a record from a device type that has no decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDevicePolicy {
    /// Decode as a generic data point with the raw payload only
    #[default]
    Generic,
    /// Fail with `DecodeError::UnsupportedDeviceType`
    Reject,
}

/// One line of a capture log
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Data(DataPoint),
    Passthrough(String),
}

impl LogRecord {
    pub fn data_point(&self) -> Option<&DataPoint> {
        match self {
            LogRecord::Data(dp) => Some(dp),
            LogRecord::Passthrough(_) => None,
        }
    }
}

// A timestamp then a device-spec-shaped token: anything after is the payload
fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<timestamp>[0-9.]+)\s+(?P<spec>[0-9][0-9.fp]*)(?:\s+(?P<payload>.*))?$")
            .expect("record pattern is valid")
    })
}

pub struct LogParser {
    policy: UnknownDevicePolicy,
    previous: HashMap<String, DataPoint>,
    warned_types: HashSet<u8>,
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new(UnknownDevicePolicy::default())
    }
}

impl LogParser {
    pub fn new(policy: UnknownDevicePolicy) -> Self {
        Self {
            policy,
            previous: HashMap::new(),
            warned_types: HashSet::new(),
        }
    }

    pub fn policy(&self) -> UnknownDevicePolicy {
        self.policy
    }

    /// The last data point decoded for a device spec
    pub fn previous(&self, device_spec: &str) -> Option<&DataPoint> {
        self.previous.get(device_spec)
    }

    /// Parse one log line
    pub fn parse_line(&mut self, line: &str) -> Result<LogRecord, DecodeError> {
        let trimmed = line.trim();
        let hit = match record_pattern().captures(trimmed) {
            Some(hit) => hit,
            None => return Ok(LogRecord::Passthrough(line.to_string())),
        };

        let malformed = |reason: String| DecodeError::MalformedRecord {
            line: trimmed.to_string(),
            reason,
        };

        let timestamp_str = &hit["timestamp"];
        let timestamp: f64 = timestamp_str
            .parse()
            .map_err(|_| malformed(format!("bad timestamp {:?}", timestamp_str)))?;

        let device_spec = &hit["spec"];
        let spec = DeviceSpec::parse(device_spec).map_err(|e| malformed(e.to_string()))?;

        let payload = parse_payload(hit.name("payload").map_or("", |m| m.as_str()))
            .map_err(malformed)?;

        let kind = match DeviceKind::for_device_type(spec.device_type) {
            Some(kind) => kind,
            None => match self.policy {
                UnknownDevicePolicy::Generic => {
                    if self.warned_types.insert(spec.device_type) {
                        log::warn!(
                            "No decoder for device type {}, keeping raw payloads",
                            spec.device_type
                        );
                    }
                    DeviceKind::Generic
                }
                UnknownDevicePolicy::Reject => {
                    return Err(DecodeError::UnsupportedDeviceType {
                        device_type: spec.device_type,
                        device_spec: device_spec.to_string(),
                    });
                }
            },
        };

        let dp = kind.decode(
            timestamp,
            device_spec,
            spec.device_type,
            payload,
            self.previous.get(device_spec),
        );
        log::trace!("{}", dp);

        self.previous.insert(device_spec.to_string(), dp.clone());
        Ok(LogRecord::Data(dp))
    }

    /// Lazily parse a sequence of lines
    pub fn records<I, S>(self, lines: I) -> Records<I::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Records {
            parser: self,
            lines: lines.into_iter(),
        }
    }
}

fn parse_payload(fields: &str) -> Result<Payload, String> {
    let tokens: Vec<&str> = fields.split_whitespace().collect();
    if tokens.len() != PAYLOAD_LEN {
        return Err(format!(
            "expected {} payload bytes, found {}",
            PAYLOAD_LEN,
            tokens.len()
        ));
    }

    let mut payload = [0u8; PAYLOAD_LEN];
    for (byte, token) in payload.iter_mut().zip(tokens) {
        let not_a_byte = || format!("payload byte {:?} is not an integer 0-255", token);
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(not_a_byte());
        }
        *byte = token.parse().map_err(|_| not_a_byte())?;
    }
    Ok(payload)
}

/// Iterator of parsed records, see `LogParser::records`
pub struct Records<I> {
    parser: LogParser,
    lines: I,
}

impl<I> Records<I> {
    pub fn parser(&self) -> &LogParser {
        &self.parser
    }
}

impl<I, S> Iterator for Records<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Result<LogRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        Some(self.parser.parse_line(line.as_ref()))
    }
}
