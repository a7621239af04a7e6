//! # Device Spec Module
//!
//! A device spec names which ANT+ device(s) a capture channel listens to:
//!
//! ```text
//! TYPE[.UID][pPERIOD][fFREQUENCY]
//! ```
//!
//! - `TYPE`: ANT+ device type, e.g. 120 for a heart rate monitor, 0 for any
//! - `UID`: device number, 0 (the default) matches any device of that type
//! - `PERIOD`: channel period, 32768 / broadcasts per second
//! - `FREQUENCY`: RF channel offset from 2400 MHz, default 57
//!
//! Log records carry the spec string verbatim. Only the leading type picks a
//! decoder; the whole string identifies the device.

use crate::devices::{DEVICE_TYPE_HRM, DEVICE_TYPE_SPEED_CADENCE};
use crate::error::DeviceSpecError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Default RF channel for ANT+ devices
pub const DEFAULT_FREQUENCY: u8 = 57;

// Each device type broadcasts at a slightly different rate, around 4 Hz
const HRM_PERIOD: u16 = 8070;
const SPEED_CADENCE_PERIOD: u16 = 8085;

fn spec_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<type>\d+)(?:\.(?P<uid>\d+))?(?:p(?P<period>\d+))?(?:f(?P<freq>\d+))?$")
            .expect("device spec pattern is valid")
    })
}

/// Default channel period for a device type
pub fn default_period(device_type: u8) -> u16 {
    match device_type {
        DEVICE_TYPE_HRM => HRM_PERIOD,
        DEVICE_TYPE_SPEED_CADENCE => SPEED_CADENCE_PERIOD,
        _ => HRM_PERIOD,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceSpec {
    pub device_type: u8,
    pub device_number: u16,
    pub period: u16,
    pub frequency: u8,
}

impl DeviceSpec {
    pub fn parse(spec: &str) -> Result<Self, DeviceSpecError> {
        let hit = spec_pattern()
            .captures(spec)
            .ok_or_else(|| DeviceSpecError::Malformed(spec.to_string()))?;

        fn field<T: FromStr>(
            spec: &str,
            value: Option<regex::Match<'_>>,
            name: &'static str,
        ) -> Result<Option<T>, DeviceSpecError> {
            value
                .map(|m| {
                    m.as_str().parse::<T>().map_err(|_| DeviceSpecError::OutOfRange {
                        spec: spec.to_string(),
                        field: name,
                    })
                })
                .transpose()
        }

        let device_type: u8 = field(spec, hit.name("type"), "device type")?
            .ok_or_else(|| DeviceSpecError::Malformed(spec.to_string()))?;
        let device_number = field(spec, hit.name("uid"), "device number")?.unwrap_or(0);
        let period = field(spec, hit.name("period"), "period")?
            .unwrap_or_else(|| default_period(device_type));
        let frequency = field(spec, hit.name("freq"), "frequency")?.unwrap_or(DEFAULT_FREQUENCY);

        Ok(Self {
            device_type,
            device_number,
            period,
            frequency,
        })
    }

    /// Wildcard type or device number
    pub fn is_wildcard(&self) -> bool {
        self.device_type == 0 || self.device_number == 0
    }

    /// Nominal broadcasts per second implied by the channel period
    pub fn messages_per_second(&self) -> f64 {
        32768.0 / self.period as f64
    }
}

impl FromStr for DeviceSpec {
    type Err = DeviceSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}p{}f{}",
            self.device_type, self.device_number, self.period, self.frequency
        )
    }
}
