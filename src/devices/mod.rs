//! # ANT+ Device Decoders
//!
//! Turns one broadcast payload into a typed `DataPoint`.
//!
//! ## Key Types
//! - `DataPoint`: One decoded broadcast with its embedded event timers
//! - `DeviceKind`: The fixed set of decoders, looked up by ANT+ device type
//! - `DeviceData`: Decoded fields specific to each device kind
//!
//! ## Registry
//! | Device type | Decoder |
//! |-------------|---------|
//! | 120 | Heart rate monitor |
//! | 121 | Bicycle speed and cadence sensor |
//! | other | Generic (raw payload only), or rejected by policy |
//!
//! Wraparound state flows forward through the `previous` argument: decoding
//! the next broadcast from a device needs the last `DataPoint` decoded for it.

pub mod hrm;
pub mod speed_cadence;

use crate::event_timer::EventTimerSample;
use std::collections::BTreeMap;
use std::fmt;

pub use hrm::HrmData;
pub use speed_cadence::SpeedCadenceData;

/// Broadcast payloads are always 8 bytes
pub const PAYLOAD_LEN: usize = 8;

pub type Payload = [u8; PAYLOAD_LEN];

/// ANT+ device type of a heart rate monitor
pub const DEVICE_TYPE_HRM: u8 = 120;
/// ANT+ device type of a bicycle speed and cadence sensor
pub const DEVICE_TYPE_SPEED_CADENCE: u8 = 121;

/// Read a little-endian 16-bit field starting at `offset`
pub(crate) fn le_u16(payload: &Payload, offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

/// Decoders available for ANT+ device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Generic,
    Hrm,
    SpeedCadence,
}

impl DeviceKind {
    /// Look up the decoder for a device type, `None` if there isn't a specific one
    pub fn for_device_type(device_type: u8) -> Option<DeviceKind> {
        match device_type {
            DEVICE_TYPE_HRM => Some(DeviceKind::Hrm),
            DEVICE_TYPE_SPEED_CADENCE => Some(DeviceKind::SpeedCadence),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Generic => "ANT",
            DeviceKind::Hrm => "HRM",
            DeviceKind::SpeedCadence => "SC",
        }
    }

    /// Decode one broadcast
    ///
    /// `previous` is the last data point decoded from the same device, if any.
    pub fn decode(
        &self,
        timestamp: f64,
        device_spec: &str,
        device_type: u8,
        payload: Payload,
        previous: Option<&DataPoint>,
    ) -> DataPoint {
        let mut event_timers = BTreeMap::new();
        let data = match self {
            DeviceKind::Generic => DeviceData::Generic,
            DeviceKind::Hrm => {
                DeviceData::Hrm(hrm::decode(&payload, previous, &mut event_timers))
            }
            DeviceKind::SpeedCadence => DeviceData::SpeedCadence(speed_cadence::decode(
                &payload,
                previous,
                &mut event_timers,
            )),
        };

        DataPoint {
            timestamp,
            device_spec: device_spec.to_string(),
            device_type,
            raw_payload: payload,
            event_timers,
            data,
        }
    }
}

/// Decoded fields specific to one device kind
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceData {
    Generic,
    Hrm(HrmData),
    SpeedCadence(SpeedCadenceData),
}

/// One decoded broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Capture time, seconds since the epoch
    pub timestamp: f64,
    pub device_spec: String,
    pub device_type: u8,
    pub raw_payload: Payload,
    /// Event timers embedded in the broadcast, by name
    pub event_timers: BTreeMap<&'static str, EventTimerSample>,
    pub data: DeviceData,
}

impl DataPoint {
    pub fn kind(&self) -> DeviceKind {
        match self.data {
            DeviceData::Generic => DeviceKind::Generic,
            DeviceData::Hrm(_) => DeviceKind::Hrm,
            DeviceData::SpeedCadence(_) => DeviceKind::SpeedCadence,
        }
    }

    pub fn event_timer(&self, name: &str) -> Option<&EventTimerSample> {
        self.event_timers.get(name)
    }

    pub fn hrm(&self) -> Option<&HrmData> {
        match &self.data {
            DeviceData::Hrm(hrm) => Some(hrm),
            _ => None,
        }
    }

    pub fn speed_cadence(&self) -> Option<&SpeedCadenceData> {
        match &self.data {
            DeviceData::SpeedCadence(sc) => Some(sc),
            _ => None,
        }
    }

    /// The heart beat timer of an HRM data point
    pub fn beat(&self) -> Option<&EventTimerSample> {
        self.hrm().and(self.event_timer(hrm::BEAT))
    }

    /// Wall clock time of the beat before the most recent one
    ///
    /// Only available for HRM data points whose beat timer has been resolved
    /// and whose broadcast carried the previous beat time.
    pub fn previous_beat_realtime(&self) -> Option<f64> {
        let hrm = self.hrm()?;
        hrm.previous_beat_realtime(self.beat()?)
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.6} {} {:?}",
            self.kind().name(),
            self.timestamp,
            self.device_spec,
            self.raw_payload
        )?;
        if let DeviceData::Hrm(hrm) = &self.data {
            write!(f, " hr={}", hrm.heart_rate_bpm)?;
        }
        for (name, sample) in &self.event_timers {
            write!(f, " {}={{{}}}", name, sample)?;
        }
        if let DeviceData::Hrm(HrmData {
            raw_prev_beat: Some(prev),
            ..
        }) = &self.data
        {
            write!(f, " prevat={}", prev)?;
        }
        Ok(())
    }
}
