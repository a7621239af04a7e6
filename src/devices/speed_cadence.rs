//! Bicycle speed and cadence sensor broadcasts (ANT+ device type 121)
//!
//! The payload is four little-endian 16-bit fields: crank revolution count,
//! crank event time, wheel revolution count, wheel event time. All four wrap
//! at 65536, so both timers use a 16-bit count.

use super::{le_u16, DataPoint, Payload};
use crate::event_timer::{EventTimerSample, EventTimerSpec};
use std::collections::BTreeMap;

pub const CRANK: &str = "crank";
pub const WHEEL: &str = "wheel";

pub const CRANK_TIMER: EventTimerSpec =
    EventTimerSpec::new("crank magnet at sensor", 1024.0, 65536, 65536);
pub const WHEEL_TIMER: EventTimerSpec =
    EventTimerSpec::new("wheel magnet at sensor", 1024.0, 65536, 65536);

#[derive(Debug, Clone, PartialEq)]
pub struct SpeedCadenceData {
    pub raw_crank_revolutions: u16,
    pub raw_crank_event_ticks: u16,
    pub raw_wheel_revolutions: u16,
    pub raw_wheel_event_ticks: u16,
}

pub(super) fn decode(
    payload: &Payload,
    previous: Option<&DataPoint>,
    event_timers: &mut BTreeMap<&'static str, EventTimerSample>,
) -> SpeedCadenceData {
    let data = SpeedCadenceData {
        raw_crank_revolutions: le_u16(payload, 0),
        raw_crank_event_ticks: le_u16(payload, 2),
        raw_wheel_revolutions: le_u16(payload, 4),
        raw_wheel_event_ticks: le_u16(payload, 6),
    };

    let timers = [
        (CRANK, CRANK_TIMER, data.raw_crank_revolutions, data.raw_crank_event_ticks),
        (WHEEL, WHEEL_TIMER, data.raw_wheel_revolutions, data.raw_wheel_event_ticks),
    ];
    for (name, spec, count, ticks) in timers {
        let previous_sample = previous.and_then(|dp| dp.event_timer(name));
        let sample = EventTimerSample::new(spec, count as u32, ticks as u32, previous_sample);
        event_timers.insert(name, sample);
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{DeviceKind, DEVICE_TYPE_SPEED_CADENCE};

    fn decode(payload: [u8; 8], previous: Option<&DataPoint>) -> DataPoint {
        DeviceKind::SpeedCadence.decode(50.0, "121.7", DEVICE_TYPE_SPEED_CADENCE, payload, previous)
    }

    #[test]
    fn test_decode_fields() {
        let dp = decode([0x10, 0x00, 0x00, 0x04, 0x20, 0x01, 0x00, 0x08], None);
        let sc = dp.speed_cadence().unwrap();
        assert_eq!(sc.raw_crank_revolutions, 16);
        assert_eq!(sc.raw_crank_event_ticks, 1024);
        assert_eq!(sc.raw_wheel_revolutions, 288);
        assert_eq!(sc.raw_wheel_event_ticks, 2048);

        let crank = dp.event_timer(CRANK).unwrap();
        assert_eq!(crank.count, 16);
        assert_eq!(crank.last_event_seconds, 1.0);
        let wheel = dp.event_timer(WHEEL).unwrap();
        assert_eq!(wheel.count, 288);
        assert_eq!(wheel.last_event_seconds, 2.0);
    }

    #[test]
    fn test_timers_wrap_independently() {
        // crank count wraps, wheel count doesn't; wheel clock wraps, crank clock doesn't
        let first = decode([0xff, 0xff, 0x00, 0x10, 0x05, 0x00, 0xf0, 0xff], None);
        let second = decode([0x01, 0x00, 0x00, 0x14, 0x09, 0x00, 0x10, 0x00], Some(&first));

        let crank = second.event_timer(CRANK).unwrap();
        assert_eq!(crank.count, 65537);
        assert_eq!(crank.last_event_ticks, 0x1400);

        let wheel = second.event_timer(WHEEL).unwrap();
        assert_eq!(wheel.count, 9);
        assert_eq!(wheel.last_event_ticks, 65536 + 0x10);
    }

    #[test]
    fn test_sixteen_bit_count_does_not_wrap_at_256() {
        let first = decode([0xff, 0x00, 0, 0, 0, 0, 0, 0], None);
        let second = decode([0x00, 0x01, 0, 0, 0, 0, 0, 0], Some(&first));
        assert_eq!(second.event_timer(CRANK).unwrap().count, 256);
    }
}
