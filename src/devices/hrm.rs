//! Heart rate monitor broadcasts (ANT+ device type 120)
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 0 | flags / page number |
//! | 1 | page specific, 0 when bytes 2-3 are the previous beat time |
//! | 2-3 | previous beat time, 1/1024 s |
//! | 4-5 | last beat time, 1/1024 s |
//! | 6 | cumulative beat count, wraps at 256 |
//! | 7 | computed heart rate, bpm |

use super::{le_u16, DataPoint, Payload};
use crate::event_timer::{EventTimerSample, EventTimerSpec};
use std::collections::BTreeMap;

pub const BEAT: &str = "beat";

pub const BEAT_TIMER: EventTimerSpec = EventTimerSpec::new("heart beat", 1024.0, 256, 65536);

#[derive(Debug, Clone, PartialEq)]
pub struct HrmData {
    /// Tick time of the beat before last, when the page carries it
    pub raw_prev_beat: Option<u16>,
    pub raw_last_beat: u16,
    pub raw_beat_count: u8,
    pub heart_rate_bpm: u8,
}

impl HrmData {
    /// Wall clock time of the beat before the most recent one
    pub fn previous_beat_realtime(&self, beat: &EventTimerSample) -> Option<f64> {
        let last_realtime = beat.last_event_realtime()?;
        let prev = self.raw_prev_beat?;

        let mut diff_ticks = self.raw_last_beat as i64 - prev as i64;
        if diff_ticks < 0 {
            // Clock wrapped between the two beats
            diff_ticks += BEAT_TIMER.clock_wrap as i64;
        }

        Some(last_realtime - BEAT_TIMER.ticks_to_seconds(diff_ticks as u64))
    }
}

pub(super) fn decode(
    payload: &Payload,
    previous: Option<&DataPoint>,
    event_timers: &mut BTreeMap<&'static str, EventTimerSample>,
) -> HrmData {
    // Bytes 0-3 carry other pages' data unless flag bit 0 is clear and byte 1 is 0
    let raw_prev_beat = if payload[0] & 1 == 0 && payload[1] == 0 {
        Some(le_u16(payload, 2))
    } else {
        None
    };

    let data = HrmData {
        raw_prev_beat,
        raw_last_beat: le_u16(payload, 4),
        raw_beat_count: payload[6],
        heart_rate_bpm: payload[7],
    };

    let previous_beat = previous.and_then(|dp| dp.event_timer(BEAT));
    let beat = EventTimerSample::new(
        BEAT_TIMER,
        data.raw_beat_count as u32,
        data.raw_last_beat as u32,
        previous_beat,
    );
    event_timers.insert(BEAT, beat);

    data
}
