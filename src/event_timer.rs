//! # Event Timer Module
//!
//! Some ANT+ devices embed event data in their periodic broadcasts: individual
//! heart beats for a heart rate monitor, or a magnet passing the sensor for a
//! speed/cadence sensor. The device reports the cumulative number of events and
//! the device clock tick (usually 1024 per second) at which the most recent
//! event happened. Both fields are narrow and wrap often.
//!
//! ## Key Types
//! - `EventTimerSpec`: Constants describing one kind of counter
//! - `EventTimerSample`: One observation, corrected for wraparound
//!
//! ## Sampling Density
//! Correction assumes at most one wrap of each field between consecutive
//! samples. An 8-bit beat count wraps after 256 beats and a 16-bit tick clock
//! after 64 seconds, so a gap in capture longer than that silently loses a wrap.
//! This can't be detected from the samples themselves.

use std::fmt;

/// Specifies the behaviour of one ANT+ event timer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventTimerSpec {
    pub event_description: &'static str,
    pub ticks_per_second: f64,
    pub event_count_wrap: u64,
    pub clock_wrap: u64,
}

impl EventTimerSpec {
    pub const fn new(
        event_description: &'static str,
        ticks_per_second: f64,
        event_count_wrap: u64,
        clock_wrap: u64,
    ) -> Self {
        Self {
            event_description,
            ticks_per_second,
            event_count_wrap,
            clock_wrap,
        }
    }

    /// Convert a tick count on this timer's clock to seconds
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 / self.ticks_per_second
    }
}

/// A single event timer observation
///
/// Holds the raw fields as broadcast plus absolute values reconstructed from
/// the previous sample of the same counter.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTimerSample {
    spec: EventTimerSpec,
    pub raw_count: u32,
    pub raw_last_event_ticks: u32,
    pub count: u64,
    pub last_event_ticks: u64,
    pub last_event_seconds: f64,
    last_event_realtime: Option<f64>,
    count_wraps: u64,
    clock_wraps: u64,
}

impl EventTimerSample {
    /// Build a sample, correcting for wraps since `previous`
    ///
    /// `previous` must be the immediately preceding sample of the same counter.
    pub fn new(
        spec: EventTimerSpec,
        raw_count: u32,
        raw_last_event_ticks: u32,
        previous: Option<&EventTimerSample>,
    ) -> Self {
        let (count_wraps, clock_wraps) = match previous {
            None => (0, 0),
            Some(prev) => {
                let mut count_wraps = prev.count_wraps;
                if raw_count < prev.raw_count {
                    count_wraps += 1;
                }
                let mut clock_wraps = prev.clock_wraps;
                if raw_last_event_ticks < prev.raw_last_event_ticks {
                    clock_wraps += 1;
                }
                (count_wraps, clock_wraps)
            }
        };

        let count = raw_count as u64 + spec.event_count_wrap * count_wraps;
        let last_event_ticks = raw_last_event_ticks as u64 + spec.clock_wrap * clock_wraps;

        Self {
            spec,
            raw_count,
            raw_last_event_ticks,
            count,
            last_event_ticks,
            last_event_seconds: spec.ticks_to_seconds(last_event_ticks),
            last_event_realtime: None,
            count_wraps,
            clock_wraps,
        }
    }

    pub fn spec(&self) -> &EventTimerSpec {
        &self.spec
    }

    /// Wall clock time of the most recent event, once resolved
    pub fn last_event_realtime(&self) -> Option<f64> {
        self.last_event_realtime
    }

    /// Fix the wall clock time of the most recent event from a clock offset
    pub fn set_realtime(&mut self, clock_offset: f64) {
        self.last_event_realtime = Some(self.last_event_seconds + clock_offset);
    }

    /// The clock offset this sample was resolved with, if any
    pub fn clock_offset(&self) -> Option<f64> {
        self.last_event_realtime
            .map(|realtime| realtime - self.last_event_seconds)
    }
}

impl fmt::Display for EventTimerSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count=({},{}) last=({},{}",
            self.count_wraps, self.raw_count, self.clock_wraps, self.raw_last_event_ticks
        )?;
        if let Some(realtime) = self.last_event_realtime {
            write!(f, ",{:.6}", realtime)?;
        }
        write!(f, ")")
    }
}
