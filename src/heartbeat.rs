//! # Heart Beat Timings Module
//!
//! Derives the wall clock time of individual heart beats from a run of HRM
//! data points and computes heart rate statistics over them.
//!
//! ## Key Types
//! - `BeatSample`: Wall clock time of one beat and the cumulative beat count
//! - `HeartBeatTimings`: Beat samples sorted by time, built from data points
//! - `BeatSliceExt`: Statistics over any time-sorted slice of beat samples
//!
//! ## Gaps
//! Each broadcast reports the last beat, and usually the one before it. When
//! more than one beat happened between two received broadcasts, only the last
//! two of them can be placed in time; the count still advances by the full
//! number, so the earlier beats in the gap stay unknown.
//!
//! ## Data Flow
//! ```text
//! HRM DataPoints (beat timer resolved) → HeartBeatTimings → timeslice → HR / HRV
//! ```

use crate::devices::DataPoint;
use crate::error::InsufficientData;

/// One heart beat on the wall clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatSample {
    /// Seconds since the epoch
    pub time: f64,
    /// Cumulative beat count at this beat
    pub count: u64,
}

impl BeatSample {
    pub fn new(time: f64, count: u64) -> Self {
        Self { time, count }
    }
}

pub trait BeatSliceExt {
    /// Index of the rightmost sample strictly before `time`
    fn idx_last_sample_before(&self, time: f64) -> Option<usize>;
    /// Samples with `from <= time <= to`
    fn timeslice(&self, from: f64, to: f64) -> &[BeatSample];
    fn mean_heart_rate_bpm(&self) -> Result<f64, InsufficientData>;
    /// RMSSD of the beat intervals, in milliseconds
    fn heart_rate_variability_ms(&self) -> Result<f64, InsufficientData>;
    /// One entry per beat, `None` where the beat's time is unknown
    fn per_beat_times(&self) -> Vec<Option<f64>>;
}

impl BeatSliceExt for [BeatSample] {
    fn idx_last_sample_before(&self, time: f64) -> Option<usize> {
        self.partition_point(|s| s.time < time).checked_sub(1)
    }

    fn timeslice(&self, from: f64, to: f64) -> &[BeatSample] {
        let start = self.partition_point(|s| s.time < from);
        let end = self.partition_point(|s| s.time <= to).max(start);
        &self[start..end]
    }

    fn mean_heart_rate_bpm(&self) -> Result<f64, InsufficientData> {
        let insufficient = || InsufficientData::new("mean heart rate", 2, self.len());
        let (first, last) = match (self.first(), self.last()) {
            (Some(first), Some(last)) if self.len() >= 2 => (first, last),
            _ => return Err(insufficient()),
        };

        let elapsed = last.time - first.time;
        if elapsed <= 0.0 {
            return Err(insufficient());
        }
        Ok(60.0 * (last.count - first.count) as f64 / elapsed)
    }

    fn heart_rate_variability_ms(&self) -> Result<f64, InsufficientData> {
        let beats = self.per_beat_times();

        let known = beats.iter().filter(|t| t.is_some()).count();
        if known < 3 {
            return Err(InsufficientData::new("heart rate variability", 3, known));
        }

        let squared_diffs: Vec<f64> = beats
            .windows(3)
            .filter_map(|w| match (w[0], w[1], w[2]) {
                (Some(t0), Some(t1), Some(t2)) => {
                    let diff = (t2 - t1) - (t1 - t0);
                    Some(diff * diff)
                }
                _ => None,
            })
            .collect();

        if squared_diffs.is_empty() {
            return Err(InsufficientData::new("heart rate variability windows", 1, 0));
        }

        let mean = squared_diffs.iter().sum::<f64>() / squared_diffs.len() as f64;
        Ok(1000.0 * mean.sqrt())
    }

    fn per_beat_times(&self) -> Vec<Option<f64>> {
        let mut beats = Vec::with_capacity(self.len());
        let mut prev_count: Option<u64> = None;
        for sample in self {
            if let Some(prev) = prev_count {
                let missing = sample.count.saturating_sub(prev).saturating_sub(1);
                beats.extend((0..missing).map(|_| None));
            }
            beats.push(Some(sample.time));
            prev_count = Some(sample.count);
        }
        beats
    }
}

/// Time-sorted heart beats of one device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeartBeatTimings {
    samples: Vec<BeatSample>,
}

impl HeartBeatTimings {
    /// Derive beat times from a chronological run of one device's data points
    ///
    /// Beat timers must already be resolved to wall clock time; data points
    /// that aren't from an HRM, or whose beat timer isn't resolved, add no
    /// samples.
    pub fn from_data_points<'a, I>(data_points: I) -> Self
    where
        I: IntoIterator<Item = &'a DataPoint>,
    {
        let mut samples = Vec::new();
        let mut prev_count: Option<u64> = None;

        for dp in data_points {
            let beat = match dp.beat() {
                Some(beat) => beat,
                None => continue,
            };
            let count = beat.count;

            // First point: the beat before last is always new to us
            let beats_in_interval = match prev_count {
                Some(prev) => count.saturating_sub(prev),
                None => 2,
            };

            if beats_in_interval > 1 && count > 0 {
                if let Some(time) = dp.previous_beat_realtime() {
                    samples.push(BeatSample::new(time, count - 1));
                }
            }
            if beats_in_interval > 0 {
                if let Some(time) = beat.last_event_realtime() {
                    samples.push(BeatSample::new(time, count));
                }
            }
            prev_count = Some(count);
        }

        log::debug!("Derived {} heart beat samples", samples.len());
        Self { samples }
    }

    /// Wrap samples that are already sorted by time
    pub fn from_samples(samples: Vec<BeatSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[BeatSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn idx_last_sample_before(&self, time: f64) -> Option<usize> {
        self.samples.idx_last_sample_before(time)
    }

    pub fn timeslice(&self, from: f64, to: f64) -> &[BeatSample] {
        self.samples.timeslice(from, to)
    }

    pub fn mean_heart_rate_bpm(&self) -> Result<f64, InsufficientData> {
        self.samples.mean_heart_rate_bpm()
    }

    pub fn heart_rate_variability_ms(&self) -> Result<f64, InsufficientData> {
        self.samples.heart_rate_variability_ms()
    }
}
