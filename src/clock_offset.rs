//! # Clock Offset Estimation Module
//!
//! Maps a device's tick clock onto the capture machine's wall clock.
//!
//! Each broadcast is timestamped on arrival, but the event it reports happened
//! at some unknown earlier moment. Between two captures where the event count
//! advanced by N, assume the N events were evenly spread over the gap; the last
//! one then lands half a mean inter-event interval before the second capture.
//! Every such pair yields one offset estimate, and the estimates are combined
//! as a weighted mean with weight `1 / gap`, since tighter pairs pin the event
//! time down more precisely.
//!
//! ## Queued Captures
//! Devices broadcast around 4 times a second. Captures closer together than
//! `min_capture_gap` (100 ms by default) mean broadcasts were queued before
//! being timestamped, and their timing tells us nothing, so those pairs are
//! skipped.

use crate::devices::DataPoint;
use crate::error::InsufficientData;
use crate::event_timer::EventTimerSample;

/// Captures closer together than this are treated as queued
pub const DEFAULT_MIN_CAPTURE_GAP_SECS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockOffsetEstimator {
    min_capture_gap: f64,
}

impl Default for ClockOffsetEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CAPTURE_GAP_SECS)
    }
}

impl ClockOffsetEstimator {
    pub fn new(min_capture_gap: f64) -> Self {
        Self { min_capture_gap }
    }

    pub fn min_capture_gap(&self) -> f64 {
        self.min_capture_gap
    }

    /// Estimate the offset to add to `last_event_seconds` to get wall clock time
    ///
    /// `samples` must be chronological `(capture_time, sample)` pairs from one
    /// physical counter.
    pub fn estimate<'a, I>(&self, samples: I) -> Result<f64, InsufficientData>
    where
        I: IntoIterator<Item = (f64, &'a EventTimerSample)>,
    {
        let mut previous: Option<(f64, u64)> = None;
        let mut weight_total = 0.0;
        let mut offset_total = 0.0;
        let mut usable_pairs = 0;

        for (capture_time, sample) in samples {
            if let Some((prev_time, prev_count)) = previous {
                if sample.count > prev_count {
                    let time_gap = capture_time - prev_time;
                    if time_gap < self.min_capture_gap {
                        // Keep measuring from the capture before the burst
                        log::debug!(
                            "Skipping queued capture at {:.3} ({:.3}s after previous)",
                            capture_time,
                            time_gap
                        );
                        continue;
                    }

                    let weight = 1.0 / time_gap;
                    let count_gap = (sample.count - prev_count) as f64;
                    let mean_interevent_time = time_gap / count_gap;
                    let last_event_estimate = capture_time - mean_interevent_time / 2.0;
                    let sample_offset = last_event_estimate - sample.last_event_seconds;

                    offset_total += weight * sample_offset;
                    weight_total += weight;
                    usable_pairs += 1;
                }
            }
            previous = Some((capture_time, sample.count));
        }

        if usable_pairs == 0 || weight_total <= 0.0 {
            return Err(InsufficientData::new("clock offset", 1, 0));
        }

        Ok(offset_total / weight_total)
    }

    /// Estimate the offset and write `last_event_realtime` into every sample
    ///
    /// Samples skipped by the estimate are resolved too. On insufficient data
    /// nothing is written.
    pub fn resolve<'a, I>(&self, samples: I) -> Result<f64, InsufficientData>
    where
        I: IntoIterator<Item = (f64, &'a mut EventTimerSample)>,
    {
        let mut samples: Vec<(f64, &'a mut EventTimerSample)> = samples.into_iter().collect();
        let offset = self.estimate(samples.iter().map(|(time, sample)| (*time, &**sample)))?;
        for (_, sample) in samples.iter_mut() {
            sample.set_realtime(offset);
        }
        Ok(offset)
    }

    /// Resolve every event timer in a chronological run of one device's data points
    ///
    /// Each named timer is an independent clock and gets its own offset.
    /// Returns the outcome per timer name, in name order.
    pub fn resolve_data_points(
        &self,
        data_points: &mut [DataPoint],
    ) -> Vec<(&'static str, Result<f64, InsufficientData>)> {
        let names: Vec<&'static str> = match data_points.first() {
            Some(first) => first.event_timers.keys().copied().collect(),
            None => return Vec::new(),
        };

        names
            .into_iter()
            .map(|name| {
                let samples = data_points.iter_mut().filter_map(|dp| {
                    let timestamp = dp.timestamp;
                    dp.event_timers
                        .get_mut(name)
                        .map(|sample| (timestamp, sample))
                });
                let outcome = self.resolve(samples);
                if let Err(e) = &outcome {
                    let description = data_points
                        .iter()
                        .find_map(|dp| dp.event_timer(name))
                        .map_or(name, |sample| sample.spec().event_description);
                    log::warn!("Timer '{}' ({}) left unresolved: {}", name, description, e);
                }
                (name, outcome)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_timer::EventTimerSpec;

    const BEAT: EventTimerSpec = EventTimerSpec::new("beat", 1024.0, 256, 65536);

    /// Build (capture_time, sample) pairs from (capture_time, absolute count, absolute ticks)
    fn captures(raw: &[(f64, u64, u64)]) -> Vec<(f64, EventTimerSample)> {
        let mut out: Vec<(f64, EventTimerSample)> = Vec::new();
        for &(time, count, ticks) in raw {
            let previous = out.last().map(|(_, s)| s);
            let sample = EventTimerSample::new(
                BEAT,
                (count % BEAT.event_count_wrap) as u32,
                (ticks % BEAT.clock_wrap) as u32,
                previous,
            );
            out.push((time, sample));
        }
        out
    }

    fn pairs(samples: &[(f64, EventTimerSample)]) -> impl Iterator<Item = (f64, &EventTimerSample)> {
        samples.iter().map(|(t, s)| (*t, s))
    }

    #[test]
    fn test_exact_midpoint_recovers_offset() {
        // Beats every second at offset + k, captures every 0.5s, 0.25s after each beat
        let offset = 1_000.0;
        let raw: Vec<(f64, u64, u64)> = (0..40u64)
            .map(|j| {
                let capture = offset + 0.25 + 0.5 * j as f64;
                let beat = j / 2;
                (capture, beat, beat * 1024)
            })
            .collect();
        let samples = captures(&raw);

        let estimate = ClockOffsetEstimator::default().estimate(pairs(&samples)).unwrap();
        assert!((estimate - offset).abs() < 1e-9, "estimate {}", estimate);
    }

    #[test]
    fn test_recovers_offset_across_wraps() {
        // Beats every 0.75s (768 ticks) read at a rate unrelated to the beat rate.
        // 4000 captures span several wraps of both the count and the tick clock.
        let offset = 1.7e9 + 0.3217;
        let period = 0.75;
        let capture_interval = 0.2617;
        let raw: Vec<(f64, u64, u64)> = (0..4000u64)
            .map(|j| {
                let capture = offset + 0.05 + j as f64 * capture_interval;
                let beat = ((capture - offset) / period).floor() as u64;
                (capture, beat, beat * 768)
            })
            .collect();
        let samples = captures(&raw);

        let estimate = ClockOffsetEstimator::default().estimate(pairs(&samples)).unwrap();
        assert!((estimate - offset).abs() < 0.001, "error {}", estimate - offset);
    }

    #[test]
    fn test_single_sample_is_insufficient() {
        let samples = captures(&[(10.0, 3, 1024)]);
        let result = ClockOffsetEstimator::default().estimate(pairs(&samples));
        assert_eq!(result, Err(InsufficientData::new("clock offset", 1, 0)));
    }

    #[test]
    fn test_queued_captures_are_insufficient() {
        let samples = captures(&[(10.0, 3, 1024), (10.05, 4, 2048), (10.09, 5, 3072)]);
        let result = ClockOffsetEstimator::default().estimate(pairs(&samples));
        assert!(result.is_err());
    }

    #[test]
    fn test_queued_capture_measures_from_before_burst() {
        // The 10.52 capture is queued behind 10.5; the next pair spans 10.5..11.0
        let samples = captures(&[(10.0, 3, 1024), (10.5, 4, 1536), (10.52, 5, 2048), (11.0, 5, 2048)]);
        let estimator = ClockOffsetEstimator::default();
        let estimate = estimator.estimate(pairs(&samples[..2])).unwrap();
        let with_burst = estimator.estimate(pairs(&samples)).unwrap();
        assert!((estimate - with_burst).abs() < 1e-9);
    }

    #[test]
    fn test_no_count_advance_is_insufficient() {
        let samples = captures(&[(10.0, 3, 1024), (10.25, 3, 1024), (10.5, 3, 1024)]);
        let result = ClockOffsetEstimator::default().estimate(pairs(&samples));
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_min_gap() {
        let samples = captures(&[(10.0, 3, 1024), (10.05, 4, 2048)]);
        let estimator = ClockOffsetEstimator::new(0.01);
        let estimate = estimator.estimate(pairs(&samples)).unwrap();
        // One beat over 50ms: last beat at 10.05 - 0.025, device time 2.0
        assert!((estimate - 8.025).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_sets_every_sample() {
        let mut samples = captures(&[(10.0, 3, 1024), (10.5, 4, 1536), (10.55, 4, 1536)]);
        let offset = ClockOffsetEstimator::default()
            .resolve(samples.iter_mut().map(|(t, s)| (*t, s)))
            .unwrap();
        // One beat over 0.5s: last beat at 10.25, device time 1.5
        assert!((offset - 8.75).abs() < 1e-9);
        for (_, sample) in &samples {
            let realtime = sample.last_event_realtime().unwrap();
            assert!((realtime - (sample.last_event_seconds + offset)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_resolve_leaves_samples_on_insufficient_data() {
        let mut samples = captures(&[(10.0, 3, 1024)]);
        let result =
            ClockOffsetEstimator::default().resolve(samples.iter_mut().map(|(t, s)| (*t, s)));
        assert!(result.is_err());
        assert_eq!(samples[0].1.last_event_realtime(), None);
    }
}
