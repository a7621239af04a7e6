//! # Session Analysis Module
//!
//! Groups a parsed capture log by device and runs the analysis pipeline on
//! each device's data points:
//!
//! ```text
//! LogRecords → per-device DataPoints → clock offsets → event rates, heart beats
//! ```
//!
//! Devices keep the order in which they first appeared in the log.

use crate::clock_offset::ClockOffsetEstimator;
use crate::device_spec::DeviceSpec;
use crate::devices::{DataPoint, DeviceKind};
use crate::error::{AnalysisError, DecodeError, InsufficientData};
use crate::heartbeat::{BeatSliceExt, HeartBeatTimings};
use crate::log_parser::{LogParser, LogRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;

/// Render seconds since the epoch as a UTC time
pub fn format_timestamp(secs: f64) -> String {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    match DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999)) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{:.3}", secs),
    }
}

/// All data points from one device spec, in log order
#[derive(Debug, Clone)]
pub struct DeviceLog {
    pub device_spec: String,
    pub data_points: Vec<DataPoint>,
    offsets: Vec<(&'static str, Result<f64, InsufficientData>)>,
}

impl DeviceLog {
    fn new(device_spec: String) -> Self {
        Self {
            device_spec,
            data_points: Vec::new(),
            offsets: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<DeviceKind> {
        self.data_points.first().map(|dp| dp.kind())
    }

    /// Clock offset per event timer, empty until resolved
    pub fn offsets(&self) -> &[(&'static str, Result<f64, InsufficientData>)] {
        &self.offsets
    }

    /// Resolve wall clock times for every event timer of this device
    pub fn resolve_realtimes(&mut self, estimator: &ClockOffsetEstimator) {
        self.offsets = estimator.resolve_data_points(&mut self.data_points);
    }

    /// Mean events per minute of a timer between its first and last resolved events
    pub fn event_rate_per_minute(&self, timer: &str) -> Result<f64, InsufficientData> {
        let resolved: Vec<(u64, f64)> = self
            .data_points
            .iter()
            .filter_map(|dp| dp.event_timer(timer))
            .filter_map(|s| s.last_event_realtime().map(|t| (s.count, t)))
            .collect();

        let insufficient = || InsufficientData::new("event rate", 2, resolved.len());
        let (first, last) = match (resolved.first(), resolved.last()) {
            (Some(first), Some(last)) if resolved.len() >= 2 => (first, last),
            _ => return Err(insufficient()),
        };
        let elapsed = last.1 - first.1;
        if elapsed <= 0.0 {
            return Err(insufficient());
        }
        Ok(60.0 * (last.0 - first.0) as f64 / elapsed)
    }

    /// Heart beat series, for heart rate monitors only
    pub fn heart_beat_timings(&self) -> Option<HeartBeatTimings> {
        match self.kind() {
            Some(DeviceKind::Hrm) => Some(HeartBeatTimings::from_data_points(&self.data_points)),
            _ => None,
        }
    }

    /// Summarize this device, restricting heart statistics to `window` if given
    pub fn summary(&self, window: Option<(f64, f64)>) -> DeviceSummary {
        let timers = self
            .offsets
            .iter()
            .map(|&(name, ref offset)| TimerSummary {
                name,
                description: self
                    .data_points
                    .iter()
                    .find_map(|dp| dp.event_timer(name))
                    .map_or(name, |sample| sample.spec().event_description),
                offset: offset.clone(),
                rate_per_minute: self.event_rate_per_minute(name),
            })
            .collect();

        let heart = self.heart_beat_timings().map(|timings| {
            let beats = match window {
                Some((from, to)) => timings.timeslice(from, to),
                None => timings.samples(),
            };
            HeartSummary {
                beats: beats.len(),
                mean_heart_rate_bpm: beats.mean_heart_rate_bpm(),
                heart_rate_variability_ms: beats.heart_rate_variability_ms(),
            }
        });

        DeviceSummary {
            device_spec: self.device_spec.clone(),
            channel: DeviceSpec::parse(&self.device_spec).ok(),
            kind: self.kind().unwrap_or(DeviceKind::Generic),
            data_points: self.data_points.len(),
            first_timestamp: self.data_points.first().map(|dp| dp.timestamp),
            last_timestamp: self.data_points.last().map(|dp| dp.timestamp),
            timers,
            heart,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimerSummary {
    pub name: &'static str,
    pub description: &'static str,
    pub offset: Result<f64, InsufficientData>,
    pub rate_per_minute: Result<f64, InsufficientData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartSummary {
    pub beats: usize,
    pub mean_heart_rate_bpm: Result<f64, InsufficientData>,
    pub heart_rate_variability_ms: Result<f64, InsufficientData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    pub device_spec: String,
    /// Channel settings parsed from the device spec
    pub channel: Option<DeviceSpec>,
    pub kind: DeviceKind,
    pub data_points: usize,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub timers: Vec<TimerSummary>,
    pub heart: Option<HeartSummary>,
}

fn write_estimate(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    value: &Result<f64, InsufficientData>,
    unit: &str,
) -> fmt::Result {
    match value {
        Ok(v) => writeln!(f, "    {}: {:.3} {}", label, v, unit),
        Err(e) => writeln!(f, "    {}: n/a ({})", label, e),
    }
}

impl fmt::Display for DeviceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} [{}]: {} data points",
            self.device_spec,
            self.kind.name(),
            self.data_points
        )?;
        if let Some(channel) = &self.channel {
            write!(
                f,
                "  channel period {} ({:.2} broadcasts/s)",
                channel.period,
                channel.messages_per_second()
            )?;
            if channel.is_wildcard() {
                write!(f, ", wildcard: may mix several devices")?;
            }
            writeln!(f)?;
        }
        if let (Some(first), Some(last)) = (self.first_timestamp, self.last_timestamp) {
            writeln!(
                f,
                "  from {} to {} UTC",
                format_timestamp(first),
                format_timestamp(last)
            )?;
        }
        for timer in &self.timers {
            writeln!(f, "  {} ({}):", timer.name, timer.description)?;
            write_estimate(f, "clock offset", &timer.offset, "s")?;
            write_estimate(f, "rate", &timer.rate_per_minute, "/min")?;
        }
        if let Some(heart) = &self.heart {
            writeln!(f, "  heart beats: {}", heart.beats)?;
            write_estimate(f, "mean heart rate", &heart.mean_heart_rate_bpm, "bpm")?;
            write_estimate(f, "HRV (RMSSD)", &heart.heart_rate_variability_ms, "ms")?;
        }
        Ok(())
    }
}

/// A parsed capture log split by device
#[derive(Debug, Clone, Default)]
pub struct Session {
    devices: Vec<DeviceLog>,
    index: HashMap<String, usize>,
    passthrough_lines: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect records until the first decode error
    pub fn from_records<I>(records: I) -> Result<Self, DecodeError>
    where
        I: IntoIterator<Item = Result<LogRecord, DecodeError>>,
    {
        let mut session = Self::new();
        for record in records {
            session.push(record?);
        }
        Ok(session)
    }

    /// Read a whole capture log, failing on the first unreadable line or decode error
    pub fn from_reader<R: BufRead>(reader: R, mut parser: LogParser) -> Result<Self, AnalysisError> {
        let mut session = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| AnalysisError::ReadFailed {
                line: idx + 1,
                source,
            })?;
            session.push(parser.parse_line(&line)?);
        }
        Ok(session)
    }

    pub fn push(&mut self, record: LogRecord) {
        match record {
            LogRecord::Data(dp) => {
                let idx = match self.index.get(&dp.device_spec) {
                    Some(&idx) => idx,
                    None => {
                        log::info!("New device {}", dp.device_spec);
                        self.devices.push(DeviceLog::new(dp.device_spec.clone()));
                        self.index.insert(dp.device_spec.clone(), self.devices.len() - 1);
                        self.devices.len() - 1
                    }
                };
                self.devices[idx].data_points.push(dp);
            }
            LogRecord::Passthrough(line) => {
                log::debug!("{}", line);
                self.passthrough_lines += 1;
            }
        }
    }

    pub fn devices(&self) -> &[DeviceLog] {
        &self.devices
    }

    pub fn device(&self, device_spec: &str) -> Option<&DeviceLog> {
        self.index.get(device_spec).map(|&idx| &self.devices[idx])
    }

    pub fn passthrough_lines(&self) -> usize {
        self.passthrough_lines
    }

    /// Estimate clock offsets and resolve event times for every device
    pub fn resolve_realtimes(&mut self, estimator: &ClockOffsetEstimator) {
        for device in &mut self.devices {
            device.resolve_realtimes(estimator);
            for (name, offset) in device.offsets() {
                if let Ok(offset) = offset {
                    log::info!("{} {}: clock offset {:.6}s", device.device_spec, name, offset);
                }
            }
        }
    }

    pub fn summaries(&self, window: Option<(f64, f64)>) -> Vec<DeviceSummary> {
        self.devices.iter().map(|d| d.summary(window)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_parser::LogParser;

    /// HRM log lines: a beat every `period` seconds from `offset`, broadcasts every 0.25s
    fn hrm_lines(spec: &str, offset: f64, period: f64, broadcasts: usize) -> Vec<String> {
        let ticks_per_beat = (period * 1024.0) as u64;
        (0..broadcasts)
            .map(|j| {
                let capture = offset + 0.125 + 0.25 * j as f64;
                let beat = ((capture - offset) / period).floor() as u64;
                let last = (beat * ticks_per_beat) % 65536;
                let prev = (beat.saturating_sub(1) * ticks_per_beat) % 65536;
                format!(
                    "{:.4} {} 0 0 {} {} {} {} {} 60",
                    capture,
                    spec,
                    prev % 256,
                    prev / 256,
                    last % 256,
                    last / 256,
                    beat % 256
                )
            })
            .collect()
    }

    #[test]
    fn test_groups_by_device_in_first_seen_order() {
        let lines = vec![
            "starting".to_string(),
            "1.0 121.5 0 0 0 0 0 0 0 0".to_string(),
            "1.1 120.1 0 0 10 0 20 0 5 70".to_string(),
            "1.2 121.5 1 0 0 4 1 0 0 4".to_string(),
        ];
        let session = Session::from_records(LogParser::default().records(lines)).unwrap();
        let specs: Vec<&str> = session.devices().iter().map(|d| d.device_spec.as_str()).collect();
        assert_eq!(specs, vec!["121.5", "120.1"]);
        assert_eq!(session.passthrough_lines(), 1);
        assert_eq!(session.device("121.5").unwrap().data_points.len(), 2);
        assert_eq!(session.device("121.5").unwrap().kind(), Some(DeviceKind::SpeedCadence));
        assert!(session.device("120.9").is_none());
    }

    #[test]
    fn test_from_records_stops_at_error() {
        let lines = vec!["1.0 120.1 0 0 10 0 20 0 5 70", "1.1 120.1 0 0"];
        let result = Session::from_records(LogParser::default().records(lines));
        assert!(matches!(result, Err(DecodeError::MalformedRecord { .. })));
    }

    #[test]
    fn test_from_reader_fails_on_unreadable_line() {
        let log: &[u8] = b"1.0 120.1 0 0 10 0 20 0 5 70\n\xff\xfe bad\n2.0 120.1 0 0 10 0 20 0 6 70\n";
        match Session::from_reader(log, LogParser::default()) {
            Err(AnalysisError::ReadFailed { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result {:?}", other.map(|s| s.devices().len())),
        }
    }

    #[test]
    fn test_from_reader_reads_to_the_end() {
        let log: &[u8] = b"opened channel\n1.0 120.1 0 0 10 0 20 0 5 70\n2.0 120.1 0 0 10 0 20 0 6 70\n";
        let session = Session::from_reader(log, LogParser::default()).unwrap();
        assert_eq!(session.device("120.1").unwrap().data_points.len(), 2);
        assert_eq!(session.passthrough_lines(), 1);

        let log: &[u8] = b"1.0 120.1 0 0 10 0 20 0 5 70\n1.1 120.1 0 0\n";
        assert!(matches!(
            Session::from_reader(log, LogParser::default()),
            Err(AnalysisError::Decode(DecodeError::MalformedRecord { .. }))
        ));
    }

    #[test]
    fn test_hrm_pipeline() {
        // 60 bpm with beats on whole seconds after the offset, 2 minutes of broadcasts
        let offset = 1_600_000_000.0;
        let lines = hrm_lines("120.3", offset, 1.0, 480);
        let mut session = Session::from_records(LogParser::default().records(lines)).unwrap();
        session.resolve_realtimes(&ClockOffsetEstimator::default());

        let device = session.device("120.3").unwrap();
        let (name, estimate) = &device.offsets()[0];
        assert_eq!(*name, "beat");
        assert!((estimate.clone().unwrap() - offset).abs() < 0.01);

        let rate = device.event_rate_per_minute("beat").unwrap();
        assert!((rate - 60.0).abs() < 0.01);

        let timings = device.heart_beat_timings().unwrap();
        assert!((timings.mean_heart_rate_bpm().unwrap() - 60.0).abs() < 0.01);
        // Perfectly regular beats
        assert!(timings.heart_rate_variability_ms().unwrap() < 1e-3);

        let summary = device.summary(Some((offset + 10.0, offset + 20.0)));
        assert_eq!(summary.kind, DeviceKind::Hrm);
        assert_eq!(summary.timers[0].description, "heart beat");
        assert_eq!(summary.channel.unwrap().period, 8070);
        assert_eq!(summary.data_points, 480);
        let heart = summary.heart.unwrap();
        assert!(heart.beats >= 10 && heart.beats <= 11);
        assert!((heart.mean_heart_rate_bpm.unwrap() - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_unresolvable_device() {
        let lines = vec!["1.0 120.1 0 0 10 0 20 0 5 70"];
        let mut session = Session::from_records(LogParser::default().records(lines)).unwrap();
        session.resolve_realtimes(&ClockOffsetEstimator::default());
        let summary = &session.summaries(None)[0];
        assert!(summary.timers[0].offset.is_err());
        assert!(summary.timers[0].rate_per_minute.is_err());
        assert_eq!(summary.heart.as_ref().unwrap().beats, 0);
        assert!(summary.to_string().contains("n/a"));
    }

    #[test]
    fn test_generic_device_summary_has_no_timers() {
        let lines = vec!["1.0 11.1 1 2 3 4 5 6 7 8", "1.5 11.1 1 2 3 4 5 6 7 8"];
        let mut session = Session::from_records(LogParser::default().records(lines)).unwrap();
        session.resolve_realtimes(&ClockOffsetEstimator::default());
        let summary = &session.summaries(None)[0];
        assert_eq!(summary.kind, DeviceKind::Generic);
        assert!(summary.timers.is_empty());
        assert!(summary.heart.is_none());
    }

    #[test]
    fn test_summary_describes_channel_and_timers() {
        let lines = vec![
            "1.0 121.5p8192 0 0 0 0 0 0 0 0",
            "2.0 121.5p8192 0 4 1 0 0 4 1 0",
        ];
        let mut session = Session::from_records(LogParser::default().records(lines)).unwrap();
        session.resolve_realtimes(&ClockOffsetEstimator::default());
        let text = session.summaries(None)[0].to_string();
        assert!(text.contains("channel period 8192 (4.00 broadcasts/s)\n"));
        assert!(text.contains("crank (crank magnet at sensor):"));
        assert!(text.contains("wheel (wheel magnet at sensor):"));

        let lines = vec!["1.0 120 0 0 10 0 20 0 5 70"];
        let session = Session::from_records(LogParser::default().records(lines)).unwrap();
        let text = session.summaries(None)[0].to_string();
        assert!(text.contains("channel period 8070 (4.06 broadcasts/s), wildcard"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.5), "1970-01-01 00:00:00.500");
        assert_eq!(format_timestamp(86400.0), "1970-01-02 00:00:00.000");
    }
}
