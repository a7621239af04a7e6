//! # ant-signal
//!
//! Decodes ANT+ heart rate and bicycle speed/cadence broadcasts from capture
//! logs, puts each device's event times on the capture machine's wall clock,
//! and derives heart beat timings, mean heart rate and HRV from them.
//!
//! ## Pipeline
//! ```text
//! log lines → LogParser → DataPoints → ClockOffsetEstimator → HeartBeatTimings
//! ```
//!
//! ## Example
//! ```
//! use ant_signal::{ClockOffsetEstimator, HeartBeatTimings, LogParser, LogRecord};
//!
//! let lines = ["1000.0 120.1 0 0 10 0 20 0 5 70", "opened channel 0"];
//! let mut data_points = Vec::new();
//! for record in LogParser::default().records(lines) {
//!     if let LogRecord::Data(dp) = record.unwrap() {
//!         data_points.push(dp);
//!     }
//! }
//!
//! // A single broadcast isn't enough to place beats on the wall clock
//! let outcome = ClockOffsetEstimator::default().resolve_data_points(&mut data_points);
//! assert!(outcome[0].1.is_err());
//! assert!(HeartBeatTimings::from_data_points(&data_points).is_empty());
//! ```

pub mod clock_offset;
pub mod config;
pub mod device_spec;
pub mod devices;
pub mod error;
pub mod event_timer;
pub mod heartbeat;
pub mod log_parser;
pub mod session;

pub use clock_offset::ClockOffsetEstimator;
pub use config::Config;
pub use device_spec::DeviceSpec;
pub use devices::{DataPoint, DeviceData, DeviceKind};
pub use error::{AnalysisError, ConfigError, DecodeError, DeviceSpecError, InsufficientData};
pub use event_timer::{EventTimerSample, EventTimerSpec};
pub use heartbeat::{BeatSample, BeatSliceExt, HeartBeatTimings};
pub use log_parser::{LogParser, LogRecord, UnknownDevicePolicy};
pub use session::{DeviceSummary, Session};
