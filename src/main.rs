//! Command line analysis of ANT+ capture logs.
//!
//! Usage:
//!   ant-signal capture.log
//!   ant-signal --from 1700000000 --to 1700000300 --strict capture.log

use ant_signal::{Config, Session, UnknownDevicePolicy};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Decode ANT+ heart rate and speed/cadence capture logs
#[derive(Parser)]
#[command(name = "ant-signal", about = "Heart rate, HRV and event timing from ANT+ capture logs")]
struct Cli {
    /// Capture log, one broadcast per line
    log: PathBuf,

    /// Only use heart beats at or after this time (seconds since the epoch)
    #[arg(long)]
    from: Option<f64>,

    /// Only use heart beats at or before this time (seconds since the epoch)
    #[arg(long)]
    to: Option<f64>,

    /// Fail on device types without a decoder
    #[arg(long)]
    strict: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print every decoded data point once event times are resolved
    #[arg(long)]
    dump: bool,
}

fn load_config(path: Option<&Path>, strict: bool) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Using default settings: {}", e);
            Config::default()
        }
    };
    if strict {
        config.unknown_device_policy = UnknownDevicePolicy::Reject;
    }
    config
}

/// Heart beat window from `--from`/`--to`, open-ended on a missing side
fn time_window(from: Option<f64>, to: Option<f64>) -> Option<(f64, f64)> {
    match (from, to) {
        (None, None) => None,
        (from, to) => Some((from.unwrap_or(f64::NEG_INFINITY), to.unwrap_or(f64::INFINITY))),
    }
}

fn write_report<W: Write>(
    out: &mut W,
    session: &Session,
    window: Option<(f64, f64)>,
    dump: bool,
) -> io::Result<()> {
    if dump {
        for device in session.devices() {
            for dp in &device.data_points {
                writeln!(out, "{}", dp)?;
            }
        }
    }
    for summary in session.summaries(window) {
        write!(out, "{}", summary)?;
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.strict);

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    let file = match File::open(&cli.log) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error: cannot open {}: {}", cli.log.display(), e);
            process::exit(1);
        }
    };

    let mut session = match Session::from_reader(BufReader::new(file), config.log_parser()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}: {}", cli.log.display(), e);
            process::exit(1);
        }
    };
    session.resolve_realtimes(&config.estimator());

    log::info!(
        "{} devices, {} pass-through lines",
        session.devices().len(),
        session.passthrough_lines()
    );

    let window = time_window(cli.from, cli.to);
    if let Err(e) = write_report(&mut io::stdout().lock(), &session, window, cli.dump) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
