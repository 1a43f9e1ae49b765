//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "bench", version, about = "Motor bench CLI")]
pub struct Cli {
    /// Path to config TOML (defaults apply when the file is absent)
    #[arg(long, value_name = "FILE", default_value = "etc/bench_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Which cyclogram column to play back.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TrackArg {
    Duty,
    Rpm,
}

impl From<TrackArg> for bench_core::TrackKind {
    fn from(t: TrackArg) -> Self {
        match t {
            TrackArg::Duty => Self::Duty,
            TrackArg::Rpm => Self::Rpm,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the controller: manual hold or cyclogram playback
    Run {
        /// Serial port to open (e.g. /dev/ttyACM0)
        #[arg(long, value_name = "PORT")]
        port: String,
        /// Hold a fixed duty cycle in [0, 1]
        #[arg(long, value_name = "DUTY", conflicts_with_all = ["rpm", "cyclogram"])]
        duty: Option<f64>,
        /// Hold a fixed mechanical RPM
        #[arg(long, value_name = "RPM", conflicts_with = "cyclogram")]
        rpm: Option<f64>,
        /// Play a cyclogram CSV (duration plus duty and/or rpm columns)
        #[arg(long, value_name = "FILE")]
        cyclogram: Option<PathBuf>,
        /// Cyclogram track to play
        #[arg(long, value_enum, value_name = "TRACK", default_value = "duty")]
        track: TrackArg,
        /// Stop after this many seconds (otherwise runs until Ctrl-C or
        /// the cyclogram finishes)
        #[arg(long, value_name = "SECS")]
        seconds: Option<f64>,
        /// Copy the telemetry log here on exit
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
        /// Override motor.pole_pairs from the config
        #[arg(long, value_name = "N")]
        pole_pairs: Option<u32>,
    },
    /// List visible serial ports
    ListPorts,
    /// Parse a cyclogram CSV and report its tracks without connecting
    CheckCyclogram {
        /// CSV file to inspect
        file: PathBuf,
    },
}
