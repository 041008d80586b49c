//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "pump", version, about = "Syringe pump controller")]
pub struct Cli {
    /// Path to config TOML; a missing file means built-in defaults
    #[arg(long, value_name = "FILE", default_value = "etc/pump_config.toml")]
    pub config: PathBuf,

    /// Print results and logs as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List serial ports
    Ports,
    /// Dispense on one pump and wait for the device to finish.
    ///
    /// Ctrl-C sends CANCEL; a second Ctrl-C disconnects immediately.
    Dispense {
        /// Serial port of the pump (e.g. COM3, /dev/ttyACM0)
        #[arg(long)]
        port: String,
        /// Volume in mL (default from config)
        #[arg(long, allow_negative_numbers = true)]
        volume: Option<f64>,
        /// Flow rate in mL/min (default from config)
        #[arg(long, allow_negative_numbers = true)]
        rate: Option<f64>,
        /// Display name for logs and output
        #[arg(long)]
        name: Option<String>,
    },
    /// Ask a pump for its status and print the answer
    Status {
        #[arg(long)]
        port: String,
        /// How long to wait for the answer
        #[arg(long, value_name = "MS", default_value_t = 2_000)]
        wait_ms: u64,
    },
    /// Dispense on every configured pump at once. Ctrl-C stops all.
    Run {
        /// Dispense plan CSV (name,port,volume_ml,rate_ml_min) instead of [[pumps]]
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,
    },
    /// Validate the configuration and exit
    Check,
}
