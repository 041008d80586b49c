//! Runtime settings for sessions and the control loop.
//!
//! These are separate from the TOML-deserialized config in `pump_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

use crate::protocol::DispenseRequest;
use crate::reader::Backpressure;

/// Per-session link and queue settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub baud: u32,
    /// Delay after the port opens before the link is considered usable.
    pub settle: Duration,
    /// Report queue bound for the background reader.
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
    /// Lines kept in the communication log.
    pub comm_log_lines: usize,
    /// Volume/rate a new session starts with.
    pub default_request: DispenseRequest,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            baud: 115_200,
            settle: Duration::from_millis(2_000),
            queue_capacity: 256,
            backpressure: Backpressure::Block,
            comm_log_lines: 500,
            default_request: DEFAULT_REQUEST,
        }
    }
}

/// 5.0 mL at 10.0 mL/min.
pub const DEFAULT_REQUEST: DispenseRequest = DispenseRequest::DEFAULT;

/// Control loop cadence.
#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    pub poll: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(100),
        }
    }
}
