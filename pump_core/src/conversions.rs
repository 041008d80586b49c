//! Bridges from `pump_config` types to `pump_core` runtime types.

use std::time::Duration;

use crate::config::{RunnerSettings, SessionSettings};
use crate::error::Result;
use crate::protocol::DispenseRequest;
use crate::reader::Backpressure;
use crate::util::poll_period;

impl From<pump_config::BackpressureCfg> for Backpressure {
    fn from(c: pump_config::BackpressureCfg) -> Self {
        match c {
            pump_config::BackpressureCfg::Block => Backpressure::Block,
            pump_config::BackpressureCfg::DropOldest => Backpressure::DropOldest,
        }
    }
}

impl From<&pump_config::Config> for RunnerSettings {
    fn from(c: &pump_config::Config) -> Self {
        Self {
            poll: poll_period(c.session.poll_ms),
        }
    }
}

impl TryFrom<&pump_config::DispenseDefaults> for DispenseRequest {
    type Error = crate::error::PumpError;

    fn try_from(d: &pump_config::DispenseDefaults) -> Result<Self> {
        DispenseRequest::new(d.volume_ml, d.rate_ml_min)
    }
}

impl TryFrom<&pump_config::Config> for SessionSettings {
    type Error = crate::error::PumpError;

    fn try_from(c: &pump_config::Config) -> Result<Self> {
        Ok(Self {
            baud: c.serial.baud,
            settle: Duration::from_millis(c.serial.settle_ms),
            queue_capacity: c.session.queue_capacity.max(1),
            backpressure: c.session.backpressure.into(),
            comm_log_lines: c.session.comm_log_lines.max(1),
            default_request: DispenseRequest::try_from(&c.defaults)?,
        })
    }
}

/// The request a configured pump should run with, falling back to `[defaults]`.
pub fn request_for(
    entry: &pump_config::PumpEntry,
    defaults: &pump_config::DispenseDefaults,
) -> Result<DispenseRequest> {
    DispenseRequest::new(entry.volume_or(defaults), entry.rate_or(defaults))
}
