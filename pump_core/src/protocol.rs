//! Outbound command encoding.
//!
//! Wire format, one command per `\n`-terminated line:
//!
//! ```text
//! DISPENSE:<volume>,<rate>
//! CANCEL
//! STATUS
//! ```

use std::fmt;

use crate::error::{PumpError, Result};

/// A validated dispense request: volume in mL, rate in mL/min.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispenseRequest {
    volume_ml: f64,
    rate_ml_min: f64,
}

impl DispenseRequest {
    /// 5.0 mL at 10.0 mL/min.
    pub const DEFAULT: Self = Self {
        volume_ml: 5.0,
        rate_ml_min: 10.0,
    };

    /// Both values must be finite and strictly positive.
    pub fn new(volume_ml: f64, rate_ml_min: f64) -> Result<Self> {
        if !(volume_ml.is_finite() && volume_ml > 0.0) {
            return Err(PumpError::Validation(format!(
                "volume must be a positive number, got {volume_ml}"
            )));
        }
        if !(rate_ml_min.is_finite() && rate_ml_min > 0.0) {
            return Err(PumpError::Validation(format!(
                "rate must be a positive number, got {rate_ml_min}"
            )));
        }
        Ok(Self {
            volume_ml,
            rate_ml_min,
        })
    }

    /// Parse user-entered text, e.g. from a form field or CLI flag.
    pub fn parse(volume: &str, rate: &str) -> Result<Self> {
        let v = parse_number("volume", volume)?;
        let r = parse_number("rate", rate)?;
        Self::new(v, r)
    }

    pub fn volume_ml(&self) -> f64 {
        self.volume_ml
    }

    pub fn rate_ml_min(&self) -> f64 {
        self.rate_ml_min
    }
}

fn parse_number(what: &str, text: &str) -> Result<f64> {
    text.trim().parse::<f64>().map_err(|_| {
        PumpError::Validation(format!("{what} must be a number, got {:?}", text.trim()))
    })
}

/// Commands the pump firmware understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Dispense(DispenseRequest),
    Cancel,
    Status,
}

impl Command {
    /// The line to send, without the terminator.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Dispense(req) => write!(
                f,
                "DISPENSE:{},{}",
                format_decimal(req.volume_ml),
                format_decimal(req.rate_ml_min)
            ),
            Command::Cancel => f.write_str("CANCEL"),
            Command::Status => f.write_str("STATUS"),
        }
    }
}

/// Plain decimal notation; integral values keep one fractional digit so the
/// firmware always sees `5.0`, never `5` or `5e0`.
pub fn format_decimal(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}
