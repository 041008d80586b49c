//! Inbound report decoding.
//!
//! Every line from the pump is decoded exactly once into a `Report`, on the
//! reader thread, before it is queued for the control thread. Dispatch is by
//! prefix, first match wins:
//!
//! 1. `STATUS:<rest>`
//! 2. `PROGRESS_DETAILED:<percent>,<dispensed>,<remaining>,<elapsed>,<eta>,<rate>[,...]`
//! 3. `PROGRESS:<text>` (legacy firmware, optional trailing `NN.N%`)
//! 4. exactly `DISPENSE_COMPLETE` or `DISPENSE_CANCELLED`
//! 5. anything else is unrecognized

use crate::error::ParseError;
use crate::state::ProgressSnapshot;

const STATUS_PREFIX: &str = "STATUS:";
const DETAILED_PREFIX: &str = "PROGRESS_DETAILED:";
const LEGACY_PREFIX: &str = "PROGRESS:";
const COMPLETE: &str = "DISPENSE_COMPLETE";
const CANCELLED: &str = "DISPENSE_CANCELLED";

/// Field order of a detailed progress payload.
pub const DETAILED_FIELDS: [&str; 6] = [
    "percent",
    "dispensed",
    "remaining",
    "elapsed",
    "eta",
    "rate",
];

/// Non-dispensing device status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Idle,
    Cancelled,
    Error,
    Other(String),
}

impl DeviceStatus {
    fn from_raw(raw: &str) -> Self {
        match raw {
            "IDLE" => DeviceStatus::Idle,
            "CANCELLED" => DeviceStatus::Cancelled,
            "ERROR" => DeviceStatus::Error,
            other => DeviceStatus::Other(other.to_string()),
        }
    }

    /// Text as the device sent it.
    pub fn as_str(&self) -> &str {
        match self {
            DeviceStatus::Idle => "IDLE",
            DeviceStatus::Cancelled => "CANCELLED",
            DeviceStatus::Error => "ERROR",
            DeviceStatus::Other(s) => s,
        }
    }

    /// Statuses that end a dispense cycle.
    pub fn ends_dispense(&self) -> bool {
        !matches!(self, DeviceStatus::Other(_))
    }
}

/// A decoded inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// `STATUS:` whose text contains `DISPENSING`; carries the raw text.
    StatusDispensing(String),
    Status(DeviceStatus),
    ProgressDetailed(ProgressSnapshot),
    /// Legacy progress line. `percent` is set when the trailing token parsed.
    Progress { percent: Option<f64>, text: String },
    DispenseFinished { cancelled: bool },
    /// A `PROGRESS_DETAILED` line whose payload could not be used.
    Malformed { raw: String, error: ParseError },
    Unrecognized(String),
}

impl Report {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Report::StatusDispensing(_) => "status_dispensing",
            Report::Status(_) => "status",
            Report::ProgressDetailed(_) => "progress_detailed",
            Report::Progress { .. } => "progress",
            Report::DispenseFinished { .. } => "dispense_finished",
            Report::Malformed { .. } => "malformed",
            Report::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Decode one line. Never fails: bad input becomes `Malformed` or `Unrecognized`.
pub fn parse(line: &str) -> Report {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(STATUS_PREFIX) {
        let raw = rest.trim();
        return if raw.contains("DISPENSING") {
            Report::StatusDispensing(raw.to_string())
        } else {
            Report::Status(DeviceStatus::from_raw(raw))
        };
    }

    if let Some(payload) = line.strip_prefix(DETAILED_PREFIX) {
        return match parse_detailed(payload) {
            Ok(snapshot) => Report::ProgressDetailed(snapshot),
            Err(error) => Report::Malformed {
                raw: line.to_string(),
                error,
            },
        };
    }

    if let Some(rest) = line.strip_prefix(LEGACY_PREFIX) {
        let text = rest.trim();
        return Report::Progress {
            percent: trailing_percent(text),
            text: text.to_string(),
        };
    }

    match line {
        COMPLETE => Report::DispenseFinished { cancelled: false },
        CANCELLED => Report::DispenseFinished { cancelled: true },
        other => Report::Unrecognized(other.to_string()),
    }
}

/// Parse the first six numeric fields; extra fields are ignored.
pub fn parse_detailed(payload: &str) -> Result<ProgressSnapshot, ParseError> {
    let parts: Vec<&str> = payload.split(',').map(str::trim).collect();
    if parts.len() < DETAILED_FIELDS.len() {
        return Err(ParseError::TooFewFields {
            expected: DETAILED_FIELDS.len(),
            got: parts.len(),
        });
    }
    let mut vals = [0.0f64; 6];
    for (index, (slot, name)) in vals.iter_mut().zip(DETAILED_FIELDS).enumerate() {
        let value = parts[index];
        let v = value.parse::<f64>().map_err(|_| ParseError::NotANumber {
            index,
            name,
            value: value.to_string(),
        })?;
        if !v.is_finite() {
            return Err(ParseError::NotFinite { index, name });
        }
        *slot = v;
    }
    Ok(ProgressSnapshot {
        percent: vals[0],
        dispensed_ml: vals[1],
        remaining_ml: vals[2],
        elapsed_min: vals[3],
        eta_min: vals[4],
        rate_ml_min: vals[5],
    })
}

/// `"45.0%"` as the last whitespace-separated token → `Some(45.0)`.
fn trailing_percent(text: &str) -> Option<f64> {
    let token = text.split_whitespace().next_back()?;
    let number = token.strip_suffix('%')?;
    let v = number.parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_percent_needs_a_percent_sign() {
        assert_eq!(trailing_percent("45.0%"), Some(45.0));
        assert_eq!(trailing_percent("2.5 mL 45.5%"), Some(45.5));
        assert_eq!(trailing_percent("45.0"), None);
        assert_eq!(trailing_percent("%"), None);
        assert_eq!(trailing_percent(""), None);
        assert_eq!(trailing_percent("nan%"), None);
    }

    #[test]
    fn detailed_reports_first_bad_field() {
        let err = parse_detailed("1,2,x,4,5,6").unwrap_err();
        assert_eq!(
            err,
            ParseError::NotANumber {
                index: 2,
                name: "remaining",
                value: "x".to_string()
            }
        );
    }
}
