//! Pump state and the pure reducer that reconciles it with device reports.
//!
//! `reduce` is the only place state changes. The I/O shell (`PumpSession`)
//! performs writes first and then feeds the outcome in as an `Input`, so the
//! whole state machine can be exercised without a transport.
//!
//! ```text
//!   Disconnected ──Connected──▶ Idle ──DispenseSent / STATUS:DISPENSING──▶ Dispensing
//!        ▲                       ▲                                            │
//!        └────Disconnected───────┴──── DISPENSE_COMPLETE / _CANCELLED, ◀──────┘
//!                                      STATUS:IDLE|CANCELLED|ERROR
//! ```

use crate::event::EventKind;
use crate::protocol::{DispenseRequest, format_decimal};
use crate::report::{DeviceStatus, Report};
use crate::util::{clamp_percent, non_negative};

/// Status line shown before anything has happened.
pub const READY: &str = "Ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseState {
    Idle,
    Dispensing,
}

/// Combined state. Dispensing implies connected by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpState {
    #[default]
    Disconnected,
    Idle,
    Dispensing,
}

impl PumpState {
    pub fn connection_state(self) -> ConnectionState {
        match self {
            PumpState::Disconnected => ConnectionState::Disconnected,
            PumpState::Idle | PumpState::Dispensing => ConnectionState::Connected,
        }
    }

    pub fn dispense_state(self) -> DispenseState {
        match self {
            PumpState::Dispensing => DispenseState::Dispensing,
            PumpState::Disconnected | PumpState::Idle => DispenseState::Idle,
        }
    }

    pub fn is_connected(self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn is_dispensing(self) -> bool {
        self == PumpState::Dispensing
    }
}

/// Latest detailed progress reading. Replaced wholesale, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub percent: f64,
    pub dispensed_ml: f64,
    pub remaining_ml: f64,
    pub elapsed_min: f64,
    pub eta_min: f64,
    pub rate_ml_min: f64,
}

impl ProgressSnapshot {
    pub const ZERO: Self = Self {
        percent: 0.0,
        dispensed_ml: 0.0,
        remaining_ml: 0.0,
        elapsed_min: 0.0,
        eta_min: 0.0,
        rate_ml_min: 0.0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Percent clamped to `[0, 100]`, every other field floored at 0.
    pub fn sanitized(self) -> Self {
        Self {
            percent: clamp_percent(self.percent),
            dispensed_ml: non_negative(self.dispensed_ml),
            remaining_ml: non_negative(self.remaining_ml),
            elapsed_min: non_negative(self.elapsed_min),
            eta_min: non_negative(self.eta_min),
            rate_ml_min: non_negative(self.rate_ml_min),
        }
    }
}

/// Everything the reducer consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// The link opened and settled.
    Connected { port: String },
    /// The link was closed by the user (`reason: None`) or failed.
    Disconnected { reason: Option<String> },
    /// `DISPENSE` was written.
    DispenseSent(DispenseRequest),
    /// `CANCEL` was written.
    CancelSent,
    Report(Report),
}

/// Read-only view of one pump, as the presentation layer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpModel {
    pub state: PumpState,
    pub port: Option<String>,
    pub snapshot: ProgressSnapshot,
    /// What a progress bar shows; outlives the snapshot reset at the end of a cycle.
    pub display_percent: f64,
    pub status_text: String,
}

impl Default for PumpModel {
    fn default() -> Self {
        Self {
            state: PumpState::Disconnected,
            port: None,
            snapshot: ProgressSnapshot::ZERO,
            display_percent: 0.0,
            status_text: READY.to_string(),
        }
    }
}

impl PumpModel {
    /// Apply one input in place, returning the event it produced, if any.
    pub fn apply(&mut self, input: &Input) -> Option<EventKind> {
        match input {
            Input::Connected { port } => {
                if self.state.is_connected() {
                    return None;
                }
                self.state = PumpState::Idle;
                self.port = Some(port.clone());
                self.reset_progress(0.0);
                self.status_text = READY.to_string();
                Some(EventKind::Connect { port: port.clone() })
            }
            Input::Disconnected { reason } => {
                if !self.state.is_connected() {
                    return None;
                }
                self.state = PumpState::Disconnected;
                self.port = None;
                self.reset_progress(0.0);
                self.status_text = READY.to_string();
                Some(EventKind::Disconnect {
                    reason: reason.clone(),
                })
            }
            Input::DispenseSent(req) => {
                if self.state != PumpState::Idle {
                    return None;
                }
                // Optimistic: the device confirms (or refutes) via later reports.
                self.state = PumpState::Dispensing;
                self.reset_progress(0.0);
                self.status_text = format!(
                    "Dispensing {} mL at {} mL/min",
                    format_decimal(req.volume_ml()),
                    format_decimal(req.rate_ml_min())
                );
                Some(EventKind::DispenseStart {
                    request: Some(*req),
                })
            }
            Input::CancelSent => {
                if !self.state.is_dispensing() {
                    return None;
                }
                self.status_text = "Cancel requested".to_string();
                Some(EventKind::DispenseCancel { confirmed: false })
            }
            Input::Report(report) => self.apply_report(report),
        }
    }

    fn apply_report(&mut self, report: &Report) -> Option<EventKind> {
        if !self.state.is_connected() {
            return None;
        }
        match report {
            Report::StatusDispensing(raw) => {
                self.status_text = format!("Dispensing: {raw}");
                if self.state == PumpState::Idle {
                    self.state = PumpState::Dispensing;
                    return Some(EventKind::DispenseStart { request: None });
                }
                None
            }
            Report::Status(status) => {
                self.status_text = format!("Status: {}", status.as_str());
                if !(self.state.is_dispensing() && status.ends_dispense()) {
                    return None;
                }
                self.state = PumpState::Idle;
                self.reset_progress(0.0);
                Some(match status {
                    DeviceStatus::Cancelled => EventKind::DispenseCancel { confirmed: true },
                    other => EventKind::DispenseAbort {
                        status: other.as_str().to_string(),
                    },
                })
            }
            Report::ProgressDetailed(snapshot) => {
                if !self.state.is_dispensing() {
                    return None;
                }
                self.snapshot = snapshot.sanitized();
                self.display_percent = self.snapshot.percent;
                self.status_text = format!("Progress: {:.1}%", self.snapshot.percent);
                None
            }
            Report::Progress { percent, text } => {
                self.status_text = format!("Progress: {text}");
                if let Some(p) = percent {
                    self.display_percent = clamp_percent(*p);
                }
                None
            }
            Report::DispenseFinished { cancelled } => {
                self.state = PumpState::Idle;
                if *cancelled {
                    self.reset_progress(0.0);
                    self.status_text = "Dispense Cancelled".to_string();
                    Some(EventKind::DispenseCancel { confirmed: true })
                } else {
                    self.reset_progress(100.0);
                    self.status_text = "Dispense Complete".to_string();
                    Some(EventKind::DispenseComplete)
                }
            }
            Report::Malformed { .. } | Report::Unrecognized(_) => None,
        }
    }

    fn reset_progress(&mut self, display_percent: f64) {
        self.snapshot = ProgressSnapshot::ZERO;
        self.display_percent = display_percent;
    }
}

/// Pure reducer: `(state, input) -> (state', event)`.
pub fn reduce(model: &PumpModel, input: &Input) -> (PumpModel, Option<EventKind>) {
    let mut next = model.clone();
    let event = next.apply(input);
    (next, event)
}
