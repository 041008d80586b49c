#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Presentation model for pump state.
//!
//! Everything here is a pure function of the read-only views `pump_core`
//! exposes (`PumpModel`, `PumpRow`). Nothing in this crate holds state or
//! talks to a device; front ends render these strings however they like.
use pump_core::{ProgressSnapshot, PumpModel, PumpState};
use serde::Serialize;

pub mod table;

pub use table::render_table;

/// `[##########----------]  50.0%`
pub fn render_progress_bar(percent: f64, width: usize) -> String {
    let p = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let width = width.max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((p / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!(
        "[{}{}] {:>5.1}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        p
    )
}

/// Labels for the detailed progress panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotLabels {
    pub dispensed: String,
    pub remaining: String,
    pub elapsed: String,
    pub eta: String,
    pub rate: String,
}

impl From<&ProgressSnapshot> for SnapshotLabels {
    fn from(s: &ProgressSnapshot) -> Self {
        Self {
            dispensed: format!("Dispensed: {:.2} mL", s.dispensed_ml),
            remaining: format!("Remaining: {:.2} mL", s.remaining_ml),
            elapsed: format!("Elapsed: {:.1} min", s.elapsed_min),
            eta: format!("ETA: {:.1} min", s.eta_min),
            rate: format!("Current: {:.1} mL/min", s.rate_ml_min),
        }
    }
}

impl SnapshotLabels {
    pub fn lines(&self) -> [&str; 5] {
        [
            self.dispensed.as_str(),
            self.remaining.as_str(),
            self.elapsed.as_str(),
            self.eta.as_str(),
            self.rate.as_str(),
        ]
    }
}

/// `Pump Control - <name> (Connected) - Dispensing`
pub fn window_title(name: &str, state: PumpState) -> String {
    let status = if state.is_connected() {
        "Connected"
    } else {
        "Disconnected"
    };
    let dispensing = if state.is_dispensing() {
        " - Dispensing"
    } else {
        ""
    };
    format!("Pump Control - {name} ({status}){dispensing}")
}

/// Serializable view of one pump, for `--json` output and status lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpView {
    pub name: String,
    pub state: &'static str,
    pub port: Option<String>,
    pub status: String,
    pub percent: f64,
    pub labels: SnapshotLabels,
}

impl PumpView {
    pub fn new(name: &str, model: &PumpModel) -> Self {
        Self {
            name: name.to_string(),
            state: state_name(model.state),
            port: model.port.clone(),
            status: model.status_text.clone(),
            percent: model.display_percent,
            labels: SnapshotLabels::from(&model.snapshot),
        }
    }

    /// One line for a terminal: title, bar and status text.
    pub fn summary(&self, bar_width: usize) -> String {
        format!(
            "{} {} {}",
            self.name,
            render_progress_bar(self.percent, bar_width),
            self.status
        )
    }
}

/// Stable lowercase state name.
pub fn state_name(state: PumpState) -> &'static str {
    match state {
        PumpState::Disconnected => "disconnected",
        PumpState::Idle => "idle",
        PumpState::Dispensing => "dispensing",
    }
}
