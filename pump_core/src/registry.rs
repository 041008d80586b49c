//! Registry of pump sessions with bulk operations and a display-only table.
//!
//! Sessions are keyed by `PumpId` and kept in insertion order. The registry
//! never mutates session state from events; `on_event` only updates the
//! `PumpRow` view and the system log.

use std::collections::HashMap;
use std::sync::Arc;

use pump_traits::{Clock, Connector};

use crate::config::SessionSettings;
use crate::error::{PumpError, Result};
use crate::event::{EventKind, PumpEvent, PumpId};
use crate::logger::{CommLog, Logger};
use crate::protocol::format_decimal;
use crate::session::PumpSession;
use crate::state::PumpState;

/// One line of the pump table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpRow {
    pub name: String,
    pub status: String,
    pub port: String,
    pub activity: String,
}

/// Result of `start_all` / `stop_all`.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<PumpId>,
    pub failed: Vec<(PumpId, PumpError)>,
}

impl BulkOutcome {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PumpRegistry {
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    sessions: HashMap<PumpId, PumpSession>,
    order: Vec<PumpId>,
    rows: HashMap<PumpId, PumpRow>,
    system_log: CommLog,
    added: usize,
    pending: Vec<PumpEvent>,
}

impl PumpRegistry {
    pub fn new(
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        let system_log = CommLog::new(settings.comm_log_lines);
        Self {
            connector,
            clock,
            settings,
            sessions: HashMap::new(),
            order: Vec::new(),
            rows: HashMap::new(),
            system_log,
            added: 0,
            pending: Vec::new(),
        }
    }

    /// Create a disconnected session. A blank name becomes `Pump <n>`.
    pub fn add(&mut self, name: &str) -> PumpId {
        self.added += 1;
        let name = match name.trim() {
            "" => format!("Pump {}", self.added),
            n => n.to_string(),
        };
        let session = PumpSession::new(
            name.clone(),
            self.connector.clone(),
            self.clock.clone(),
            self.settings.clone(),
        );
        let id = session.id();
        self.rows.insert(
            id,
            PumpRow {
                name: name.clone(),
                status: status_label(PumpState::Disconnected).to_string(),
                port: String::new(),
                activity: "Ready".to_string(),
            },
        );
        self.sessions.insert(id, session);
        self.order.push(id);
        self.system_log.log(&format!("Added pump: {name}"));
        tracing::info!(pump = %id, name = %name, "pump added");
        id
    }

    /// Close the session and drop it.
    pub fn remove(&mut self, id: PumpId) -> Result<()> {
        let mut session = self
            .sessions
            .remove(&id)
            .ok_or(PumpError::UnknownPump(id))?;
        self.order.retain(|x| *x != id);
        session.close();
        for ev in session.take_events() {
            self.on_event(&ev);
            self.pending.push(ev);
        }
        Ok(())
    }

    pub fn get(&self, id: PumpId) -> Result<&PumpSession> {
        self.sessions.get(&id).ok_or(PumpError::UnknownPump(id))
    }

    pub fn get_mut(&mut self, id: PumpId) -> Result<&mut PumpSession> {
        self.sessions.get_mut(&id).ok_or(PumpError::UnknownPump(id))
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<PumpId> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn any_dispensing(&self) -> bool {
        self.sessions.values().any(|s| s.state().is_dispensing())
    }

    /// Start every idle pump with its own parameters. Failures do not stop the sweep.
    pub fn start_all(&mut self) -> BulkOutcome {
        let mut out = BulkOutcome::default();
        for id in self.order.clone() {
            let Some(session) = self.sessions.get_mut(&id) else {
                continue;
            };
            if session.state() != PumpState::Idle {
                continue;
            }
            match session.start_dispense_configured() {
                Ok(()) => out.succeeded.push(id),
                Err(e) => {
                    self.system_log
                        .log(&format!("Failed to start {}: {e}", session.name()));
                    tracing::warn!(pump = %id, error = %e, "start failed");
                    out.failed.push((id, e));
                }
            }
        }
        self.system_log.log(&format!(
            "Start all: {} started, {} failed",
            out.succeeded.len(),
            out.failed.len()
        ));
        self.collect_events();
        out
    }

    /// Cancel every dispensing pump.
    pub fn stop_all(&mut self) -> BulkOutcome {
        let mut out = BulkOutcome::default();
        for id in self.order.clone() {
            let Some(session) = self.sessions.get_mut(&id) else {
                continue;
            };
            if !session.state().is_dispensing() {
                continue;
            }
            match session.cancel_dispense() {
                Ok(()) => out.succeeded.push(id),
                Err(e) => {
                    self.system_log
                        .log(&format!("Failed to stop {}: {e}", session.name()));
                    tracing::warn!(pump = %id, error = %e, "stop failed");
                    out.failed.push((id, e));
                }
            }
        }
        self.system_log.log(&format!(
            "Stop all: {} stopped, {} failed",
            out.succeeded.len(),
            out.failed.len()
        ));
        self.collect_events();
        out
    }

    /// Poll every session and route their events. Returns the events, oldest first.
    pub fn poll(&mut self) -> Vec<PumpEvent> {
        for id in &self.order {
            if let Some(session) = self.sessions.get_mut(id) {
                session.poll();
            }
        }
        self.collect_events();
        std::mem::take(&mut self.pending)
    }

    /// Disconnect every pump.
    pub fn shutdown(&mut self) {
        for id in &self.order {
            if let Some(session) = self.sessions.get_mut(id) {
                session.disconnect();
            }
        }
        self.system_log.log("All pumps disconnected");
        self.collect_events();
    }

    /// Update the table and the system log for one event.
    pub fn on_event(&mut self, event: &PumpEvent) {
        let id = event.pump_id;
        if matches!(event.kind, EventKind::Close) {
            if let Some(row) = self.rows.remove(&id) {
                self.system_log.log(&format!("Removed pump: {}", row.name));
            }
            return;
        }
        let state = self.sessions.get(&id).map(PumpSession::state);
        let Some(row) = self.rows.get_mut(&id) else {
            return;
        };
        let message = match &event.kind {
            EventKind::Connect { port } => {
                row.port.clone_from(port);
                row.activity = "Ready".to_string();
                format!("{} connected to {port}", row.name)
            }
            EventKind::Disconnect { reason } => {
                row.port.clear();
                row.activity = "Ready".to_string();
                match reason {
                    Some(r) => format!("{} disconnected: {r}", row.name),
                    None => format!("{} disconnected", row.name),
                }
            }
            EventKind::Rename { old_name, new_name } => {
                row.name.clone_from(new_name);
                format!("Renamed {old_name} to {new_name}")
            }
            EventKind::DispenseStart { request } => {
                row.activity = match request {
                    Some(req) => format!("Dispensing {}mL", format_decimal(req.volume_ml())),
                    None => "Dispensing".to_string(),
                };
                format!("{}: dispense started", row.name)
            }
            EventKind::DispenseComplete => {
                row.activity = "Complete".to_string();
                format!("{}: dispense complete", row.name)
            }
            EventKind::DispenseCancel { confirmed } => {
                row.activity = "Cancelled".to_string();
                if *confirmed {
                    format!("{}: dispense cancelled", row.name)
                } else {
                    format!("{}: cancel requested", row.name)
                }
            }
            EventKind::DispenseAbort { status } => {
                row.activity = format!("Stopped ({status})");
                format!("{}: dispense stopped, device status {status}", row.name)
            }
            EventKind::Close => return,
        };
        if let Some(state) = state {
            row.status = status_label(state).to_string();
        }
        self.system_log.log(&message);
    }

    /// Table rows in insertion order.
    pub fn rows(&self) -> Vec<(PumpId, &PumpRow)> {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(id).map(|r| (*id, r)))
            .collect()
    }

    pub fn system_log(&self) -> &CommLog {
        &self.system_log
    }

    pub fn clear_system_log(&mut self) {
        self.system_log.clear();
    }

    fn collect_events(&mut self) {
        let mut batch = Vec::new();
        for id in &self.order {
            if let Some(session) = self.sessions.get_mut(id) {
                batch.extend(session.take_events());
            }
        }
        for ev in &batch {
            self.on_event(ev);
        }
        self.pending.extend(batch);
    }
}

/// Label for the Status column.
pub fn status_label(state: PumpState) -> &'static str {
    match state {
        PumpState::Disconnected => "Disconnected",
        PumpState::Idle => "Connected",
        PumpState::Dispensing => "Dispensing",
    }
}
