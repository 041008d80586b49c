//! One pump: the I/O shell around the pure reducer in `state`.
//!
//! The session owns the write half of the link and the background reader.
//! Every state change goes through `PumpModel::apply`; the shell only
//! decides which `Input` to feed after performing (or failing) I/O.

use std::sync::Arc;

use pump_traits::{Clock, Connector, LineWriter};

use crate::config::SessionSettings;
use crate::error::{PumpError, Result};
use crate::event::{EventKind, PumpEvent, PumpId};
use crate::hw_error::{link_failure_text, map_hw_error, map_open_error};
use crate::logger::{CommLog, Logger};
use crate::protocol::{Command, DispenseRequest};
use crate::reader::{ReaderMsg, ReaderTask};
use crate::report::Report;
use crate::state::{Input, ProgressSnapshot, PumpModel, PumpState};

pub struct PumpSession {
    id: PumpId,
    name: String,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    model: PumpModel,
    params: DispenseRequest,
    writer: Option<Box<dyn LineWriter>>,
    reader: Option<ReaderTask>,
    events: Vec<PumpEvent>,
    comm: CommLog,
    last_report: Option<Report>,
}

impl std::fmt::Debug for PumpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("model", &self.model)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl PumpSession {
    pub fn new(
        name: impl Into<String>,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self::with_id(PumpId::new(), name, connector, clock, settings)
    }

    pub fn with_id(
        id: PumpId,
        name: impl Into<String>,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        let params = settings.default_request;
        let comm = CommLog::new(settings.comm_log_lines);
        Self {
            id,
            name: name.into(),
            connector,
            clock,
            settings,
            model: PumpModel::default(),
            params,
            writer: None,
            reader: None,
            events: Vec::new(),
            comm,
            last_report: None,
        }
    }

    pub fn id(&self) -> PumpId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &PumpModel {
        &self.model
    }

    pub fn state(&self) -> PumpState {
        self.model.state
    }

    pub fn port(&self) -> Option<&str> {
        self.model.port.as_deref()
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.model.snapshot
    }

    pub fn display_percent(&self) -> f64 {
        self.model.display_percent
    }

    pub fn status_text(&self) -> &str {
        &self.model.status_text
    }

    /// Volume/rate used by `start_dispense_configured`.
    pub fn params(&self) -> DispenseRequest {
        self.params
    }

    /// Most recent decoded report from the device, if any.
    pub fn last_report(&self) -> Option<&Report> {
        self.last_report.as_ref()
    }

    pub fn comm_log(&self) -> &CommLog {
        &self.comm
    }

    pub fn clear_comm_log(&mut self) {
        self.comm.clear();
    }

    /// Open `port`, wait out the device reset, and start the background reader.
    pub fn connect(&mut self, port: &str) -> Result<()> {
        let port = port.trim();
        if port.is_empty() {
            return Err(PumpError::Connection("no port selected".to_string()));
        }
        if let Some(current) = self.model.port.as_deref() {
            return Err(PumpError::State(format!("already connected to {current}")));
        }

        let link = self
            .connector
            .open(port, self.settings.baud)
            .map_err(|e| {
                let err = map_open_error(port, &*e);
                self.comm.log(&format!("Error: {err}"));
                tracing::warn!(pump = %self.id, port, error = %err, "connect failed");
                err
            })?;

        self.clock.sleep(self.settings.settle);

        self.writer = Some(link.writer);
        self.last_report = None;
        self.reader = Some(ReaderTask::spawn(
            link.reader,
            self.settings.queue_capacity,
            self.settings.backpressure,
            port.to_string(),
        ));
        self.comm.log(&format!("Connected to {port}"));
        tracing::info!(pump = %self.id, port, baud = self.settings.baud, "connected");
        self.apply(Input::Connected {
            port: port.to_string(),
        });
        Ok(())
    }

    /// Close the link. A second call is a no-op.
    ///
    /// The reader is detached, not joined: until its current read times out
    /// it still holds the read half, and a serial port opened exclusively
    /// may report busy to an immediate `connect` on the same port.
    pub fn disconnect(&mut self) {
        if !self.model.state.is_connected() {
            return;
        }
        self.force_disconnect(None);
    }

    fn force_disconnect(&mut self, reason: Option<String>) {
        self.writer = None;
        if let Some(reader) = self.reader.take() {
            reader.stop();
        }
        match &reason {
            Some(r) => {
                self.comm.log(&format!("Connection lost: {r}"));
                tracing::warn!(pump = %self.id, reason = %r, "link lost");
            }
            None => {
                self.comm.log("Disconnected");
                tracing::info!(pump = %self.id, "disconnected");
            }
        }
        self.apply(Input::Disconnected { reason });
    }

    /// Validate and send `DISPENSE:<volume>,<rate>`.
    pub fn start_dispense(&mut self, volume_ml: f64, rate_ml_min: f64) -> Result<()> {
        self.ensure_idle()?;
        let req = DispenseRequest::new(volume_ml, rate_ml_min)?;
        self.start_request(req)
    }

    /// Like `start_dispense`, from user-entered text.
    pub fn start_dispense_text(&mut self, volume: &str, rate: &str) -> Result<()> {
        self.ensure_idle()?;
        let req = DispenseRequest::parse(volume, rate)?;
        self.start_request(req)
    }

    /// Start with this session's own parameters.
    pub fn start_dispense_configured(&mut self) -> Result<()> {
        self.start_request(self.params)
    }

    pub fn start_request(&mut self, req: DispenseRequest) -> Result<()> {
        self.ensure_idle()?;
        self.send(Command::Dispense(req))?;
        // Optimistic: device reports reconcile later.
        self.apply(Input::DispenseSent(req));
        Ok(())
    }

    pub fn set_dispense_params(&mut self, volume_ml: f64, rate_ml_min: f64) -> Result<()> {
        self.params = DispenseRequest::new(volume_ml, rate_ml_min)?;
        Ok(())
    }

    /// Send `CANCEL` when dispensing; otherwise do nothing.
    pub fn cancel_dispense(&mut self) -> Result<()> {
        if !self.model.state.is_dispensing() {
            return Ok(());
        }
        self.send(Command::Cancel)?;
        self.apply(Input::CancelSent);
        Ok(())
    }

    /// Ask the device for its status. The answer arrives as a report.
    pub fn get_status(&mut self) -> Result<()> {
        if !self.model.state.is_connected() {
            return Err(PumpError::State("not connected".to_string()));
        }
        self.send(Command::Status)
    }

    /// Blank or unchanged names are ignored.
    pub fn rename(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || name == self.name {
            return;
        }
        let old_name = std::mem::replace(&mut self.name, name.to_string());
        tracing::info!(pump = %self.id, old = %old_name, new = %self.name, "renamed");
        self.emit(EventKind::Rename {
            old_name,
            new_name: self.name.clone(),
        });
    }

    /// Disconnect, then announce that this pump is going away.
    pub fn close(&mut self) {
        self.disconnect();
        self.emit(EventKind::Close);
    }

    /// Apply everything the reader has queued. Returns the number of reports applied.
    pub fn poll(&mut self) -> usize {
        let Some(reader) = self.reader.as_ref() else {
            return 0;
        };
        let mut applied = 0;
        for msg in reader.drain() {
            match msg {
                ReaderMsg::Report { raw, report } => {
                    self.comm.received(&raw);
                    log_report(self.id, &raw, &report);
                    self.apply(Input::Report(report.clone()));
                    self.last_report = Some(report);
                    applied += 1;
                }
                ReaderMsg::Closed(reason) => {
                    self.force_disconnect(Some(reason));
                    break;
                }
            }
        }
        applied
    }

    /// Drain queued events, oldest first.
    pub fn take_events(&mut self) -> Vec<PumpEvent> {
        std::mem::take(&mut self.events)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.model.state {
            PumpState::Idle => Ok(()),
            PumpState::Disconnected => Err(PumpError::State("not connected".to_string())),
            PumpState::Dispensing => Err(PumpError::State("already dispensing".to_string())),
        }
    }

    fn send(&mut self, cmd: Command) -> Result<()> {
        let line = cmd.encode();
        let Some(writer) = self.writer.as_mut() else {
            return Err(PumpError::State("not connected".to_string()));
        };
        match writer.write_line(&line) {
            Ok(()) => {
                self.comm.sent(&line);
                tracing::debug!(pump = %self.id, line = %line, "sent");
                Ok(())
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                self.comm.log(&format!("Error sending {line}: {err}"));
                self.force_disconnect(Some(link_failure_text(&*e)));
                Err(err)
            }
        }
    }

    fn apply(&mut self, input: Input) {
        if let Some(kind) = self.model.apply(&input) {
            self.emit(kind);
        }
    }

    fn emit(&mut self, kind: EventKind) {
        tracing::debug!(pump = %self.id, event = kind.event_type(), "event");
        self.events.push(PumpEvent::new(self.id, kind));
    }
}

fn log_report(id: PumpId, raw: &str, report: &Report) {
    match report {
        Report::Malformed { error, .. } => {
            tracing::warn!(pump = %id, line = %raw, error = %error, "malformed progress report");
        }
        Report::Unrecognized(_) => {
            tracing::info!(pump = %id, line = %raw, "unrecognized report");
        }
        other => {
            tracing::trace!(pump = %id, kind = other.kind(), line = %raw, "report");
        }
    }
}
