//! Test doubles for pump_core.
//!
//! `MockConnector` stands in for the serial transport: each port is a
//! scripted device whose outbound lines are recorded and whose inbound
//! lines are pushed by the test.
use crossbeam_channel as xch;
use pump_traits::{Connector, LineReader, LineWriter, Link};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long a mock read waits before reporting "no line yet".
const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(5);

enum Inbound {
    Line(String),
    HangUp,
}

#[derive(Default)]
struct PortState {
    written: Vec<String>,
    inbound: Option<xch::Sender<Inbound>>,
    replies: HashMap<String, Vec<String>>,
    fail_open: bool,
    fail_write: bool,
    opened: usize,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    ports: Arc<Mutex<HashMap<String, PortState>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn ports(&self) -> MutexGuard<'_, HashMap<String, PortState>> {
        self.ports.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make `open(port)` fail.
    pub fn fail_open(&self, port: &str) {
        self.ports().entry(port.to_string()).or_default().fail_open = true;
    }

    /// Make writes on `port` fail (or succeed again).
    pub fn fail_write(&self, port: &str, fail: bool) {
        self.ports().entry(port.to_string()).or_default().fail_write = fail;
    }

    /// Lines the device answers with whenever `command` is written.
    pub fn respond(&self, port: &str, command: &str, lines: &[&str]) {
        self.ports()
            .entry(port.to_string())
            .or_default()
            .replies
            .insert(
                command.to_string(),
                lines.iter().map(|s| (*s).to_string()).collect(),
            );
    }

    /// Inject a line as if the device sent it. Returns false when the port is not open.
    pub fn push_line(&self, port: &str, line: &str) -> bool {
        self.send(port, Inbound::Line(line.to_string()))
    }

    /// Simulate the device going away: the reader sees EOF.
    pub fn hang_up(&self, port: &str) -> bool {
        self.send(port, Inbound::HangUp)
    }

    fn send(&self, port: &str, item: Inbound) -> bool {
        self.ports()
            .get(port)
            .and_then(|p| p.inbound.as_ref())
            .is_some_and(|tx| tx.send(item).is_ok())
    }

    /// Every line written to `port`, oldest first.
    pub fn written(&self, port: &str) -> Vec<String> {
        self.ports()
            .get(port)
            .map(|p| p.written.clone())
            .unwrap_or_default()
    }

    /// How many times `port` was opened successfully.
    pub fn opened(&self, port: &str) -> usize {
        self.ports().get(port).map_or(0, |p| p.opened)
    }
}

impl Connector for MockConnector {
    fn open(&self, port: &str, _baud: u32) -> Result<Link, BoxError> {
        let mut ports = self.ports();
        let state = ports.entry(port.to_string()).or_default();
        if state.fail_open {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such port {port}"),
            )));
        }
        let (tx, rx) = xch::unbounded();
        state.inbound = Some(tx);
        state.opened += 1;
        Ok(Link {
            writer: Box::new(MockWriter {
                port: port.to_string(),
                ports: self.ports.clone(),
            }),
            reader: Box::new(MockReader { rx }),
        })
    }
}

struct MockWriter {
    port: String,
    ports: Arc<Mutex<HashMap<String, PortState>>>,
}

impl LineWriter for MockWriter {
    fn write_line(&mut self, line: &str) -> Result<(), BoxError> {
        let mut ports = self
            .ports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = ports.entry(self.port.clone()).or_default();
        if state.fail_write {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "write failed",
            )));
        }
        state.written.push(line.to_string());
        if let (Some(replies), Some(tx)) = (state.replies.get(line), state.inbound.as_ref()) {
            for r in replies {
                let _ = tx.send(Inbound::Line(r.clone()));
            }
        }
        Ok(())
    }
}

struct MockReader {
    rx: xch::Receiver<Inbound>,
}

impl LineReader for MockReader {
    fn read_line(&mut self) -> Result<Option<String>, BoxError> {
        match self.rx.recv_timeout(MOCK_READ_TIMEOUT) {
            Ok(Inbound::Line(l)) => Ok(Some(l)),
            Ok(Inbound::HangUp) | Err(xch::RecvTimeoutError::Disconnected) => Err(Box::new(
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"),
            )),
            Err(xch::RecvTimeoutError::Timeout) => Ok(None),
        }
    }
}
