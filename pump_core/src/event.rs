//! Pump identity and the events sessions emit for the registry.

use std::fmt;

use uuid::Uuid;

use crate::protocol::DispenseRequest;

/// Opaque pump identifier, unique per registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PumpId(Uuid);

impl PumpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PumpId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What happened to a pump.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Connect {
        port: String,
    },
    /// `reason` is set when the link failed rather than the user disconnecting.
    Disconnect {
        reason: Option<String>,
    },
    Rename {
        old_name: String,
        new_name: String,
    },
    /// `request` is `None` when the device reported dispensing on its own
    /// (e.g. after a reconnect) rather than in response to our command.
    DispenseStart {
        request: Option<DispenseRequest>,
    },
    DispenseComplete,
    /// `confirmed` is false when we sent CANCEL, true when the device
    /// reported the cycle cancelled.
    DispenseCancel {
        confirmed: bool,
    },
    /// Device stopped dispensing with a status other than cancelled.
    DispenseAbort {
        status: String,
    },
    Close,
}

impl EventKind {
    /// Stable event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::Connect { .. } => "connect",
            EventKind::Disconnect { .. } => "disconnect",
            EventKind::Rename { .. } => "rename",
            EventKind::DispenseStart { .. } => "dispense_start",
            EventKind::DispenseComplete => "dispense_complete",
            EventKind::DispenseCancel { .. } => "dispense_cancel",
            EventKind::DispenseAbort { .. } => "dispense_abort",
            EventKind::Close => "close",
        }
    }
}

/// `(event_type, pump_id, payload)` as delivered to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpEvent {
    pub pump_id: PumpId,
    pub kind: EventKind,
}

impl PumpEvent {
    pub fn new(pump_id: PumpId, kind: EventKind) -> Self {
        Self { pump_id, kind }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(PumpId::new(), PumpId::new());
    }

    #[test]
    fn event_names() {
        let id = PumpId::new();
        let ev = PumpEvent::new(id, EventKind::DispenseCancel { confirmed: true });
        assert_eq!(ev.event_type(), "dispense_cancel");
        assert_eq!(EventKind::Close.event_type(), "close");
    }
}
