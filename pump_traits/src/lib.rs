//! Hardware-facing traits shared across the pump stack.
//!
//! The session layer only ever talks to a pump through these traits, so the
//! serial implementation in `pump_hardware` and the scripted doubles used in
//! tests are interchangeable.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Write half of an open pump link.
pub trait LineWriter: Send {
    /// Write `line` followed by a single `\n` and flush.
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Read half of an open pump link.
///
/// - `Ok(Some(line))`: one complete line, terminator stripped
/// - `Ok(None)`: nothing complete arrived within the read timeout
/// - `Err(_)`: the link failed or reached EOF; the caller must stop reading
pub trait LineReader: Send {
    fn read_line(&mut self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Both halves of an opened connection. Dropping them closes the link.
pub struct Link {
    pub writer: Box<dyn LineWriter>,
    pub reader: Box<dyn LineReader>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens links to named ports.
pub trait Connector: Send + Sync {
    fn open(
        &self,
        port: &str,
        baud: u32,
    ) -> Result<Link, Box<dyn std::error::Error + Send + Sync>>;
}
