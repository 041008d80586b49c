use thiserror::Error;

use crate::event::PumpId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PumpError {
    /// Port open or write failed; the session is (or returns to) Disconnected.
    #[error("connection error: {0}")]
    Connection(String),
    /// Volume/rate input rejected before anything was written.
    #[error("invalid input: {0}")]
    Validation(String),
    /// A progress payload decoded directly with `report::parse_detailed`.
    /// Lines read from a link never surface here; they arrive as
    /// `Report::Malformed` and are only logged.
    #[error("malformed report: {0}")]
    Parse(#[from] ParseError),
    /// Operation not allowed in the current session state.
    #[error("invalid state: {0}")]
    State(String),
    #[error("unknown pump {0}")]
    UnknownPump(PumpId),
}

/// Why a `PROGRESS_DETAILED` payload was rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected at least {expected} fields, got {got}")]
    TooFewFields { expected: usize, got: usize },
    #[error("field {index} ({name}) is not a number: {value:?}")]
    NotANumber {
        index: usize,
        name: &'static str,
        value: String,
    },
    #[error("field {index} ({name}) is not finite")]
    NotFinite { index: usize, name: &'static str },
}

pub type Result<T> = std::result::Result<T, PumpError>;
