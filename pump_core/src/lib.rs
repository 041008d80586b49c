#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Syringe-pump control core (transport-agnostic).
//!
//! All device I/O goes through the `pump_traits` connector traits, so the
//! serial implementation and the scripted mocks are interchangeable.
//!
//! ## Architecture
//!
//! - **Protocol**: outbound command encoding (`protocol`)
//! - **Reports**: inbound line decoding into a closed `Report` enum (`report`)
//! - **State**: `PumpModel` and the pure reducer (`state`)
//! - **Session**: per-pump I/O shell around the reducer (`session`)
//! - **Reader**: background line reader with a bounded queue (`reader`)
//! - **Registry**: many pumps, bulk start/stop, table rows (`registry`)
//! - **Runner**: the control-loop cadence (`runner`)
//!
//! One control thread owns every session. Each connected pump adds exactly
//! one reader thread, which only decodes lines and queues them.

pub mod config;
pub mod conversions;
pub mod error;
pub mod event;
pub mod hw_error;
pub mod logger;
pub mod mocks;
pub mod protocol;
pub mod reader;
pub mod registry;
pub mod report;
pub mod runner;
pub mod session;
pub mod state;
pub mod util;

pub use config::{RunnerSettings, SessionSettings};
pub use error::{ParseError, PumpError, Result};
pub use event::{EventKind, PumpEvent, PumpId};
pub use logger::{CommLog, Logger};
pub use protocol::{Command, DispenseRequest};
pub use reader::Backpressure;
pub use registry::{BulkOutcome, PumpRegistry, PumpRow};
pub use report::{DeviceStatus, Report};
pub use runner::{Pollable, RunOutcome, Runner, Tick};
pub use session::PumpSession;
pub use state::{
    ConnectionState, DispenseState, Input, ProgressSnapshot, PumpModel, PumpState, reduce,
};
