//! Client side of the caption exchange.
//!
//! A [`TransferController`] owns one client instance's state: the last
//! connectivity probe and a single session slot. Each send creates a
//! [`TransferSession`] that opens its own connection, walks through the
//! [`SessionState`] machine and reports back on the event channel.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod probe;
pub mod session;
pub mod state;
pub mod ui;

pub use config::ClientConfig;
pub use controller::{SessionHandle, TransferController};
pub use error::{ErrorKind, InputError, Stage, TransferError};
pub use events::{Controls, Outcome, TransferEvent};
pub use probe::{ProbeReport, probe};
pub use session::{SessionReport, TransferSession};
pub use state::SessionState;
pub use ui::{CaptureError, DisplaySurface, ImageSource, present, run_presenter};
