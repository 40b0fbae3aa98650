//! Reference server for the caption exchange.
//!
//! Accepts connections, reads one image per connection, hands it to a
//! [`Captioner`] and writes the caption back. Inference itself is out of
//! scope; plug in any captioner.

pub mod captioner;
pub mod config;
pub mod error;
pub mod server;

pub use captioner::{Captioner, CaptionerError, CommandCaptioner, FixedCaptioner};
pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{CaptionServer, ExchangeSummary, handle_connection};
