//! Logs every social event a Discord account can see.
//!
//! Wire events from the gateway pass through [`state::ClientState`], which
//! pairs updates with the previously cached value, and are handed to an
//! [`handler::EventHandler`]. The handler shipped here,
//! [`logger::EventLogger`], writes one line per event to a console and a
//! rotating log file.
//!
//! The network client (`gateway`, `http`, `bot`) sits behind the default
//! `io` feature; everything else is plain data and formatting.

pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod identity;
pub mod logger;
pub mod logging;
pub mod state;
pub mod types;

#[cfg(feature = "io")]
pub mod bot;
#[cfg(feature = "io")]
pub mod gateway;
#[cfg(feature = "io")]
pub mod http;

pub use config::{AccountKind, Config};
pub use error::{Error, HttpError, Result};
pub use handler::{Event, EventHandler, Lookup};
pub use logger::EventLogger;
pub use logging::{LogConfig, LogContext, Logger};
pub use state::ClientState;
