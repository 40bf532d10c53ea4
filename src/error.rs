//! Error types shared across the crate.
//!
//! Handler failures, REST failures and configuration problems all funnel into
//! [`Error`] so the run loop can apply a single policy to them.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A REST call failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The gateway could not be started or failed fatally.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Log directory or file could not be prepared.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the Discord REST API.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-success status from Discord.
    #[error("Discord API error {status} on {route}: {body}")]
    Api {
        status: u16,
        body: String,
        route: String,
    },
    /// Transport / network error.
    #[error("HTTP transport error: {0}")]
    Transport(String),
    /// Serialisation error.
    #[error("Serialisation error: {0}")]
    Serde(String),
}

impl HttpError {
    /// HTTP status for API errors, `None` for transport/serde failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
