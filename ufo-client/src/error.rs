//! Error types for the device client

use thiserror::Error;

/// Errors returned when talking to the device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Connection, timeout or body read failure
    #[error("UFO request failed: {0}")]
    Network(String),

    /// The device answered with something other than 200
    #[error("UFO returned status {code}: {body}")]
    Status { code: u16, body: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
