//! Error types for the SDK facade

use thiserror::Error;

use ufo_client::ClientError;
use ufo_effects::CatalogError;

/// Errors returned by [`UfoSystem`](crate::UfoSystem) operations
///
/// Validation messages are written for the end user and returned verbatim.
#[derive(Debug, Error)]
pub enum SdkError {
    /// A request failed validation; nothing was sent
    #[error("{0}")]
    Validation(String),

    #[error("UFO communication error: {0}")]
    Device(#[from] ClientError),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("Effect '{0}' not found. Use listEffects to see available effects.")]
    EffectNotFound(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SdkError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SdkError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
