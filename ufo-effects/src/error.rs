//! Error types for the effect catalog

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Effects file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Effects JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("effect name cannot be empty")]
    EmptyName,

    #[error("Effect name must contain only letters, numbers, and underscores")]
    InvalidName(String),

    #[error("Effect '{0}' already exists")]
    AlreadyExists(String),

    #[error("Effect '{0}' not found")]
    NotFound(String),

    /// Built-in effects cannot be deleted
    #[error("Cannot delete seed effect '{0}'. Only custom effects can be deleted.")]
    SeedEffect(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
