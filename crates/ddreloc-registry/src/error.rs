//! Registry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate event: {0}")]
    DuplicateEvent(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),

    #[error("Core error: {0}")]
    Core(#[from] ddreloc_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
