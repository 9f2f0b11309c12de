//! Correlator error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorrelateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Filter design failed: {0}")]
    Filter(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Registry error: {0}")]
    Registry(#[from] ddreloc_registry::RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CorrelateResult<T> = Result<T, CorrelateError>;
