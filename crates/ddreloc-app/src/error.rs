//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] ddreloc_core::CoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] ddreloc_registry::RegistryError),

    #[error("Correlation error: {0}")]
    Correlate(#[from] ddreloc_correlate::CorrelateError),

    #[error("Linker error: {0}")]
    Linker(#[from] ddreloc_linker::LinkerError),

    #[error("Inversion error: {0}")]
    Inversion(#[from] ddreloc_inversion::InversionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] ddreloc_persistence::PersistenceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] ddreloc_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
