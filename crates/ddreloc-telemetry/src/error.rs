//! Telemetry error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for TelemetryError {
    fn from(e: prometheus::Error) -> Self {
        TelemetryError::Metrics(e.to_string())
    }
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
