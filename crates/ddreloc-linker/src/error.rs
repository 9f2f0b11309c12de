//! Linker error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

pub type LinkerResult<T> = Result<T, LinkerError>;
