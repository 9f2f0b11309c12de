//! Error types for ddreloc-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid pick: {0}")]
    InvalidPick(String),

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid hypocenter: {0}")]
    InvalidHypocenter(String),

    #[error("Invalid velocity model: {0}")]
    InvalidVelocityModel(String),

    #[error("Invalid iteration stage: {0}")]
    InvalidStage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
