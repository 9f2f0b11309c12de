//! Inversion error types.

use crate::solver::SolverError;
use thiserror::Error;

/// Fatal failure of a linear solve, located in the schedule.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Numerical failure in cluster {cluster}, stage {stage}, iteration {iteration}: {reason}")]
pub struct NumericalError {
    pub stage: usize,
    pub iteration: usize,
    pub cluster: usize,
    pub reason: SolverError,
}

#[derive(Debug, Error)]
pub enum InversionError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Numerical(#[from] NumericalError),

    #[error("Invalid location: {0}")]
    Location(#[from] ddreloc_core::CoreError),
}

pub type InversionResult<T> = Result<T, InversionError>;
