//! ddreloc run orchestration.
//!
//! Wires the pipeline together:
//! - Catalog, station and waveform loading
//! - Catalog and cross-correlation differential times
//! - Pair linking into a neighbor graph
//! - Iterative relocation and refined catalog output
//! - Working-directory artifacts and restart

pub mod app;
pub mod config;
pub mod error;

pub use app::{Relocator, RelocatorBuilder, RunReport};
pub use config::{AppConfig, InputsConfig, RunConfig, VelocityConfig};
pub use error::{AppError, AppResult};
