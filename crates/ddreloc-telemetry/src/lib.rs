//! Prometheus metrics and structured logging for ddreloc.
//!
//! - Prometheus counters for loaded data, observations and inversion progress
//! - Structured logging with tracing (JSON in production)
//! - End-of-run summary built from the collected metrics

pub mod error;
pub mod logging;
pub mod metrics;
pub mod summary;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use summary::RunSummary;
