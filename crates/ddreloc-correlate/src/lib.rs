//! Waveform cross-correlation for double-difference relocation.
//!
//! For every event pair sharing a pick at a station, the picked phase is
//! windowed on each configured component, bandpassed, and cross-correlated.
//! Components that correlate well enough are combined into one
//! `DifferentialTime` weighted by the combined coefficient.

pub mod config;
pub mod correlator;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod xcorr;

pub use config::CorrelationConfig;
pub use correlator::{
    candidate_units, CandidateLimits, CorrelationOutput, CorrelationStats, CorrelationUnit,
    Correlator, SkipReason,
};
pub use diagnostics::{DiagnosticRecord, DiagnosticSink, JsonDiagnosticSink, MemoryDiagnosticSink};
pub use error::{CorrelateError, CorrelateResult};
pub use filter::{Bandpass, Biquad};
pub use xcorr::{normalized_xcorr, refine_peak, Peak};
