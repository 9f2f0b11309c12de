//! Correlation diagnostics.
//!
//! Rendering is left to external tools; the correlator only hands records to
//! a sink.

use crate::error::CorrelateResult;
use ddreloc_core::{EventId, Phase};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One correlated component with its inputs and correlation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub event_a: EventId,
    pub event_b: EventId,
    pub station: String,
    pub phase: Phase,
    pub channel: String,
    pub sampling_rate: f64,
    /// Lag in seconds of window B relative to window A.
    pub lag: f64,
    pub coefficient: f64,
    pub accepted: bool,
    pub correlation: Vec<f64>,
    pub window_a: Vec<f64>,
    pub window_b: Vec<f64>,
}

/// Receives diagnostic records from worker threads.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: DiagnosticRecord) -> CorrelateResult<()>;
}

/// Writes one JSON document per record.
pub struct JsonDiagnosticSink {
    dir: PathBuf,
    written: Mutex<usize>,
}

impl JsonDiagnosticSink {
    pub fn new(dir: impl Into<PathBuf>) -> CorrelateResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            written: Mutex::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> usize {
        *self.written.lock()
    }
}

impl DiagnosticSink for JsonDiagnosticSink {
    fn record(&self, record: DiagnosticRecord) -> CorrelateResult<()> {
        let name = format!(
            "{}-{}_{}_{}_{}.json",
            record.event_a, record.event_b, record.station, record.phase, record.channel
        );
        let path = self.dir.join(sanitize(&name));
        let json = serde_json::to_vec_pretty(&record)?;
        if let Err(e) = std::fs::write(&path, json) {
            warn!(?e, path = %path.display(), "Failed to write diagnostic record");
            return Err(e.into());
        }
        *self.written.lock() += 1;
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Default)]
pub struct MemoryDiagnosticSink {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemoryDiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn record(&self, record: DiagnosticRecord) -> CorrelateResult<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '_',
            c => c,
        })
        .collect()
}
