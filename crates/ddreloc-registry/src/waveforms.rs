//! Waveform traces and random access by (event, station, channel).
//!
//! Trace files are JSON documents, one trace per file, laid out either flat or
//! one directory per event. `WaveformIndex` scans them once and then serves
//! traces on demand; `MemoryWaveformStore` holds traces directly.

use crate::error::{RegistryError, RegistryResult};
use chrono::{DateTime, Utc};
use ddreloc_core::{offset_seconds, seconds_between, EventId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Random access to event waveforms.
pub trait WaveformSource: Send + Sync {
    /// `Ok(None)` when no trace exists for the key.
    fn trace(&self, event: &EventId, station: &str, channel: &str) -> RegistryResult<Option<Trace>>;
}

/// Trace metadata without samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub event_id: String,
    pub station: String,
    pub channel: String,
    pub start_time: DateTime<Utc>,
    pub sampling_rate: f64,
    pub npts: usize,
}

/// Evenly sampled trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub event_id: String,
    pub station: String,
    pub channel: String,
    pub start_time: DateTime<Utc>,
    /// Samples per second.
    pub sampling_rate: f64,
    pub samples: Vec<f64>,
}

impl Trace {
    pub fn new(
        event_id: impl Into<String>,
        station: impl Into<String>,
        channel: impl Into<String>,
        start_time: DateTime<Utc>,
        sampling_rate: f64,
        samples: Vec<f64>,
    ) -> RegistryResult<Self> {
        let trace = Self {
            event_id: event_id.into(),
            station: station.into(),
            channel: channel.into(),
            start_time,
            sampling_rate,
            samples,
        };
        trace.validate()?;
        Ok(trace)
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if !self.sampling_rate.is_finite() || self.sampling_rate <= 0.0 {
            return Err(RegistryError::InvalidTrace(format!(
                "{}/{}/{}: sampling_rate {} must be > 0",
                self.event_id, self.station, self.channel, self.sampling_rate
            )));
        }
        if self.samples.iter().any(|s| !s.is_finite()) {
            return Err(RegistryError::InvalidTrace(format!(
                "{}/{}/{}: non-finite sample",
                self.event_id, self.station, self.channel
            )));
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        let trace: Self = serde_json::from_slice(&data)?;
        trace.validate()?;
        Ok(trace)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RegistryResult<()> {
        std::fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn header(&self) -> TraceHeader {
        TraceHeader {
            event_id: self.event_id.clone(),
            station: self.station.clone(),
            channel: self.channel.clone(),
            start_time: self.start_time,
            sampling_rate: self.sampling_rate,
            npts: self.samples.len(),
        }
    }

    pub fn delta(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        let n = self.samples.len().saturating_sub(1) as f64;
        offset_seconds(self.start_time, n * self.delta())
    }

    /// Index of the sample nearest to `time`. May be negative or past the end.
    pub fn sample_index(&self, time: DateTime<Utc>) -> i64 {
        (seconds_between(time, self.start_time) * self.sampling_rate).round() as i64
    }

    /// `len` samples starting at `start`, or `None` if any fall outside the trace.
    pub fn slice(&self, start: i64, len: usize) -> Option<&[f64]> {
        if start < 0 {
            return None;
        }
        let start = start as usize;
        let end = start.checked_add(len)?;
        self.samples.get(start..end)
    }
}

/// Traces held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryWaveformStore {
    traces: BTreeMap<(String, String, String), Trace>,
}

impl MemoryWaveformStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, trace: Trace) {
        let key = (
            trace.event_id.clone(),
            trace.station.clone(),
            trace.channel.clone(),
        );
        self.traces.insert(key, trace);
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

impl WaveformSource for MemoryWaveformStore {
    fn trace(&self, event: &EventId, station: &str, channel: &str) -> RegistryResult<Option<Trace>> {
        let key = (
            event.as_str().to_string(),
            station.to_string(),
            channel.to_string(),
        );
        Ok(self.traces.get(&key).cloned())
    }
}

/// One indexed trace file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub header: TraceHeader,
}

/// File-backed waveform index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveformIndex {
    entries: Vec<IndexEntry>,
    #[serde(skip)]
    lookup: BTreeMap<(String, String, String), usize>,
}

impl WaveformIndex {
    /// Scan files and directories (recursively) for `.json` trace files.
    ///
    /// Unreadable or malformed files are skipped with a warning. When two
    /// files carry the same key the first one found wins.
    pub fn build<P: AsRef<Path>>(roots: &[P]) -> RegistryResult<Self> {
        let mut files = Vec::new();
        for root in roots {
            collect_trace_files(root.as_ref(), &mut files)?;
        }
        files.sort();

        let mut index = Self::default();
        let mut skipped = 0usize;
        for path in files {
            match Trace::load(&path) {
                Ok(trace) => index.push(IndexEntry {
                    path,
                    header: trace.header(),
                }),
                Err(e) => {
                    skipped += 1;
                    warn!(path = %path.display(), error = %e, "Skipping unreadable trace file");
                }
            }
        }
        info!(traces = index.len(), skipped, "Waveform index built");
        Ok(index)
    }

    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        let stored: Self = serde_json::from_slice(&data)?;
        let mut index = Self::default();
        for entry in stored.entries {
            index.push(entry);
        }
        Ok(index)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RegistryResult<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    fn push(&mut self, entry: IndexEntry) {
        let key = (
            entry.header.event_id.clone(),
            entry.header.station.clone(),
            entry.header.channel.clone(),
        );
        if self.lookup.contains_key(&key) {
            debug!(path = %entry.path.display(), "Duplicate trace key ignored");
            return;
        }
        self.lookup.insert(key, self.entries.len());
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn header(&self, event: &EventId, station: &str, channel: &str) -> Option<&TraceHeader> {
        let key = (
            event.as_str().to_string(),
            station.to_string(),
            channel.to_string(),
        );
        self.lookup.get(&key).map(|&i| &self.entries[i].header)
    }
}

impl WaveformSource for WaveformIndex {
    fn trace(&self, event: &EventId, station: &str, channel: &str) -> RegistryResult<Option<Trace>> {
        let key = (
            event.as_str().to_string(),
            station.to_string(),
            channel.to_string(),
        );
        match self.lookup.get(&key) {
            Some(&i) => Trace::load(&self.entries[i].path).map(Some),
            None => Ok(None),
        }
    }
}

fn collect_trace_files(path: &Path, out: &mut Vec<PathBuf>) -> RegistryResult<()> {
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            collect_trace_files(&entry?.path(), out)?;
        }
    } else if path.extension().is_some_and(|ext| ext == "json") {
        out.push(path.to_path_buf());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 5, 1, 12, 0, 0).unwrap()
    }

    fn trace(event: &str, channel: &str) -> Trace {
        Trace::new(event, "NZ.WIZ", channel, t0(), 100.0, (0..200).map(|i| i as f64).collect())
            .unwrap()
    }

    #[test]
    fn test_rejects_bad_sampling_rate() {
        let result = Trace::new("ev1", "NZ.WIZ", "HHZ", t0(), 0.0, vec![0.0]);
        assert!(matches!(result, Err(RegistryError::InvalidTrace(_))));
    }

    #[test]
    fn test_sample_index_and_slice() {
        let tr = trace("ev1", "HHZ");
        assert_eq!(tr.sample_index(offset_seconds(t0(), 0.5)), 50);
        assert_eq!(tr.sample_index(offset_seconds(t0(), -0.1)), -10);
        assert_eq!(tr.slice(50, 3), Some(&[50.0, 51.0, 52.0][..]));
        assert!(tr.slice(-1, 3).is_none());
        assert!(tr.slice(198, 3).is_none());
        assert_eq!(tr.end_time(), offset_seconds(t0(), 1.99));
    }

    #[test]
    fn test_memory_store_lookup() {
        let mut store = MemoryWaveformStore::new();
        store.insert(trace("ev1", "HHZ"));
        let id = EventId::new("ev1");
        assert!(store.trace(&id, "NZ.WIZ", "HHZ").unwrap().is_some());
        assert!(store.trace(&id, "NZ.WIZ", "HHN").unwrap().is_none());
    }

    #[test]
    fn test_index_flat_and_nested_layouts() {
        let dir = tempfile::TempDir::new().unwrap();
        let flat = dir.path().join("flat");
        let nested = dir.path().join("nested").join("ev2");
        std::fs::create_dir_all(&flat).unwrap();
        std::fs::create_dir_all(&nested).unwrap();

        trace("ev1", "HHZ").save(flat.join("ev1.WIZ.HHZ.json")).unwrap();
        trace("ev2", "HHZ").save(nested.join("WIZ.HHZ.json")).unwrap();
        std::fs::write(flat.join("broken.json"), "{not json").unwrap();
        std::fs::write(flat.join("notes.txt"), "ignored").unwrap();

        let index = WaveformIndex::build(&[flat, dir.path().join("nested")]).unwrap();
        assert_eq!(index.len(), 2);

        let loaded = index
            .trace(&EventId::new("ev2"), "NZ.WIZ", "HHZ")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.samples.len(), 200);

        let saved = dir.path().join("waveform_index.json");
        index.save(&saved).unwrap();
        let reloaded = WaveformIndex::load(&saved).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.header(&EventId::new("ev1"), "NZ.WIZ", "HHZ").unwrap().npts,
            200
        );
    }
}
