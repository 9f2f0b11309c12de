//! Catalog, station and waveform registries.
//!
//! Validated, read-mostly views of the run inputs:
//! - `CatalogDocument` / `Catalog`: the event document and its validated events
//! - `StationRegistry`: station locations keyed by pick-facing code
//! - `WaveformIndex`, `MemoryWaveformStore`: random access to traces

pub mod catalog;
pub mod error;
pub mod stations;
pub mod waveforms;

pub use catalog::{Catalog, CatalogDocument, CatalogEvent, CatalogOrigin, CatalogPick, LoadStats};
pub use error::{RegistryError, RegistryResult};
pub use stations::{InventoryNetwork, InventoryStation, StationInventory, StationRegistry};
pub use waveforms::{
    IndexEntry, MemoryWaveformStore, Trace, TraceHeader, WaveformIndex, WaveformSource,
};
