//! Station inventory loading.

use crate::error::RegistryResult;
use ddreloc_core::{ChannelOrientation, Station};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationInventory {
    #[serde(default)]
    pub networks: Vec<InventoryNetwork>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryNetwork {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub stations: Vec<InventoryStation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryStation {
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, alias = "elevation")]
    pub elevation_m: f64,
    #[serde(default)]
    pub channels: Vec<ChannelOrientation>,
}

impl StationInventory {
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Stations keyed by pick-facing code (`NET.STA`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationRegistry {
    stations: BTreeMap<String, Station>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a station. A later entry with the same code replaces the earlier one.
    pub fn insert(&mut self, station: Station) {
        if let Some(previous) = self.stations.insert(station.code.clone(), station) {
            warn!(station = %previous.code, "Station defined twice, keeping the later entry");
        }
    }

    pub fn add_inventory(&mut self, inventory: &StationInventory) -> usize {
        let mut added = 0;
        for network in &inventory.networks {
            for sta in &network.stations {
                let mut station = Station::new(
                    Station::make_code(&network.code, &sta.code),
                    sta.latitude,
                    sta.longitude,
                    sta.elevation_m,
                );
                station.channels = sta.channels.clone();
                self.insert(station);
                added += 1;
            }
        }
        added
    }

    /// Load and merge several inventory files.
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> RegistryResult<Self> {
        let mut registry = Self::new();
        for path in paths {
            let inventory = StationInventory::load(path)?;
            let added = registry.add_inventory(&inventory);
            debug!(path = %path.as_ref().display(), stations = added, "Loaded station inventory");
        }
        Ok(registry)
    }

    pub fn get(&self, code: &str) -> Option<&Station> {
        self.stations.get(code)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }
}

impl FromIterator<Station> for StationRegistry {
    fn from_iter<I: IntoIterator<Item = Station>>(iter: I) -> Self {
        let mut registry = Self::new();
        for station in iter {
            registry.insert(station);
        }
        registry
    }
}
