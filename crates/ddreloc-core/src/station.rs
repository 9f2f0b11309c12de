//! Station reference data.

use serde::{Deserialize, Serialize};

/// Orientation of a single channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOrientation {
    pub code: String,
    /// Degrees clockwise from north.
    #[serde(default)]
    pub azimuth: Option<f64>,
    /// Degrees down from horizontal.
    #[serde(default)]
    pub dip: Option<f64>,
}

/// A recording station.
///
/// The `code` is the identifier picks refer to: `NET.STA`, or the bare
/// station name when the network is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation above sea level in metres.
    pub elevation_m: f64,
    #[serde(default)]
    pub channels: Vec<ChannelOrientation>,
}

impl Station {
    pub fn new(code: impl Into<String>, latitude: f64, longitude: f64, elevation_m: f64) -> Self {
        Self {
            code: code.into(),
            latitude,
            longitude,
            elevation_m,
            channels: Vec::new(),
        }
    }

    /// Build the pick-facing code from network and station names.
    pub fn make_code(network: &str, station: &str) -> String {
        if network.is_empty() {
            station.to_string()
        } else {
            format!("{network}.{station}")
        }
    }

    /// Receiver depth in km (positive down).
    pub fn depth_km(&self) -> f64 {
        -self.elevation_m / 1000.0
    }

    pub fn channel(&self, code: &str) -> Option<&ChannelOrientation> {
        self.channels.iter().find(|c| c.code == code)
    }
}
