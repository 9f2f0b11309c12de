//! Inversion configuration.
//!
//! Field names follow the hypoDD control parameters, which are accepted as
//! aliases (`IDAT`, `IPHASE`, `DIST`, ...). Integer-coded options keep their
//! numeric form on the wire.

use ddreloc_core::{DtSource, IterationStage, Limit, OutlierCutoff, Phase};
use serde::{Deserialize, Serialize};

/// IDAT: which differential times enter the inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataSelection {
    CrossCorrelation,
    Catalog,
    Both,
}

impl DataSelection {
    pub fn includes(&self, source: DtSource) -> bool {
        matches!(
            (self, source),
            (DataSelection::Both, _)
                | (DataSelection::CrossCorrelation, DtSource::CrossCorrelation)
                | (DataSelection::Catalog, DtSource::Catalog)
        )
    }
}

impl TryFrom<u8> for DataSelection {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DataSelection::CrossCorrelation),
            2 => Ok(DataSelection::Catalog),
            3 => Ok(DataSelection::Both),
            other => Err(format!("IDAT must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<DataSelection> for u8 {
    fn from(value: DataSelection) -> Self {
        match value {
            DataSelection::CrossCorrelation => 1,
            DataSelection::Catalog => 2,
            DataSelection::Both => 3,
        }
    }
}

/// IPHASE: which phases enter the inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PhaseSelection {
    P,
    S,
    Both,
}

impl PhaseSelection {
    pub fn includes(&self, phase: Phase) -> bool {
        matches!(
            (self, phase),
            (PhaseSelection::Both, _) | (PhaseSelection::P, Phase::P) | (PhaseSelection::S, Phase::S)
        )
    }
}

impl TryFrom<u8> for PhaseSelection {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PhaseSelection::P),
            2 => Ok(PhaseSelection::S),
            3 => Ok(PhaseSelection::Both),
            other => Err(format!("IPHASE must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<PhaseSelection> for u8 {
    fn from(value: PhaseSelection) -> Self {
        match value {
            PhaseSelection::P => 1,
            PhaseSelection::S => 2,
            PhaseSelection::Both => 3,
        }
    }
}

/// ISTART: initial locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StartLocation {
    ClusterCentroid,
    Catalog,
}

impl TryFrom<u8> for StartLocation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StartLocation::ClusterCentroid),
            2 => Ok(StartLocation::Catalog),
            other => Err(format!("ISTART must be 1 or 2, got {other}")),
        }
    }
}

impl From<StartLocation> for u8 {
    fn from(value: StartLocation) -> Self {
        match value {
            StartLocation::ClusterCentroid => 1,
            StartLocation::Catalog => 2,
        }
    }
}

/// IAQ: what happens to events that move above the air-quake depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AirQuakePolicy {
    Keep,
    Remove,
}

impl TryFrom<u8> for AirQuakePolicy {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AirQuakePolicy::Keep),
            1 => Ok(AirQuakePolicy::Remove),
            other => Err(format!("IAQ must be 0 or 1, got {other}")),
        }
    }
}

impl From<AirQuakePolicy> for u8 {
    fn from(value: AirQuakePolicy) -> Self {
        match value {
            AirQuakePolicy::Keep => 0,
            AirQuakePolicy::Remove => 1,
        }
    }
}

/// Relocation engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionConfig {
    #[serde(default = "default_data", alias = "IDAT")]
    pub data: DataSelection,
    #[serde(default = "default_phases", alias = "IPHASE")]
    pub phases: PhaseSelection,
    /// Max distance between cluster centroid and station (km).
    #[serde(default = "default_max_centroid_distance", alias = "DIST")]
    pub max_centroid_distance_km: Limit,
    /// Min cc links per pair to join a cluster.
    #[serde(default, alias = "OBSCC")]
    pub min_cc_links: usize,
    /// Min catalog links per pair to join a cluster.
    #[serde(default, alias = "OBSCT")]
    pub min_ct_links: usize,
    /// Min distance between pair centroid and station (km).
    #[serde(default = "disabled", alias = "MINDS")]
    pub min_station_distance_km: Limit,
    /// Max distance between pair centroid and station (km).
    #[serde(default = "disabled", alias = "MAXDS")]
    pub max_station_distance_km: Limit,
    /// Max azimuthal gap of a pair's stations (degrees).
    #[serde(default = "disabled", alias = "MAXGAP")]
    pub max_gap_deg: Limit,
    #[serde(default = "default_start", alias = "ISTART")]
    pub start: StartLocation,
    #[serde(default = "default_air_quakes", alias = "IAQ")]
    pub air_quakes: AirQuakePolicy,
    /// Events shallower than this depth (km) are air quakes.
    #[serde(default)]
    pub air_quake_depth_km: f64,
    /// Inversion schedule, run in order.
    #[serde(default = "default_stages")]
    pub stages: Vec<IterationStage>,
}

fn default_data() -> DataSelection {
    DataSelection::Both
}

fn default_phases() -> PhaseSelection {
    PhaseSelection::P
}

fn default_max_centroid_distance() -> Limit {
    Limit::new(50.0)
}

fn disabled() -> Limit {
    Limit::DISABLED
}

fn default_start() -> StartLocation {
    StartLocation::Catalog
}

fn default_air_quakes() -> AirQuakePolicy {
    AirQuakePolicy::Remove
}

#[allow(clippy::too_many_arguments)]
fn stage(
    niter: u32,
    wtccp: f64,
    wtccs: f64,
    wrcc: f64,
    wdcc: f64,
    wtctp: f64,
    wtcts: f64,
    wrct: f64,
    wdct: f64,
    damp: f64,
) -> IterationStage {
    IterationStage {
        niter,
        wtccp,
        wtccs,
        wrcc: OutlierCutoff::from(wrcc),
        wdcc: Limit::from(wdcc),
        wtctp,
        wtcts,
        wrct: OutlierCutoff::from(wrct),
        wdct: Limit::from(wdct),
        damp,
    }
}

/// Five stages shifting weight from catalog to cross-correlation data while
/// tightening separation cutoffs and damping.
fn default_stages() -> Vec<IterationStage> {
    vec![
        stage(5, 0.10, -999.0, 2.0, 1.0, 1.0, -999.0, 2.0, 1.0, 150.0),
        stage(5, 0.30, -999.0, 2.0, 1.0, 0.7, -999.0, 2.0, 1.0, 100.0),
        stage(5, 0.50, -999.0, 2.0, 1.0, 0.50, -999.0, 2.0, 1.0, 70.0),
        stage(5, 0.70, -999.0, 2.0, 0.75, 0.30, -999.0, 2.0, 0.75, 50.0),
        stage(5, 1.00, -999.0, 2.0, 0.5, 0.01, -999.0, 2.0, 0.5, 30.0),
    ]
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            data: default_data(),
            phases: default_phases(),
            max_centroid_distance_km: default_max_centroid_distance(),
            min_cc_links: 0,
            min_ct_links: 0,
            min_station_distance_km: disabled(),
            max_station_distance_km: disabled(),
            max_gap_deg: disabled(),
            start: default_start(),
            air_quakes: default_air_quakes(),
            air_quake_depth_km: 0.0,
            stages: default_stages(),
        }
    }
}

impl InversionConfig {
    /// Validate configuration values.
    ///
    /// Returns Err if:
    /// - the stage list is empty or any stage is invalid
    /// - MINDS exceeds MAXDS
    /// - the air-quake depth is not finite
    pub fn validate(&self) -> Result<(), String> {
        if self.stages.is_empty() {
            return Err("stages must contain at least one iteration stage".to_string());
        }
        for (i, stage) in self.stages.iter().enumerate() {
            stage
                .validate()
                .map_err(|e| format!("stages[{i}]: {e}"))?;
        }
        if let (Some(min), Some(max)) = (
            self.min_station_distance_km.value(),
            self.max_station_distance_km.value(),
        ) {
            if min > max {
                return Err(format!("MINDS ({min}) must not exceed MAXDS ({max})"));
            }
        }
        if !self.air_quake_depth_km.is_finite() {
            return Err("air_quake_depth_km must be finite".to_string());
        }
        Ok(())
    }

    /// Clustering is disabled when both OBSCC and OBSCT are 0.
    pub fn clustering_enabled(&self) -> bool {
        self.min_cc_links > 0 || self.min_ct_links > 0
    }

    pub fn total_iterations(&self) -> usize {
        self.stages.iter().map(|s| s.niter as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InversionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stages.len(), 5);
        assert_eq!(config.total_iterations(), 25);
        assert!(!config.clustering_enabled());
        assert_eq!(config.stages[4].damp, 30.0);
        assert_eq!(config.stages[0].weight(DtSource::CrossCorrelation, Phase::S), None);
    }

    #[test]
    fn test_hypodd_names_and_rows() {
        let config: InversionConfig = toml::from_str(
            r#"
            IDAT = 1
            IPHASE = 3
            DIST = 50
            OBSCC = 0
            OBSCT = 0
            MINDS = -999
            MAXDS = -999
            MAXGAP = -999
            ISTART = 1
            IAQ = 0
            stages = [
                "   5  0.10  -999    2    1   1.0  -999    2    1   150",
                "   5  1.00  -999    2  0.5  0.01  -999    2  0.5    30",
            ]
            "#,
        )
        .unwrap();
        assert_eq!(config.data, DataSelection::CrossCorrelation);
        assert!(config.phases.includes(Phase::S));
        assert_eq!(config.start, StartLocation::ClusterCentroid);
        assert_eq!(config.air_quakes, AirQuakePolicy::Keep);
        assert!(config.max_gap_deg.is_disabled());
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[1].wdcc, Limit::new(0.5));
        assert!(!config.data.includes(DtSource::Catalog));
    }

    #[test]
    fn test_bad_option_code_rejected() {
        assert!(toml::from_str::<InversionConfig>("IDAT = 4").is_err());
        assert!(toml::from_str::<InversionConfig>("ISTART = 3").is_err());
    }

    #[test]
    fn test_empty_stages_rejected() {
        let config = InversionConfig {
            stages: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("stages"));
    }

    #[test]
    fn test_minds_above_maxds_rejected() {
        let config = InversionConfig {
            min_station_distance_km: Limit::new(20.0),
            max_station_distance_km: Limit::new(10.0),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("MINDS"));
    }
}
