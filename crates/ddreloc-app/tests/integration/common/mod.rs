//! Synthetic relocation scenario.
//!
//! Three events under a four-station network:
//! - `ev001` and `ev002` 0.5 km apart, with P (HHZ) and S (HHN) picks and
//!   waveforms at every station
//! - `ev003` about 14 km away, picks only
//!
//! Picks and waveforms follow the true locations; the catalog places
//! `ev002` about 0.3 km off its true position and its picks 10 ms late,
//! leaving the differential times to pull it back.

use chrono::{DateTime, TimeZone, Utc};
use ddreloc_app::{AppConfig, InputsConfig, VelocityConfig};
use ddreloc_core::{
    epicentral_distance_km, offset_seconds, Hypocenter, Limit, LocalFrame, Phase, Station,
    VelocityModel,
};
use ddreloc_inversion::{DataSelection, PhaseSelection};
use ddreloc_registry::{
    CatalogDocument, CatalogEvent, CatalogOrigin, CatalogPick, InventoryNetwork,
    InventoryStation, StationInventory, Trace,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SAMPLING_RATE: f64 = 100.0;
pub const PICK_ERROR_S: f64 = 0.01;

const LAT0: f64 = -38.55;
const LON0: f64 = 176.2;

/// Station offsets from the cluster (east, north) in km.
const STATIONS: [(&str, f64, f64); 4] = [
    ("NGA1", 3.0, 1.0),
    ("NGA2", -2.0, 5.0),
    ("NGA3", -6.0, -3.0),
    ("NGA4", 4.0, -8.0),
];

pub fn velocity_config() -> VelocityConfig {
    VelocityConfig {
        layer_tops: vec![(-1.0, 4.0), (2.0, 5.0), (8.0, 6.0)],
        vp_vs_ratio: 1.73,
    }
}

fn frame() -> LocalFrame {
    LocalFrame::new(LAT0, LON0)
}

fn at(east: f64, north: f64, depth_km: f64) -> Hypocenter {
    let (lat, lon) = frame().to_geographic(east, north);
    Hypocenter::new(lat, lon, depth_km).unwrap()
}

fn stations() -> Vec<Station> {
    STATIONS
        .iter()
        .map(|(code, east, north)| {
            let (lat, lon) = frame().to_geographic(*east, *north);
            Station::new(Station::make_code("NZ", code), lat, lon, 150.0)
        })
        .collect()
}

struct SyntheticEvent {
    id: &'static str,
    origin_time: DateTime<Utc>,
    truth: Hypocenter,
    catalog: Hypocenter,
    pick_error: f64,
    waveforms: bool,
}

fn events() -> Vec<SyntheticEvent> {
    let t0 = Utc.with_ymd_and_hms(2013, 6, 1, 12, 0, 0).unwrap();
    vec![
        SyntheticEvent {
            id: "ev001",
            origin_time: t0,
            truth: at(0.0, 0.0, 4.0),
            catalog: at(0.0, 0.0, 4.0),
            pick_error: 0.0,
            waveforms: true,
        },
        SyntheticEvent {
            id: "ev002",
            origin_time: offset_seconds(t0, 3600.0),
            truth: at(0.5, 0.0, 4.0),
            catalog: at(0.7, 0.15, 4.2),
            pick_error: PICK_ERROR_S,
            waveforms: true,
        },
        SyntheticEvent {
            id: "ev003",
            origin_time: offset_seconds(t0, 7200.0),
            truth: at(10.0, 10.0, 5.0),
            catalog: at(10.0, 10.0, 5.0),
            pick_error: 0.0,
            waveforms: false,
        },
    ]
}

/// Gaussian-windowed 8 Hz sine centred `centre` seconds into the trace.
fn wavelet(npts: usize, centre: f64) -> Vec<f64> {
    (0..npts)
        .map(|i| {
            let t = i as f64 / SAMPLING_RATE - centre;
            (-(t / 0.04).powi(2)).exp() * (2.0 * std::f64::consts::PI * 8.0 * t).sin()
        })
        .collect()
}

/// On-disk inputs plus a configuration pointing at them.
pub struct Scenario {
    pub dir: TempDir,
    pub config: AppConfig,
}

impl Scenario {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(data.join("waveforms")).unwrap();

        let station_file = data.join("stations.json");
        write_inventory(&station_file);
        let event_file = data.join("events.json");
        write_events(&event_file, &data.join("waveforms"));

        let mut config = AppConfig::default();
        config.run.workdir = dir.path().join("work");
        config.inputs = InputsConfig {
            event_files: vec![event_file],
            waveform_paths: vec![data.join("waveforms")],
            station_files: vec![station_file],
        };
        config.velocity = velocity_config();
        config.correlation.s_phase_weighting = BTreeMap::from([("N".to_string(), 1.0)]);
        config.correlation.workers = 2;
        config.pairing.min_links = 6;
        config.pairing.max_separation_km = Limit::new(2.0);
        config.inversion.data = DataSelection::CrossCorrelation;
        config.inversion.phases = PhaseSelection::Both;
        config.inversion.stages = vec!["   6  1.0  1.0  -999  -999  -999  -999  -999  -999  0.01"
            .parse()
            .unwrap()];

        Self { dir, config }
    }

    pub fn workdir(&self) -> PathBuf {
        self.config.run.workdir.clone()
    }
}

fn write_inventory(path: &Path) {
    let inventory = StationInventory {
        networks: vec![InventoryNetwork {
            code: "NZ".to_string(),
            stations: stations()
                .iter()
                .zip(STATIONS.iter())
                .map(|(sta, (code, _, _))| InventoryStation {
                    code: code.to_string(),
                    latitude: sta.latitude,
                    longitude: sta.longitude,
                    elevation_m: sta.elevation_m,
                    channels: Vec::new(),
                })
                .collect(),
        }],
    };
    std::fs::write(path, serde_json::to_vec_pretty(&inventory).unwrap()).unwrap();
}

fn write_events(path: &Path, waveform_dir: &Path) {
    let model = VelocityModel::from_tops(&velocity_config().layer_tops, 1.73).unwrap();
    let mut doc = CatalogDocument::default();
    doc.extra
        .insert("source".to_string(), Value::String("synthetic".to_string()));

    for event in events() {
        let event_dir = waveform_dir.join(event.id);
        std::fs::create_dir_all(&event_dir).unwrap();

        let mut picks = Vec::new();
        for sta in stations() {
            let distance = epicentral_distance_km(
                event.truth.latitude,
                event.truth.longitude,
                sta.latitude,
                sta.longitude,
            );
            for (phase, channel) in [(Phase::P, "HHZ"), (Phase::S, "HHN")] {
                let tt = model
                    .travel_time(phase, event.truth.depth_km, sta.depth_km(), distance)
                    .time;
                let arrival = offset_seconds(event.origin_time, tt);
                picks.push(CatalogPick {
                    station: sta.code.clone(),
                    channel: channel.to_string(),
                    phase: phase.to_string(),
                    time: offset_seconds(arrival, event.pick_error),
                    weight: 1.0,
                    extra: Map::new(),
                });

                if event.waveforms {
                    let trace = Trace::new(
                        event.id,
                        sta.code.clone(),
                        channel,
                        offset_seconds(arrival, -2.0),
                        SAMPLING_RATE,
                        wavelet(600, 2.1),
                    )
                    .unwrap();
                    trace
                        .save(event_dir.join(format!("{}.{channel}.json", sta.code)))
                        .unwrap();
                }
            }
        }

        doc.events.push(CatalogEvent {
            id: event.id.to_string(),
            origin: CatalogOrigin {
                time: event.origin_time,
                latitude: event.catalog.latitude,
                longitude: event.catalog.longitude,
                depth_km: event.catalog.depth_km,
                extra: Map::new(),
            },
            magnitude: Some(1.4),
            picks,
            extra: Map::new(),
        });
    }

    doc.save(path).unwrap();
}
