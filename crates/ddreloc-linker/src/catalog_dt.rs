//! Catalog differential times from shared picks.

use crate::config::PairingConfig;
use ddreloc_core::{
    epicentral_distance_km, hypocentral_separation_km, DifferentialTime, Event, Phase,
};
use ddreloc_registry::{Catalog, StationRegistry};
use ddreloc_telemetry::Metrics;
use tracing::info;

/// Differential times for every pair within MAXSEP and every (station, phase)
/// picked by both events with weights >= MINWGHT, at stations within MAXDIST
/// of both events. Weight is the mean pick weight. Output is in canonical order.
pub fn catalog_differential_times(
    catalog: &Catalog,
    stations: &StationRegistry,
    config: &PairingConfig,
) -> Vec<DifferentialTime> {
    let events: Vec<&Event> = catalog.iter().collect();
    let mut dts = Vec::new();

    for (i, a) in events.iter().enumerate() {
        for b in &events[i + 1..] {
            let separation = hypocentral_separation_km(&a.hypocenter, &b.hypocenter);
            if !config.max_separation_km.allows(separation) {
                continue;
            }
            for pick_a in a.picks() {
                if pick_a.weight < config.min_weight {
                    continue;
                }
                let Some(pick_b) = b.pick(&pick_a.station, pick_a.phase) else {
                    continue;
                };
                if pick_b.weight < config.min_weight {
                    continue;
                }
                let Some(station) = stations.get(&pick_a.station) else {
                    continue;
                };
                let in_range = [a, b].iter().all(|ev| {
                    config.max_distance_km.allows(epicentral_distance_km(
                        ev.hypocenter.latitude,
                        ev.hypocenter.longitude,
                        station.latitude,
                        station.longitude,
                    ))
                });
                if !in_range {
                    continue;
                }
                dts.push(DifferentialTime::catalog(
                    a.id().clone(),
                    b.id().clone(),
                    pick_a.station.clone(),
                    pick_a.phase,
                    a.travel_time(pick_a),
                    b.travel_time(pick_b),
                    (pick_a.weight + pick_b.weight) / 2.0,
                ));
            }
        }
    }

    dts.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
    for phase in [Phase::P, Phase::S] {
        let count = dts.iter().filter(|dt| dt.phase == phase).count();
        Metrics::dt_produced("ct", &phase.to_string(), count);
    }
    info!(observations = dts.len(), events = events.len(), "Catalog differential times built");
    dts
}
