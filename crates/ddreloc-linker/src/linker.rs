//! Pair admission and neighbor selection.

use crate::config::PairingConfig;
use crate::error::{LinkerError, LinkerResult};
use crate::graph::{count_links, EventPair, NeighborGraph};
use ddreloc_core::{
    epicentral_distance_km, hypocentral_separation_km, DifferentialTime, Event, EventId, PairKey,
    Phase,
};
use ddreloc_registry::{Catalog, StationRegistry};
use ddreloc_telemetry::Metrics;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Counters from one linking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkStats {
    /// Distinct event pairs seen in the input.
    pub candidates: usize,
    pub rejected_separation: usize,
    pub rejected_links: usize,
    pub rejected_neighbors: usize,
    /// Observations dropped because a station was beyond MAXDIST.
    pub dropped_distance: usize,
    /// Observations at stations missing from the registry.
    pub dropped_unknown_station: usize,
    /// Observations dropped to respect MAXOBS.
    pub dropped_maxobs: usize,
    /// Observations referencing an event not in the catalog, or a self-pair.
    pub unknown_event: usize,
}

/// Builds a `NeighborGraph` from differential times.
pub struct PairLinker {
    config: PairingConfig,
}

struct Ranked {
    dt: DifferentialTime,
    station_distance: f64,
}

impl PairLinker {
    pub fn new(config: PairingConfig) -> LinkerResult<Self> {
        config.validate().map_err(LinkerError::ConfigError)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Admit pairs and select neighbors.
    ///
    /// The result depends only on the set of input observations, not on
    /// their order.
    pub fn link(
        &self,
        catalog: &Catalog,
        stations: &StationRegistry,
        dts: Vec<DifferentialTime>,
    ) -> (NeighborGraph, LinkStats) {
        let mut stats = LinkStats::default();

        let mut grouped: BTreeMap<PairKey, Vec<DifferentialTime>> = BTreeMap::new();
        for dt in dts {
            if dt.event_a == dt.event_b
                || catalog.get(&dt.event_a).is_none()
                || catalog.get(&dt.event_b).is_none()
            {
                stats.unknown_event += 1;
                continue;
            }
            let dt = dt.canonical();
            grouped.entry(dt.pair_key()).or_default().push(dt);
        }
        stats.candidates = grouped.len();

        let mut admitted = Vec::new();
        for (key, observations) in grouped {
            let (Some(a), Some(b)) = (catalog.get(&key.first), catalog.get(&key.second)) else {
                continue;
            };
            let separation = hypocentral_separation_km(&a.hypocenter, &b.hypocenter);
            if !self.config.max_separation_km.allows(separation) {
                stats.rejected_separation += 1;
                continue;
            }

            let kept = self.select_observations(a, b, stations, observations, &mut stats);
            if !self.passes_link_gate(&kept) {
                debug!(pair = %key, observations = kept.len(), "Pair below link threshold");
                stats.rejected_links += 1;
                continue;
            }
            admitted.push(EventPair::new(key, separation, kept));
        }

        let pairs = self.limit_neighbors(admitted, &mut stats);
        let graph = NeighborGraph::from_pairs(pairs);

        if stats.unknown_event > 0 {
            warn!(count = stats.unknown_event, "Observations referencing unknown events were ignored");
        }
        Metrics::pairs_linked(graph.len());
        Metrics::pairs_rejected("separation", stats.rejected_separation);
        Metrics::pairs_rejected("links", stats.rejected_links);
        Metrics::pairs_rejected("neighbors", stats.rejected_neighbors);
        info!(
            candidates = stats.candidates,
            pairs = graph.len(),
            events = graph.event_ids().count(),
            observations = graph.observation_count(),
            rejected_separation = stats.rejected_separation,
            rejected_links = stats.rejected_links,
            rejected_neighbors = stats.rejected_neighbors,
            dropped_distance = stats.dropped_distance,
            dropped_maxobs = stats.dropped_maxobs,
            "Neighbor graph built"
        );
        (graph, stats)
    }

    /// Drop observations beyond MAXDIST, then trim to MAXOBS keeping one
    /// observation per (station, phase) before any duplicate.
    fn select_observations(
        &self,
        a: &Event,
        b: &Event,
        stations: &StationRegistry,
        observations: Vec<DifferentialTime>,
        stats: &mut LinkStats,
    ) -> Vec<DifferentialTime> {
        let mut ranked = Vec::with_capacity(observations.len());
        for dt in observations {
            let Some(station) = stations.get(&dt.station) else {
                stats.dropped_unknown_station += 1;
                continue;
            };
            let da = epicentral_distance_km(
                a.hypocenter.latitude,
                a.hypocenter.longitude,
                station.latitude,
                station.longitude,
            );
            let db = epicentral_distance_km(
                b.hypocenter.latitude,
                b.hypocenter.longitude,
                station.latitude,
                station.longitude,
            );
            if !self.config.max_distance_km.allows(da) || !self.config.max_distance_km.allows(db) {
                stats.dropped_distance += 1;
                continue;
            }
            ranked.push(Ranked {
                dt,
                station_distance: (da + db) / 2.0,
            });
        }

        if ranked.len() <= self.config.max_obs {
            return ranked.into_iter().map(|r| r.dt).collect();
        }

        ranked.sort_by(rank);
        let mut seen: BTreeSet<(String, Phase)> = BTreeSet::new();
        let (representatives, duplicates): (Vec<Ranked>, Vec<Ranked>) = ranked
            .into_iter()
            .partition(|r| seen.insert((r.dt.station.clone(), r.dt.phase)));

        let total = representatives.len() + duplicates.len();
        let kept: Vec<DifferentialTime> = representatives
            .into_iter()
            .chain(duplicates)
            .take(self.config.max_obs)
            .map(|r| r.dt)
            .collect();
        stats.dropped_maxobs += total - kept.len();
        kept
    }

    fn passes_link_gate(&self, observations: &[DifferentialTime]) -> bool {
        match self.config.link_threshold() {
            Some(threshold) => count_links(observations.iter()) >= threshold,
            None => observations.len() >= self.config.observation_threshold(),
        }
    }

    /// Greedy MAXNGH selection: strongest pairs first, accepted while both
    /// events still have capacity.
    fn limit_neighbors(&self, mut pairs: Vec<EventPair>, stats: &mut LinkStats) -> Vec<EventPair> {
        pairs.sort_by(|x, y| {
            y.links
                .cmp(&x.links)
                .then_with(|| x.separation_km.total_cmp(&y.separation_km))
                .then_with(|| x.key.cmp(&y.key))
        });

        let mut degree: BTreeMap<EventId, usize> = BTreeMap::new();
        let mut accepted = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let da = degree.get(&pair.key.first).copied().unwrap_or(0);
            let db = degree.get(&pair.key.second).copied().unwrap_or(0);
            if da >= self.config.max_neighbors || db >= self.config.max_neighbors {
                stats.rejected_neighbors += 1;
                continue;
            }
            *degree.entry(pair.key.first.clone()).or_default() += 1;
            *degree.entry(pair.key.second.clone()).or_default() += 1;
            accepted.push(pair);
        }
        accepted
    }
}

/// Strongest first: weight desc, station distance asc, then a total order on
/// the observation itself.
fn rank(x: &Ranked, y: &Ranked) -> Ordering {
    y.dt.weight
        .total_cmp(&x.dt.weight)
        .then_with(|| x.station_distance.total_cmp(&y.station_distance))
        .then_with(|| x.dt.sort_key().cmp(&y.dt.sort_key()))
        .then_with(|| x.dt.value.total_cmp(&y.dt.value))
}
