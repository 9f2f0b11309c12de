//! Event-pair neighbor graph.

use crate::error::{LinkerError, LinkerResult};
use ddreloc_core::{hypocentral_separation_km, DifferentialTime, DtSource, EventId, PairKey, Phase};
use ddreloc_registry::Catalog;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// An admitted event pair and the observations that link it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPair {
    pub key: PairKey,
    pub separation_km: f64,
    /// Distinct (station, phase) links across both sources.
    pub links: usize,
    pub cc_links: usize,
    pub ct_links: usize,
    /// Observations in canonical order.
    pub observations: Vec<DifferentialTime>,
}

impl EventPair {
    pub fn new(key: PairKey, separation_km: f64, mut observations: Vec<DifferentialTime>) -> Self {
        observations.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.value.total_cmp(&b.value))
        });
        let links = count_links(observations.iter());
        let cc_links = count_links(
            observations
                .iter()
                .filter(|dt| dt.source == DtSource::CrossCorrelation),
        );
        let ct_links = count_links(observations.iter().filter(|dt| dt.source == DtSource::Catalog));
        Self {
            key,
            separation_km,
            links,
            cc_links,
            ct_links,
            observations,
        }
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }
}

/// Number of distinct (station, phase) combinations.
pub(crate) fn count_links<'a>(dts: impl Iterator<Item = &'a DifferentialTime>) -> usize {
    dts.map(|dt| (dt.station.as_str(), dt.phase))
        .collect::<BTreeSet<(&str, Phase)>>()
        .len()
}

/// Admitted pairs plus the event adjacency they induce.
///
/// Pairs are kept sorted by key so that serialization is byte-stable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NeighborGraph {
    pairs: Vec<EventPair>,
    neighbors: BTreeMap<EventId, BTreeSet<EventId>>,
    #[serde(skip)]
    index: BTreeMap<PairKey, usize>,
}

impl NeighborGraph {
    pub fn from_pairs(mut pairs: Vec<EventPair>) -> Self {
        pairs.sort_by(|a, b| a.key.cmp(&b.key));
        let mut neighbors: BTreeMap<EventId, BTreeSet<EventId>> = BTreeMap::new();
        let mut index = BTreeMap::new();
        for (i, pair) in pairs.iter().enumerate() {
            neighbors
                .entry(pair.key.first.clone())
                .or_default()
                .insert(pair.key.second.clone());
            neighbors
                .entry(pair.key.second.clone())
                .or_default()
                .insert(pair.key.first.clone());
            index.insert(pair.key.clone(), i);
        }
        Self {
            pairs,
            neighbors,
            index,
        }
    }

    /// Rebuild a graph from previously admitted observations without applying
    /// any pairing constraint. Used when reloading dt files.
    pub fn from_observations(catalog: &Catalog, dts: Vec<DifferentialTime>) -> LinkerResult<Self> {
        let mut grouped: BTreeMap<PairKey, Vec<DifferentialTime>> = BTreeMap::new();
        for dt in dts {
            let dt = dt.canonical();
            grouped.entry(dt.pair_key()).or_default().push(dt);
        }

        let mut pairs = Vec::with_capacity(grouped.len());
        for (key, observations) in grouped {
            let (Some(a), Some(b)) = (catalog.get(&key.first), catalog.get(&key.second)) else {
                let missing = if catalog.get(&key.first).is_none() {
                    &key.first
                } else {
                    &key.second
                };
                return Err(LinkerError::UnknownEvent(missing.to_string()));
            };
            let separation = hypocentral_separation_km(&a.hypocenter, &b.hypocenter);
            pairs.push(EventPair::new(key, separation, observations));
        }
        Ok(Self::from_pairs(pairs))
    }

    pub fn pairs(&self) -> &[EventPair] {
        &self.pairs
    }

    pub fn pair(&self, key: &PairKey) -> Option<&EventPair> {
        self.index.get(key).map(|&i| &self.pairs[i])
    }

    pub fn neighbors(&self, id: &EventId) -> Option<&BTreeSet<EventId>> {
        self.neighbors.get(id)
    }

    pub fn neighbor_count(&self, id: &EventId) -> usize {
        self.neighbors.get(id).map_or(0, BTreeSet::len)
    }

    /// Linked events in id order.
    pub fn event_ids(&self) -> impl Iterator<Item = &EventId> {
        self.neighbors.keys()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Every observation of every pair, in canonical order.
    pub fn observations(&self) -> impl Iterator<Item = &DifferentialTime> {
        self.pairs.iter().flat_map(|p| p.observations.iter())
    }

    pub fn observation_count(&self) -> usize {
        self.pairs.iter().map(EventPair::observation_count).sum()
    }
}
