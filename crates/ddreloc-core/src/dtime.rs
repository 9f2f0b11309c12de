//! Differential travel-time observations.

use crate::event::{EventId, Phase};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a differential time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtSource {
    /// Difference of catalog picks.
    Catalog,
    /// Waveform cross-correlation.
    CrossCorrelation,
}

impl fmt::Display for DtSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DtSource::Catalog => write!(f, "ct"),
            DtSource::CrossCorrelation => write!(f, "cc"),
        }
    }
}

/// Unordered event pair, stored with the lower id first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub first: EventId,
    pub second: EventId,
}

impl PairKey {
    pub fn new(a: EventId, b: EventId) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    pub fn contains(&self, id: &EventId) -> bool {
        &self.first == id || &self.second == id
    }

    /// The other member of the pair, if `id` is a member.
    pub fn other(&self, id: &EventId) -> Option<&EventId> {
        if &self.first == id {
            Some(&self.second)
        } else if &self.second == id {
            Some(&self.first)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// A differential travel time `(tA - otA) - (tB - otB)` at one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialTime {
    pub event_a: EventId,
    pub event_b: EventId,
    pub station: String,
    pub phase: Phase,
    pub source: DtSource,
    /// Differential travel time in seconds.
    pub value: f64,
    /// Quality weight: mean pick weight (catalog) or coefficient (cross-correlation).
    pub weight: f64,
    /// Individual travel times (A, B); catalog observations only.
    #[serde(default)]
    pub travel_times: Option<(f64, f64)>,
}

impl DifferentialTime {
    /// Catalog observation built from two absolute travel times.
    pub fn catalog(
        event_a: EventId,
        event_b: EventId,
        station: impl Into<String>,
        phase: Phase,
        travel_time_a: f64,
        travel_time_b: f64,
        weight: f64,
    ) -> Self {
        Self {
            event_a,
            event_b,
            station: station.into(),
            phase,
            source: DtSource::Catalog,
            value: travel_time_a - travel_time_b,
            weight,
            travel_times: Some((travel_time_a, travel_time_b)),
        }
    }

    /// Cross-correlation observation.
    pub fn cross_correlation(
        event_a: EventId,
        event_b: EventId,
        station: impl Into<String>,
        phase: Phase,
        value: f64,
        coefficient: f64,
    ) -> Self {
        Self {
            event_a,
            event_b,
            station: station.into(),
            phase,
            source: DtSource::CrossCorrelation,
            value,
            weight: coefficient,
            travel_times: None,
        }
    }

    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.event_a.clone(), self.event_b.clone())
    }

    /// Orient the observation so that `event_a` is the lower id.
    ///
    /// Swapping the events negates the value and swaps the travel times.
    pub fn canonical(mut self) -> Self {
        if self.event_a > self.event_b {
            std::mem::swap(&mut self.event_a, &mut self.event_b);
            self.value = -self.value;
            self.travel_times = self.travel_times.map(|(a, b)| (b, a));
        }
        self
    }

    /// Total order used to make batches reproducible.
    pub fn sort_key(&self) -> (&EventId, &EventId, &str, Phase, DtSource) {
        (
            &self.event_a,
            &self.event_b,
            self.station.as_str(),
            self.phase,
            self.source,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_unordered() {
        let a = PairKey::new(EventId::new("b"), EventId::new("a"));
        let b = PairKey::new(EventId::new("a"), EventId::new("b"));
        assert_eq!(a, b);
        assert_eq!(a.first.as_str(), "a");
        assert_eq!(a.other(&EventId::new("a")).unwrap().as_str(), "b");
        assert!(a.other(&EventId::new("c")).is_none());
    }

    #[test]
    fn test_canonical_flips_sign_and_travel_times() {
        let dt = DifferentialTime::catalog(
            EventId::new("z"),
            EventId::new("a"),
            "NZ.WIZ",
            Phase::P,
            2.0,
            1.5,
            1.0,
        );
        assert!((dt.value - 0.5).abs() < 1e-12);
        let flipped = dt.canonical();
        assert_eq!(flipped.event_a.as_str(), "a");
        assert!((flipped.value + 0.5).abs() < 1e-12);
        assert_eq!(flipped.travel_times, Some((1.5, 2.0)));
    }

    #[test]
    fn test_canonical_keeps_ordered_observation() {
        let dt = DifferentialTime::cross_correlation(
            EventId::new("a"),
            EventId::new("b"),
            "NZ.WIZ",
            Phase::S,
            0.01,
            0.9,
        );
        assert_eq!(dt.clone().canonical(), dt);
    }
}
