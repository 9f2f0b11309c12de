//! Catalog events and arrival picks.
//!
//! An `Event` owns its picks. Only the hypocenter and origin time change
//! during a run, and only through `Event::relocate`.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seismic phase type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    P,
    S,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::P => write!(f, "P"),
            Phase::S => write!(f, "S"),
        }
    }
}

impl FromStr for Phase {
    type Err = CoreError;

    /// Accepts the bare letter and the common first-arrival labels
    /// (`Pg`, `Pn`, `Sg`, ...) by their leading letter.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('P') => Ok(Phase::P),
            Some('S') => Ok(Phase::S),
            _ => Err(CoreError::InvalidPhase(s.to_string())),
        }
    }
}

/// Unique event identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Hypocenter location. Depth is in km, positive down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hypocenter {
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
}

impl Hypocenter {
    pub fn new(latitude: f64, longitude: f64, depth_km: f64) -> Result<Self> {
        if !(latitude.is_finite() && longitude.is_finite() && depth_km.is_finite()) {
            return Err(CoreError::InvalidHypocenter(format!(
                "non-finite coordinate ({latitude}, {longitude}, {depth_km})"
            )));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::InvalidHypocenter(format!(
                "latitude {latitude} out of range"
            )));
        }
        if !(-180.0..=360.0).contains(&longitude) {
            return Err(CoreError::InvalidHypocenter(format!(
                "longitude {longitude} out of range"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            depth_km,
        })
    }
}

/// A phase arrival picked on one channel of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub station: String,
    pub channel: String,
    pub phase: Phase,
    pub time: DateTime<Utc>,
    pub weight: f64,
}

impl Pick {
    pub fn new(
        station: impl Into<String>,
        channel: impl Into<String>,
        phase: Phase,
        time: DateTime<Utc>,
        weight: f64,
    ) -> Result<Self> {
        let station = station.into();
        if station.is_empty() {
            return Err(CoreError::InvalidPick("empty station code".to_string()));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(CoreError::InvalidPick(format!(
                "{station} {phase}: weight {weight} must be finite and >= 0"
            )));
        }
        Ok(Self {
            station,
            channel: channel.into(),
            phase,
            time,
            weight,
        })
    }

    /// Component letter of the picked channel (SEED convention: last character).
    pub fn component(&self) -> Option<char> {
        self.channel.chars().last()
    }

    /// Channel code on the same band/instrument with a different component.
    ///
    /// `HHZ` with `'N'` gives `HHN`. An empty channel yields the bare letter.
    pub fn channel_for_component(&self, component: char) -> String {
        let mut prefix: String = self.channel.chars().collect();
        prefix.pop();
        prefix.push(component);
        prefix
    }
}

/// Signed seconds from `earlier` to `later`, with nanosecond resolution.
pub fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}

/// Shift a timestamp by fractional seconds.
pub fn offset_seconds(time: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    time + Duration::nanoseconds((seconds * 1e9).round() as i64)
}

/// A catalog event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    pub origin_time: DateTime<Utc>,
    pub hypocenter: Hypocenter,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    picks: Vec<Pick>,
}

impl Event {
    pub fn new(id: EventId, origin_time: DateTime<Utc>, hypocenter: Hypocenter) -> Self {
        Self {
            id,
            origin_time,
            hypocenter,
            magnitude: None,
            picks: Vec::new(),
        }
    }

    pub fn with_magnitude(mut self, magnitude: Option<f64>) -> Self {
        self.magnitude = magnitude;
        self
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Add a pick. A second pick for the same station and phase is rejected.
    pub fn add_pick(&mut self, pick: Pick) -> Result<()> {
        if self.pick(&pick.station, pick.phase).is_some() {
            return Err(CoreError::InvalidPick(format!(
                "event {}: duplicate {} pick at {}",
                self.id, pick.phase, pick.station
            )));
        }
        self.picks.push(pick);
        Ok(())
    }

    pub fn picks(&self) -> &[Pick] {
        &self.picks
    }

    pub fn pick(&self, station: &str, phase: Phase) -> Option<&Pick> {
        self.picks
            .iter()
            .find(|p| p.phase == phase && p.station == station)
    }

    /// Observed travel time of a pick relative to this event's origin.
    pub fn travel_time(&self, pick: &Pick) -> f64 {
        seconds_between(pick.time, self.origin_time)
    }

    /// Replace the hypocenter and origin time.
    pub fn relocate(&mut self, hypocenter: Hypocenter, origin_time: DateTime<Utc>) {
        self.hypocenter = hypocenter;
        self.origin_time = origin_time;
    }
}
