//! Event catalog document and validated catalog view.
//!
//! `CatalogDocument` is the in-memory form of the event interchange file.
//! Every field the pipeline does not understand is kept in `extra` maps so the
//! refined catalog can be written back with only location fields changed.

use crate::error::{RegistryError, RegistryResult};
use crate::stations::StationRegistry;
use chrono::{DateTime, Utc};
use ddreloc_core::{Event, EventId, Hypocenter, Phase, Pick};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Origin of an event as stored in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogOrigin {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pick as stored in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPick {
    pub station: String,
    #[serde(default)]
    pub channel: String,
    pub phase: String,
    pub time: DateTime<Utc>,
    #[serde(default = "default_pick_weight")]
    pub weight: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_pick_weight() -> f64 {
    1.0
}

/// Event as stored in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub id: String,
    pub origin: CatalogOrigin,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub picks: Vec<CatalogPick>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Event document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub events: Vec<CatalogEvent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogDocument {
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let doc: Self = serde_json::from_slice(&data)?;
        debug!(path = %path.display(), events = doc.events.len(), "Loaded event document");
        Ok(doc)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> RegistryResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Concatenate documents. Top-level fields come from the first document.
    pub fn merge(docs: Vec<CatalogDocument>) -> Self {
        let mut iter = docs.into_iter();
        let mut merged = iter.next().unwrap_or_default();
        for doc in iter {
            merged.events.extend(doc.events);
        }
        merged
    }

    /// Write current hypocenters and origin times back into the document.
    ///
    /// Returns the number of events updated.
    pub fn apply_locations(&mut self, catalog: &Catalog) -> usize {
        let mut updated = 0;
        for event in &mut self.events {
            if let Some(located) = catalog.get(&EventId::new(event.id.clone())) {
                event.origin.time = located.origin_time;
                event.origin.latitude = located.hypocenter.latitude;
                event.origin.longitude = located.hypocenter.longitude;
                event.origin.depth_km = located.hypocenter.depth_km;
                updated += 1;
            }
        }
        updated
    }
}

/// Counts of input dropped while building a `Catalog`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    pub events: usize,
    pub picks: usize,
    pub picks_unknown_station: usize,
    pub picks_bad_phase: usize,
    pub picks_invalid: usize,
}

/// Validated events keyed by id, iterated in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    events: BTreeMap<EventId, Event>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-validated events. Duplicate ids are rejected.
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> RegistryResult<Self> {
        let mut catalog = Self::new();
        for event in events {
            catalog.insert(event)?;
        }
        Ok(catalog)
    }

    /// Validate document events against the station registry.
    ///
    /// Picks at unknown stations, with unknown phases, or with invalid weights
    /// are dropped and counted. Malformed origins, duplicate ids and ids that
    /// are empty or contain whitespace are errors.
    pub fn from_documents(
        docs: &[CatalogDocument],
        stations: &StationRegistry,
    ) -> RegistryResult<(Self, LoadStats)> {
        let mut catalog = Self::new();
        let mut stats = LoadStats::default();

        for doc in docs {
            for raw in &doc.events {
                if raw.id.is_empty() || raw.id.chars().any(char::is_whitespace) {
                    return Err(RegistryError::InvalidEvent(format!(
                        "event id {:?} must be non-empty without whitespace",
                        raw.id
                    )));
                }
                let hypocenter = Hypocenter::new(
                    raw.origin.latitude,
                    raw.origin.longitude,
                    raw.origin.depth_km,
                )
                .map_err(|e| RegistryError::InvalidEvent(format!("{}: {e}", raw.id)))?;
                let mut event = Event::new(EventId::new(raw.id.clone()), raw.origin.time, hypocenter)
                    .with_magnitude(raw.magnitude);

                for p in &raw.picks {
                    if stations.get(&p.station).is_none() {
                        stats.picks_unknown_station += 1;
                        debug!(event = %raw.id, station = %p.station, "Pick at unknown station dropped");
                        continue;
                    }
                    let phase: Phase = match p.phase.parse() {
                        Ok(phase) => phase,
                        Err(_) => {
                            stats.picks_bad_phase += 1;
                            continue;
                        }
                    };
                    let added = Pick::new(p.station.clone(), p.channel.clone(), phase, p.time, p.weight)
                        .and_then(|pick| event.add_pick(pick));
                    match added {
                        Ok(()) => stats.picks += 1,
                        Err(e) => {
                            stats.picks_invalid += 1;
                            warn!(event = %raw.id, error = %e, "Pick dropped");
                        }
                    }
                }

                catalog.insert(event)?;
                stats.events += 1;
            }
        }

        info!(
            events = stats.events,
            picks = stats.picks,
            unknown_station = stats.picks_unknown_station,
            bad_phase = stats.picks_bad_phase,
            invalid = stats.picks_invalid,
            "Catalog loaded"
        );
        Ok((catalog, stats))
    }

    pub fn insert(&mut self, event: Event) -> RegistryResult<()> {
        if self.events.contains_key(event.id()) {
            return Err(RegistryError::DuplicateEvent(event.id().to_string()));
        }
        self.events.insert(event.id().clone(), event);
        Ok(())
    }

    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.events.get(id)
    }

    pub fn get_mut(&mut self, id: &EventId) -> Option<&mut Event> {
        self.events.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EventId> {
        self.events.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddreloc_core::Station;

    const DOC: &str = r#"{
        "resource_id": "smi:local/catalog/test",
        "events": [
            {
                "id": "ev1",
                "event_type": "earthquake",
                "origin": {
                    "time": "2013-05-01T12:00:00Z",
                    "latitude": -38.60,
                    "longitude": 176.10,
                    "depth_km": 4.0,
                    "method_id": "smi:local/nlloc",
                    "quality": {"used_phase_count": 12}
                },
                "magnitude": 1.8,
                "picks": [
                    {"station": "NZ.WIZ", "channel": "EHZ", "phase": "P", "time": "2013-05-01T12:00:01.5Z", "weight": 1.0, "evaluation_mode": "manual"},
                    {"station": "NZ.XXX", "channel": "EHZ", "phase": "P", "time": "2013-05-01T12:00:01.7Z"},
                    {"station": "NZ.WIZ", "channel": "EHN", "phase": "Lg", "time": "2013-05-01T12:00:03.0Z"}
                ]
            }
        ]
    }"#;

    fn stations() -> StationRegistry {
        let mut reg = StationRegistry::new();
        reg.insert(Station::new("NZ.WIZ", -37.5, 177.2, 10.0));
        reg
    }

    #[test]
    fn test_load_drops_unusable_picks() {
        let doc: CatalogDocument = serde_json::from_str(DOC).unwrap();
        let (catalog, stats) = Catalog::from_documents(&[doc], &stations()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(stats.picks, 1);
        assert_eq!(stats.picks_unknown_station, 1);
        assert_eq!(stats.picks_bad_phase, 1);
        let event = catalog.get(&EventId::new("ev1")).unwrap();
        assert_eq!(event.magnitude, Some(1.8));
        assert!(event.pick("NZ.WIZ", Phase::P).is_some());
    }

    #[test]
    fn test_duplicate_events_rejected() {
        let doc: CatalogDocument = serde_json::from_str(DOC).unwrap();
        let result = Catalog::from_documents(&[doc.clone(), doc], &stations());
        assert!(matches!(result, Err(RegistryError::DuplicateEvent(_))));
    }

    #[test]
    fn test_ids_with_whitespace_rejected() {
        let mut doc: CatalogDocument = serde_json::from_str(DOC).unwrap();
        doc.events[0].id = "smi:nz/ev 1".to_string();
        let result = Catalog::from_documents(&[doc.clone()], &stations());
        assert!(matches!(result, Err(RegistryError::InvalidEvent(msg)) if msg.contains("smi:nz/ev 1")));

        doc.events[0].id = String::new();
        assert!(matches!(
            Catalog::from_documents(&[doc], &stations()),
            Err(RegistryError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_apply_locations_preserves_other_fields() {
        let mut doc: CatalogDocument = serde_json::from_str(DOC).unwrap();
        let original = doc.clone();
        let (mut catalog, _) = Catalog::from_documents(&[doc.clone()], &stations()).unwrap();

        let id = EventId::new("ev1");
        let event = catalog.get_mut(&id).unwrap();
        let new_time = event.origin_time + chrono::Duration::milliseconds(40);
        event.relocate(Hypocenter::new(-38.61, 176.11, 4.3).unwrap(), new_time);

        assert_eq!(doc.apply_locations(&catalog), 1);
        let ev = &doc.events[0];
        assert_eq!(ev.origin.latitude, -38.61);
        assert_eq!(ev.origin.depth_km, 4.3);
        assert_eq!(ev.origin.time, new_time);
        assert_eq!(ev.origin.extra, original.events[0].origin.extra);
        assert_eq!(ev.extra, original.events[0].extra);
        assert_eq!(ev.picks, original.events[0].picks);
        assert_eq!(doc.extra, original.extra);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cat.json");
        let doc: CatalogDocument = serde_json::from_str(DOC).unwrap();
        doc.save(&path).unwrap();
        let loaded = CatalogDocument::load(&path).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(
            loaded.events[0].picks[0].extra.get("evaluation_mode"),
            Some(&Value::String("manual".to_string()))
        );
    }

    #[test]
    fn test_merge_keeps_first_header() {
        let a: CatalogDocument = serde_json::from_str(DOC).unwrap();
        let mut b = a.clone();
        b.events[0].id = "ev2".to_string();
        b.extra.insert("resource_id".to_string(), Value::String("other".to_string()));
        let merged = CatalogDocument::merge(vec![a.clone(), b]);
        assert_eq!(merged.events.len(), 2);
        assert_eq!(merged.extra, a.extra);
    }
}
