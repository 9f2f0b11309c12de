//! Parallel cross-correlation of shared picks.

use crate::config::CorrelationConfig;
use crate::diagnostics::{DiagnosticRecord, DiagnosticSink};
use crate::error::{CorrelateError, CorrelateResult};
use crate::filter::Bandpass;
use crate::xcorr::{normalized_xcorr, refine_peak};
use ddreloc_core::{
    epicentral_distance_km, hypocentral_separation_km, seconds_between, DifferentialTime, Event,
    EventId, Limit, Phase, Pick,
};
use ddreloc_registry::{Catalog, StationRegistry, Trace, WaveformSource};
use ddreloc_telemetry::Metrics;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One (pair, station, phase) to correlate. `event_a` is the lower id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationUnit {
    pub event_a: EventId,
    pub event_b: EventId,
    pub station: String,
    pub phase: Phase,
}

/// Geometric limits on which units are worth correlating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateLimits {
    pub max_separation_km: Limit,
    pub max_station_distance_km: Limit,
}

impl Default for CandidateLimits {
    fn default() -> Self {
        Self {
            max_separation_km: Limit::DISABLED,
            max_station_distance_km: Limit::DISABLED,
        }
    }
}

/// Units for every pick shared by two events within the limits, sorted.
pub fn candidate_units(
    catalog: &Catalog,
    stations: &StationRegistry,
    limits: CandidateLimits,
) -> Vec<CorrelationUnit> {
    let events: Vec<&Event> = catalog.iter().collect();
    let mut units = Vec::new();

    for (i, a) in events.iter().enumerate() {
        for b in &events[i + 1..] {
            let separation = hypocentral_separation_km(&a.hypocenter, &b.hypocenter);
            if !limits.max_separation_km.allows(separation) {
                continue;
            }
            for pick in a.picks() {
                if b.pick(&pick.station, pick.phase).is_none() {
                    continue;
                }
                let Some(station) = stations.get(&pick.station) else {
                    continue;
                };
                let within = [a, b].iter().all(|ev| {
                    let d = epicentral_distance_km(
                        ev.hypocenter.latitude,
                        ev.hypocenter.longitude,
                        station.latitude,
                        station.longitude,
                    );
                    limits.max_station_distance_km.allows(d)
                });
                if within {
                    units.push(CorrelationUnit {
                        event_a: a.id().clone(),
                        event_b: b.id().clone(),
                        station: pick.station.clone(),
                        phase: pick.phase,
                    });
                }
            }
        }
    }

    units.sort();
    units
}

/// Why a component or unit produced no observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingPick,
    MissingTrace,
    SamplingRate,
    Filter,
    Window,
    LowCoefficient,
    Error,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingPick => "missing_pick",
            SkipReason::MissingTrace => "missing_trace",
            SkipReason::SamplingRate => "sampling_rate",
            SkipReason::Filter => "filter",
            SkipReason::Window => "window",
            SkipReason::LowCoefficient => "low_coefficient",
            SkipReason::Error => "error",
        }
    }
}

/// Counters for one correlation batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationStats {
    pub units: usize,
    pub observations: usize,
    pub components: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub diagnostics: usize,
}

impl CorrelationStats {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
        Metrics::cc_skipped(reason.as_str());
    }

    fn merge(&mut self, other: &CorrelationStats) {
        self.units += other.units;
        self.observations += other.observations;
        self.components += other.components;
        self.diagnostics += other.diagnostics;
        for (reason, count) in &other.skipped {
            *self.skipped.entry(*reason).or_default() += count;
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationOutput {
    /// Observations in canonical order.
    pub dts: Vec<DifferentialTime>,
    pub stats: CorrelationStats,
}

/// The two picks being correlated.
#[derive(Clone, Copy)]
struct SharedPick<'a> {
    ev_a: &'a Event,
    pick_a: &'a Pick,
    ev_b: &'a Event,
    pick_b: &'a Pick,
}

/// Accepted component measurement.
struct Measurement {
    weight: f64,
    lag: f64,
    coefficient: f64,
}

pub struct Correlator {
    config: CorrelationConfig,
    pool: rayon::ThreadPool,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Correlator {
    pub fn new(config: CorrelationConfig) -> CorrelateResult<Self> {
        config.validate().map_err(CorrelateError::ConfigError)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("ddreloc-cc-{i}"))
            .build()
            .map_err(|e| CorrelateError::ThreadPool(e.to_string()))?;
        Ok(Self {
            config,
            pool,
            sink: None,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Correlate every unit. Failures are counted, never propagated.
    pub fn correlate(
        &self,
        catalog: &Catalog,
        waveforms: &dyn WaveformSource,
        units: &[CorrelationUnit],
    ) -> CorrelationOutput {
        info!(
            units = units.len(),
            workers = self.config.workers,
            "Starting cross-correlation"
        );

        let ordinals = pair_ordinals(units);
        let results: Vec<(Option<DifferentialTime>, CorrelationStats)> = self.pool.install(|| {
            units
                .par_iter()
                .zip(ordinals.par_iter())
                .map(|(unit, &pair)| self.correlate_unit(catalog, waveforms, unit, pair))
                .collect()
        });

        let mut output = CorrelationOutput::default();
        for (dt, stats) in results {
            output.stats.merge(&stats);
            if let Some(dt) = dt {
                output.dts.push(dt);
            }
        }
        output.dts.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        for phase in [Phase::P, Phase::S] {
            let count = output.dts.iter().filter(|dt| dt.phase == phase).count();
            Metrics::dt_produced("cc", &phase.to_string(), count);
        }
        info!(
            units = output.stats.units,
            observations = output.stats.observations,
            skipped = output.stats.skipped_total(),
            diagnostics = output.stats.diagnostics,
            "Cross-correlation complete"
        );
        output
    }

    fn correlate_unit(
        &self,
        catalog: &Catalog,
        waveforms: &dyn WaveformSource,
        unit: &CorrelationUnit,
        pair_ordinal: usize,
    ) -> (Option<DifferentialTime>, CorrelationStats) {
        let mut stats = CorrelationStats {
            units: 1,
            ..Default::default()
        };

        let components = self.config.components(unit.phase);
        if components.is_empty() {
            return (None, stats);
        }

        let picked = catalog.get(&unit.event_a).zip(catalog.get(&unit.event_b));
        let Some((ev_a, ev_b)) = picked else {
            stats.skip(SkipReason::MissingPick);
            return (None, stats);
        };
        let (Some(pick_a), Some(pick_b)) = (
            ev_a.pick(&unit.station, unit.phase),
            ev_b.pick(&unit.station, unit.phase),
        ) else {
            stats.skip(SkipReason::MissingPick);
            return (None, stats);
        };

        let shared = SharedPick {
            ev_a,
            pick_a,
            ev_b,
            pick_b,
        };
        let emit = self.sink.is_some()
            && self.config.plot_interval > 0
            && pair_ordinal % self.config.plot_interval == 0;

        let mut accepted = Vec::new();
        for (component, weight) in components {
            stats.components += 1;
            match self.measure(waveforms, unit, &shared, component, emit, &mut stats) {
                Ok(m) => accepted.push(Measurement { weight, ..m }),
                Err(reason) => {
                    debug!(
                        pair = %format!("{}-{}", unit.event_a, unit.event_b),
                        station = %unit.station,
                        phase = %unit.phase,
                        component = %component,
                        reason = reason.as_str(),
                        "Component skipped"
                    );
                    stats.skip(reason);
                }
            }
        }

        let total_weight: f64 = accepted.iter().map(|m| m.weight).sum();
        if accepted.is_empty() || total_weight <= 0.0 {
            return (None, stats);
        }
        let lag = accepted.iter().map(|m| m.weight * m.lag).sum::<f64>() / total_weight;
        // Every accepted component is at or above the minimum, so the mean is too.
        let coefficient =
            accepted.iter().map(|m| m.weight * m.coefficient).sum::<f64>() / total_weight;

        let value = ev_a.travel_time(pick_a) - (ev_b.travel_time(pick_b) + lag);
        Metrics::cc_coefficient(coefficient);
        stats.observations += 1;
        let dt = DifferentialTime::cross_correlation(
            unit.event_a.clone(),
            unit.event_b.clone(),
            unit.station.clone(),
            unit.phase,
            value,
            coefficient,
        )
        .canonical();
        (Some(dt), stats)
    }

    /// Correlate one component. The weight of the returned measurement is
    /// filled in by the caller.
    fn measure(
        &self,
        waveforms: &dyn WaveformSource,
        unit: &CorrelationUnit,
        shared: &SharedPick<'_>,
        component: char,
        emit: bool,
        stats: &mut CorrelationStats,
    ) -> Result<Measurement, SkipReason> {
        let SharedPick {
            ev_a,
            pick_a,
            ev_b,
            pick_b,
        } = *shared;
        let channel_a = pick_a.channel_for_component(component);
        let channel_b = pick_b.channel_for_component(component);
        let trace_a = fetch(waveforms, ev_a.id(), &unit.station, &channel_a)?;
        let trace_b = fetch(waveforms, ev_b.id(), &unit.station, &channel_b)?;

        let fs = trace_a.sampling_rate;
        if (fs - trace_b.sampling_rate).abs() > 1e-6 * fs {
            return Err(SkipReason::SamplingRate);
        }
        let bandpass = Bandpass::new(
            self.config.filter_min_freq,
            self.config.filter_max_freq,
            fs,
            self.config.filter_corners,
        )
        .map_err(|_| SkipReason::Filter)?;

        let n_before = (self.config.time_before * fs).round() as i64;
        let n_after = (self.config.time_after * fs).round() as i64;
        let maxlag = ((self.config.maxlag * fs).round() as i64).max(1);
        let len = (n_before + n_after).max(2) as usize;
        // Two periods of the low corner on each side absorb filter start-up.
        let pad = (2.0 * fs / self.config.filter_min_freq).ceil() as usize;

        let start_a = trace_a.sample_index(pick_a.time) - n_before;
        let zero_lag_b = trace_b.sample_index(pick_b.time) - n_before;
        let start_b = zero_lag_b - maxlag;
        let len_b = len + 2 * maxlag as usize;

        let window_a =
            filtered_window(&trace_a, start_a, len, pad, &bandpass).ok_or(SkipReason::Window)?;
        let window_b =
            filtered_window(&trace_b, start_b, len_b, pad, &bandpass).ok_or(SkipReason::Window)?;

        let cc = normalized_xcorr(&window_a, &window_b);
        let peak = refine_peak(&cc, maxlag as usize).ok_or(SkipReason::Window)?;

        // Window starts relative to each pick, so sub-sample pick offsets survive rounding.
        let offset_a = seconds_between(trace_a.start_time, pick_a.time) + start_a as f64 / fs;
        let offset_b =
            seconds_between(trace_b.start_time, pick_b.time) + (zero_lag_b as f64 + peak.shift) / fs;
        let lag = offset_b - offset_a;
        let accepted = peak.coefficient >= self.config.min_coefficient;

        if emit {
            if let Some(sink) = &self.sink {
                let record = DiagnosticRecord {
                    event_a: unit.event_a.clone(),
                    event_b: unit.event_b.clone(),
                    station: unit.station.clone(),
                    phase: unit.phase,
                    channel: channel_a.clone(),
                    sampling_rate: fs,
                    lag,
                    coefficient: peak.coefficient,
                    accepted,
                    correlation: cc,
                    window_a,
                    window_b,
                };
                match sink.record(record) {
                    Ok(()) => stats.diagnostics += 1,
                    Err(e) => warn!(error = %e, "Diagnostic sink failed"),
                }
            }
        }

        if !accepted {
            return Err(SkipReason::LowCoefficient);
        }
        Ok(Measurement {
            weight: 0.0,
            lag,
            coefficient: peak.coefficient,
        })
    }
}

fn fetch(
    waveforms: &dyn WaveformSource,
    event: &EventId,
    station: &str,
    channel: &str,
) -> Result<Trace, SkipReason> {
    match waveforms.trace(event, station, channel) {
        Ok(Some(trace)) => Ok(trace),
        Ok(None) => Err(SkipReason::MissingTrace),
        Err(e) => {
            warn!(event = %event, station, channel, error = %e, "Trace could not be read");
            Err(SkipReason::Error)
        }
    }
}

/// Ordinal of each unit's event pair, counting distinct pairs in order of
/// first appearance.
fn pair_ordinals(units: &[CorrelationUnit]) -> Vec<usize> {
    let mut seen: BTreeMap<(&EventId, &EventId), usize> = BTreeMap::new();
    units
        .iter()
        .map(|unit| {
            let next = seen.len();
            *seen.entry((&unit.event_a, &unit.event_b)).or_insert(next)
        })
        .collect()
}

/// Filter `len` samples starting at `start`, using up to `pad` samples of
/// context on each side. `None` if the window leaves the trace.
fn filtered_window(
    trace: &Trace,
    start: i64,
    len: usize,
    pad: usize,
    bandpass: &Bandpass,
) -> Option<Vec<f64>> {
    trace.slice(start, len)?;
    let start = start as usize;
    let seg_start = start.saturating_sub(pad);
    let seg_end = (start + len + pad).min(trace.samples.len());
    let filtered = bandpass.filter(&trace.samples[seg_start..seg_end]);
    let offset = start - seg_start;
    Some(filtered[offset..offset + len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnosticSink;
    use chrono::{DateTime, TimeZone, Utc};
    use ddreloc_core::{offset_seconds, Hypocenter, Station};
    use ddreloc_registry::MemoryWaveformStore;
    use std::f64::consts::PI;

    const FS: f64 = 100.0;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 5, 1, 12, 0, 0).unwrap()
    }

    fn ricker(t: f64, freq: f64) -> f64 {
        let a = (PI * freq * t).powi(2);
        (1.0 - 2.0 * a) * (-a).exp()
    }

    /// Trace starting 2 s before `pick` whose wavelet arrives `delay` s after it.
    fn trace(event: &str, station: &str, channel: &str, pick: DateTime<Utc>, delay: f64) -> Trace {
        let samples = (0..500)
            .map(|i| ricker(i as f64 / FS - 2.0 - delay, 8.0))
            .collect();
        Trace::new(event, station, channel, offset_seconds(pick, -2.0), FS, samples).unwrap()
    }

    struct Scenario {
        catalog: Catalog,
        stations: StationRegistry,
        store: MemoryWaveformStore,
    }

    /// ev1 at t0 and ev2 one minute later, both picked at `stations`.
    /// ev2's picks are late by 0.02 s and its wavelets a further 0.03 s.
    fn scenario(station_codes: &[&str]) -> Scenario {
        let mut ev1 = Event::new(
            EventId::new("ev1"),
            t0(),
            Hypocenter::new(-38.60, 176.10, 4.0).unwrap(),
        );
        let mut ev2 = Event::new(
            EventId::new("ev2"),
            offset_seconds(t0(), 60.0),
            Hypocenter::new(-38.601, 176.101, 4.2).unwrap(),
        );
        let mut stations = StationRegistry::new();
        let mut store = MemoryWaveformStore::new();

        for (i, code) in station_codes.iter().enumerate() {
            stations.insert(Station::new(*code, -38.5 + 0.01 * i as f64, 176.2, 100.0));
            let tt = 1.5 + 0.1 * i as f64;
            let pick1 = offset_seconds(ev1.origin_time, tt);
            let pick2 = offset_seconds(ev2.origin_time, tt + 0.02);
            ev1.add_pick(Pick::new(*code, "HHZ", Phase::P, pick1, 1.0).unwrap())
                .unwrap();
            ev2.add_pick(Pick::new(*code, "HHZ", Phase::P, pick2, 1.0).unwrap())
                .unwrap();
            ev1.add_pick(Pick::new(*code, "HHN", Phase::S, offset_seconds(pick1, 1.0), 1.0).unwrap())
                .unwrap();
            ev2.add_pick(Pick::new(*code, "HHN", Phase::S, offset_seconds(pick2, 1.0), 1.0).unwrap())
                .unwrap();
            store.insert(trace("ev1", code, "HHZ", pick1, 0.0));
            store.insert(trace("ev2", code, "HHZ", pick2, 0.03));
            store.insert(trace("ev1", code, "HHN", offset_seconds(pick1, 1.0), 0.0));
            store.insert(trace("ev2", code, "HHN", offset_seconds(pick2, 1.0), 0.03));
        }

        Scenario {
            catalog: Catalog::from_events(vec![ev1, ev2]).unwrap(),
            stations,
            store,
        }
    }

    fn config(workers: usize) -> CorrelationConfig {
        CorrelationConfig {
            workers,
            ..Default::default()
        }
    }

    #[test]
    fn test_recovers_known_lag() {
        let s = scenario(&["NZ.WIZ"]);
        let units = candidate_units(&s.catalog, &s.stations, CandidateLimits::default());
        assert_eq!(units.len(), 2);

        let correlator = Correlator::new(config(1)).unwrap();
        let out = correlator.correlate(&s.catalog, &s.store, &units);
        assert_eq!(out.dts.len(), 1);

        let dt = &out.dts[0];
        assert_eq!(dt.phase, Phase::P);
        assert_eq!(dt.event_a.as_str(), "ev1");
        // 1.5 - (1.52 + 0.03)
        assert!((dt.value + 0.05).abs() < 2e-3, "dt {}", dt.value);
        assert!(dt.weight > 0.95 && dt.weight <= 1.0);
    }

    #[test]
    fn test_empty_weighting_disables_phase() {
        let s = scenario(&["NZ.WIZ", "NZ.WSRZ"]);
        let units = candidate_units(&s.catalog, &s.stations, CandidateLimits::default());
        let correlator = Correlator::new(config(2)).unwrap();
        let out = correlator.correlate(&s.catalog, &s.store, &units);
        assert!(out.dts.iter().all(|dt| dt.phase == Phase::P));
        assert_eq!(out.stats.components, 2);

        let mut only_s = config(2);
        only_s.p_phase_weighting.clear();
        only_s.s_phase_weighting.insert("N".to_string(), 1.0);
        let out = Correlator::new(only_s)
            .unwrap()
            .correlate(&s.catalog, &s.store, &units);
        assert_eq!(out.dts.len(), 2);
        assert!(out.dts.iter().all(|dt| dt.phase == Phase::S));
    }

    #[test]
    fn test_coefficient_threshold_is_inclusive() {
        let s = scenario(&["NZ.WIZ"]);
        let units = candidate_units(&s.catalog, &s.stations, CandidateLimits::default());
        let measured = Correlator::new(config(1))
            .unwrap()
            .correlate(&s.catalog, &s.store, &units)
            .dts[0]
            .weight;

        let at = CorrelationConfig {
            min_coefficient: measured,
            ..config(1)
        };
        let out = Correlator::new(at)
            .unwrap()
            .correlate(&s.catalog, &s.store, &units);
        assert_eq!(out.dts.len(), 1);

        let above = CorrelationConfig {
            min_coefficient: measured + 1e-9,
            ..config(1)
        };
        let out = Correlator::new(above)
            .unwrap()
            .correlate(&s.catalog, &s.store, &units);
        assert!(out.dts.is_empty());
        assert_eq!(out.stats.skipped.get(&SkipReason::LowCoefficient), Some(&1));
    }

    #[test]
    fn test_missing_trace_is_skipped() {
        let s = scenario(&["NZ.WIZ"]);
        let mut store = MemoryWaveformStore::new();
        let id = EventId::new("ev1");
        if let Some(tr) = s.store.trace(&id, "NZ.WIZ", "HHZ").unwrap() {
            store.insert(tr);
        }
        let units = candidate_units(&s.catalog, &s.stations, CandidateLimits::default());
        let out = Correlator::new(config(1))
            .unwrap()
            .correlate(&s.catalog, &store, &units);
        assert!(out.dts.is_empty());
        assert_eq!(out.stats.skipped.get(&SkipReason::MissingTrace), Some(&1));
    }

    #[test]
    fn test_output_independent_of_worker_count() {
        let s = scenario(&["NZ.A", "NZ.B", "NZ.C", "NZ.D", "NZ.E"]);
        let units = candidate_units(&s.catalog, &s.stations, CandidateLimits::default());
        let one = Correlator::new(config(1))
            .unwrap()
            .correlate(&s.catalog, &s.store, &units);
        let four = Correlator::new(config(4))
            .unwrap()
            .correlate(&s.catalog, &s.store, &units);
        assert_eq!(one.dts.len(), 5);
        assert_eq!(one.dts, four.dts);
        assert_eq!(one.stats, four.stats);
    }

    fn plotting_config(interval: usize) -> CorrelationConfig {
        CorrelationConfig {
            plot_interval: interval,
            plot_dir: Some("unused".into()),
            ..config(2)
        }
    }

    #[test]
    fn test_diagnostics_cover_every_unit_of_a_plotted_pair() {
        let s = scenario(&["NZ.A", "NZ.B", "NZ.C", "NZ.D"]);
        let units = candidate_units(&s.catalog, &s.stations, CandidateLimits::default());
        assert_eq!(units.len(), 8);
        let sink = Arc::new(MemoryDiagnosticSink::new());
        let out = Correlator::new(plotting_config(2))
            .unwrap()
            .with_sink(sink.clone())
            .correlate(&s.catalog, &s.store, &units);
        // One pair; its four P units have one component each and S has none.
        assert_eq!(out.stats.diagnostics, 4);
        assert_eq!(sink.records().len(), 4);
    }

    #[test]
    fn test_diagnostics_every_nth_pair() {
        let mut s = scenario(&["NZ.WIZ"]);
        let mut ev3 = Event::new(
            EventId::new("ev3"),
            offset_seconds(t0(), 120.0),
            Hypocenter::new(-38.602, 176.102, 4.1).unwrap(),
        );
        let pick = offset_seconds(ev3.origin_time, 1.5);
        ev3.add_pick(Pick::new("NZ.WIZ", "HHZ", Phase::P, pick, 1.0).unwrap())
            .unwrap();
        s.store.insert(trace("ev3", "NZ.WIZ", "HHZ", pick, 0.01));
        s.catalog = Catalog::from_events(s.catalog.iter().cloned().chain([ev3])).unwrap();

        let units = candidate_units(&s.catalog, &s.stations, CandidateLimits::default());
        // (ev1, ev2) P and S, then one P unit for each pair with ev3.
        assert_eq!(units.len(), 4);
        let sink = Arc::new(MemoryDiagnosticSink::new());
        let out = Correlator::new(plotting_config(2))
            .unwrap()
            .with_sink(sink.clone())
            .correlate(&s.catalog, &s.store, &units);

        let pairs: Vec<(String, String)> = sink
            .records()
            .iter()
            .map(|r| (r.event_a.to_string(), r.event_b.to_string()))
            .collect();
        assert_eq!(out.stats.diagnostics, 2);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&("ev1".to_string(), "ev2".to_string())));
        assert!(pairs.contains(&("ev2".to_string(), "ev3".to_string())));
    }

    #[test]
    fn test_pair_ordinals_count_distinct_pairs() {
        let unit = |a: &str, b: &str, station: &str| CorrelationUnit {
            event_a: EventId::new(a),
            event_b: EventId::new(b),
            station: station.to_string(),
            phase: Phase::P,
        };
        let units = vec![
            unit("ev1", "ev2", "NZ.A"),
            unit("ev1", "ev2", "NZ.B"),
            unit("ev1", "ev3", "NZ.A"),
            unit("ev2", "ev3", "NZ.A"),
            unit("ev2", "ev3", "NZ.B"),
        ];
        assert_eq!(pair_ordinals(&units), vec![0, 0, 1, 2, 2]);
    }

    #[test]
    fn test_candidate_limits() {
        let s = scenario(&["NZ.WIZ"]);
        let tight = CandidateLimits {
            max_separation_km: Limit::new(0.01),
            ..Default::default()
        };
        assert!(candidate_units(&s.catalog, &s.stations, tight).is_empty());

        let near_only = CandidateLimits {
            max_station_distance_km: Limit::new(1.0),
            ..Default::default()
        };
        assert!(candidate_units(&s.catalog, &s.stations, near_only).is_empty());
    }
}
