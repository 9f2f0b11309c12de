//! Iterative double-difference relocation.

use crate::cluster::{clusters, Cluster};
use crate::config::{AirQuakePolicy, InversionConfig, StartLocation};
use crate::error::{InversionError, InversionResult, NumericalError};
use crate::solver::{LinearSystem, Solver, SolverError, SvdSolver};
use chrono::{DateTime, Utc};
use ddreloc_core::{
    azimuth_deg, azimuthal_gap_deg, centroid, epicentral_distance_km, offset_seconds,
    DifferentialTime, DtSource, EventId, Hypocenter, IterationStage, LocalFrame, OutlierCutoff,
    VelocityModel,
};
use ddreloc_linker::NeighborGraph;
use ddreloc_registry::{Catalog, StationRegistry};
use ddreloc_telemetry::Metrics;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Unknowns per event: east, north, depth, origin time.
const PARAMS: usize = 4;

/// Residual spread (s) below which a dynamic outlier cutoff is not applied.
const MIN_RESIDUAL_SPREAD_S: f64 = 1e-9;

/// Outcome of one iteration, one line of `stages.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationReport {
    pub cluster: usize,
    pub stage: usize,
    /// Iteration within the stage.
    pub iteration: usize,
    /// Iteration counted across all stages of the cluster.
    pub global_iteration: usize,
    pub events: usize,
    pub rows_cc: usize,
    pub rows_ct: usize,
    pub outliers_cc: usize,
    pub outliers_ct: usize,
    pub rms_cc_ms: Option<f64>,
    pub rms_ct_ms: Option<f64>,
    /// `None` when no rows were active and nothing was solved.
    pub condition_number: Option<f64>,
    /// Mean absolute (east, north, depth) shift in metres.
    pub mean_shift_m: [f64; 3],
    pub mean_origin_shift_ms: f64,
    pub air_quakes: Vec<EventId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelocationSummary {
    pub clusters: usize,
    pub iterations: usize,
    pub relocated: Vec<EventId>,
    pub air_quakes: Vec<EventId>,
    /// Catalog events that were not part of any relocated cluster.
    pub unrelocated: usize,
}

/// Relocates the events of a neighbor graph.
pub struct RelocationEngine {
    config: InversionConfig,
    velocity: VelocityModel,
    solver: Box<dyn Solver>,
}

struct Observation<'a> {
    dt: &'a DifferentialTime,
    a: usize,
    b: usize,
    station_x: f64,
    station_y: f64,
    station_depth_km: f64,
}

#[derive(Debug, Clone)]
struct EventState {
    id: EventId,
    /// Local east, north (km), depth (km), origin shift (s).
    m: [f64; PARAMS],
    initial: [f64; PARAMS],
    catalog_hypocenter: Hypocenter,
    catalog_origin: DateTime<Utc>,
    active: bool,
    air_quake: bool,
}

struct Row {
    a: usize,
    b: usize,
    source: DtSource,
    residual: f64,
    weight: f64,
    partials_a: [f64; PARAMS],
    partials_b: [f64; PARAMS],
}

struct ClusterContext<'a> {
    index: usize,
    frame: LocalFrame,
    observations: Vec<Observation<'a>>,
}

impl RelocationEngine {
    pub fn new(config: InversionConfig, velocity: VelocityModel) -> InversionResult<Self> {
        config.validate().map_err(InversionError::ConfigError)?;
        Ok(Self {
            config,
            velocity,
            solver: Box::new(SvdSolver::default()),
        })
    }

    pub fn with_solver(mut self, solver: Box<dyn Solver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn config(&self) -> &InversionConfig {
        &self.config
    }

    /// Relocate every cluster of `graph`, largest first.
    ///
    /// Hypocenters and origin times in `catalog` are updated at the end of
    /// each stage. `observer` sees every iteration report as it is produced.
    pub fn relocate(
        &self,
        catalog: &mut Catalog,
        graph: &NeighborGraph,
        stations: &StationRegistry,
        observer: &mut dyn FnMut(&IterationReport),
    ) -> InversionResult<RelocationSummary> {
        let clusters = clusters(graph, &self.config);
        let mut summary = RelocationSummary {
            clusters: clusters.len(),
            ..Default::default()
        };
        info!(
            clusters = clusters.len(),
            pairs = graph.len(),
            stages = self.config.stages.len(),
            "Starting relocation"
        );

        for (index, cluster) in clusters.iter().enumerate() {
            self.relocate_cluster(index, cluster, catalog, graph, stations, observer, &mut summary)?;
        }

        summary.relocated.sort();
        summary.air_quakes.sort();
        summary.unrelocated = catalog.len() - summary.relocated.len();
        Metrics::events_relocated(summary.relocated.len());
        info!(
            relocated = summary.relocated.len(),
            air_quakes = summary.air_quakes.len(),
            unrelocated = summary.unrelocated,
            iterations = summary.iterations,
            "Relocation complete"
        );
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn relocate_cluster(
        &self,
        index: usize,
        cluster: &Cluster,
        catalog: &mut Catalog,
        graph: &NeighborGraph,
        stations: &StationRegistry,
        observer: &mut dyn FnMut(&IterationReport),
        summary: &mut RelocationSummary,
    ) -> InversionResult<()> {
        let events: Vec<_> = cluster
            .events
            .iter()
            .filter_map(|id| catalog.get(id))
            .collect();
        let Some(frame) = LocalFrame::centred_on(events.iter().map(|e| &e.hypocenter)) else {
            return Ok(());
        };
        let Some(center) = centroid(events.iter().map(|e| &e.hypocenter)) else {
            return Ok(());
        };

        let mut states: Vec<EventState> = events
            .iter()
            .map(|event| {
                let (x, y) = frame.to_local(event.hypocenter.latitude, event.hypocenter.longitude);
                let m = match self.config.start {
                    StartLocation::Catalog => [x, y, event.hypocenter.depth_km, 0.0],
                    StartLocation::ClusterCentroid => {
                        let (cx, cy) = frame.to_local(center.latitude, center.longitude);
                        [cx, cy, center.depth_km, 0.0]
                    }
                };
                EventState {
                    id: event.id().clone(),
                    m,
                    initial: m,
                    catalog_hypocenter: event.hypocenter,
                    catalog_origin: event.origin_time,
                    active: true,
                    air_quake: false,
                }
            })
            .collect();

        let slot: BTreeMap<&EventId, usize> =
            states.iter().enumerate().map(|(i, s)| (&s.id, i)).collect();
        let observations = self.select_observations(cluster, catalog, graph, stations, &slot, &center, &frame);

        let with_data: BTreeSet<usize> = observations.iter().flat_map(|o| [o.a, o.b]).collect();
        for (i, state) in states.iter_mut().enumerate() {
            state.active = with_data.contains(&i);
        }
        debug!(
            cluster = index,
            events = states.len(),
            with_data = with_data.len(),
            observations = observations.len(),
            "Cluster data selected"
        );
        if observations.is_empty() {
            warn!(cluster = index, "Cluster has no usable observations");
            return Ok(());
        }

        let ctx = ClusterContext {
            index,
            frame,
            observations,
        };
        let mut global_iteration = 0;
        for (stage_index, stage) in self.config.stages.iter().enumerate() {
            for iteration in 0..stage.niter as usize {
                let report = self.iterate(&ctx, stage_index, iteration, global_iteration, stage, &mut states)?;
                observer(&report);
                global_iteration += 1;
                summary.iterations += 1;
            }
            self.write_back(&ctx.frame, &states, catalog)?;
        }

        for state in &states {
            if state.air_quake {
                summary.air_quakes.push(state.id.clone());
            } else if state.active {
                summary.relocated.push(state.id.clone());
            }
        }
        Ok(())
    }

    /// Observations of the cluster that pass data type, phase and station
    /// geometry selection.
    #[allow(clippy::too_many_arguments)]
    fn select_observations<'a>(
        &self,
        cluster: &Cluster,
        catalog: &Catalog,
        graph: &'a NeighborGraph,
        stations: &StationRegistry,
        slot: &BTreeMap<&EventId, usize>,
        center: &Hypocenter,
        frame: &LocalFrame,
    ) -> Vec<Observation<'a>> {
        let mut selected = Vec::new();
        for pair in graph.pairs() {
            if !cluster.contains(&pair.key.first) || !cluster.contains(&pair.key.second) {
                continue;
            }
            let (Some(a), Some(b)) = (catalog.get(&pair.key.first), catalog.get(&pair.key.second))
            else {
                continue;
            };
            let (Some(&ia), Some(&ib)) = (slot.get(&pair.key.first), slot.get(&pair.key.second))
            else {
                continue;
            };
            let Some(pair_center) = centroid([&a.hypocenter, &b.hypocenter]) else {
                continue;
            };

            let mut pair_obs = Vec::new();
            for dt in &pair.observations {
                if !self.config.data.includes(dt.source) || !self.config.phases.includes(dt.phase) {
                    continue;
                }
                let Some(station) = stations.get(&dt.station) else {
                    continue;
                };
                let from_center = epicentral_distance_km(
                    center.latitude,
                    center.longitude,
                    station.latitude,
                    station.longitude,
                );
                if !self.config.max_centroid_distance_km.allows(from_center) {
                    continue;
                }
                let from_pair = epicentral_distance_km(
                    pair_center.latitude,
                    pair_center.longitude,
                    station.latitude,
                    station.longitude,
                );
                if let Some(min) = self.config.min_station_distance_km.value() {
                    if from_pair < min {
                        continue;
                    }
                }
                if !self.config.max_station_distance_km.allows(from_pair) {
                    continue;
                }
                let (station_x, station_y) = frame.to_local(station.latitude, station.longitude);
                let azimuth = azimuth_deg(
                    pair_center.latitude,
                    pair_center.longitude,
                    station.latitude,
                    station.longitude,
                );
                pair_obs.push((
                    azimuth,
                    Observation {
                        dt,
                        a: ia,
                        b: ib,
                        station_x,
                        station_y,
                        station_depth_km: station.depth_km(),
                    },
                ));
            }

            if let Some(max_gap) = self.config.max_gap_deg.value() {
                let azimuths: Vec<f64> = pair_obs
                    .iter()
                    .map(|(az, o)| (o.dt.station.as_str(), *az))
                    .collect::<BTreeMap<&str, f64>>()
                    .into_values()
                    .collect();
                if azimuthal_gap_deg(&azimuths) > max_gap {
                    debug!(pair = %pair.key, "Pair dropped by azimuthal gap");
                    continue;
                }
            }
            selected.extend(pair_obs.into_iter().map(|(_, o)| o));
        }
        selected
    }

    fn iterate(
        &self,
        ctx: &ClusterContext<'_>,
        stage_index: usize,
        iteration: usize,
        global_iteration: usize,
        stage: &IterationStage,
        states: &mut [EventState],
    ) -> InversionResult<IterationReport> {
        let mut rows = Vec::new();
        for obs in &ctx.observations {
            if let Some(row) = self.row(obs, stage, states) {
                rows.push(row);
            }
        }

        let mut outliers = BTreeMap::new();
        for source in [DtSource::CrossCorrelation, DtSource::Catalog] {
            let residuals: Vec<f64> = rows
                .iter()
                .filter(|r| r.source == source)
                .map(|r| r.residual)
                .collect();
            let cutoff = stage.outlier_cutoff(source);
            // Static cutoffs bound the residual itself; dynamic ones bound its
            // distance from the mean of that data type.
            let (centre, threshold) = match cutoff {
                OutlierCutoff::Disabled => continue,
                OutlierCutoff::Static(seconds) => (0.0, seconds),
                OutlierCutoff::Dynamic(_) => {
                    let Some((mean, spread)) = mean_and_std(&residuals) else {
                        continue;
                    };
                    if spread < MIN_RESIDUAL_SPREAD_S {
                        continue;
                    }
                    match cutoff.threshold(spread) {
                        Some(threshold) => (mean, threshold),
                        None => continue,
                    }
                }
            };
            let before = rows.len();
            rows.retain(|r| r.source != source || (r.residual - centre).abs() <= threshold);
            outliers.insert(source, before - rows.len());
        }

        let rms = |source: DtSource| -> Option<f64> {
            let r: Vec<f64> = rows
                .iter()
                .filter(|r| r.source == source)
                .map(|r| r.residual)
                .collect();
            (!r.is_empty()).then(|| 1000.0 * (r.iter().map(|v| v * v).sum::<f64>() / r.len() as f64).sqrt())
        };
        let rms_cc_ms = rms(DtSource::CrossCorrelation);
        let rms_ct_ms = rms(DtSource::Catalog);
        let rows_cc = rows.iter().filter(|r| r.source == DtSource::CrossCorrelation).count();
        let rows_ct = rows.len() - rows_cc;

        let mut shift = [0.0; PARAMS];
        let mut moved = 0usize;
        let mut condition_number = None;
        if !rows.is_empty() {
            let columns: BTreeMap<usize, usize> = rows
                .iter()
                .flat_map(|r| [r.a, r.b])
                .collect::<BTreeSet<usize>>()
                .into_iter()
                .enumerate()
                .map(|(col, event)| (event, col))
                .collect();
            let system = build_system(&rows, &columns, stage.damp);
            let fail = |reason: SolverError| NumericalError {
                stage: stage_index,
                iteration,
                cluster: ctx.index,
                reason,
            };
            let solution = self.solver.solve(&system).map_err(fail)?;
            if solution.x.len() != system.unknowns() || solution.x.iter().any(|v| !v.is_finite()) {
                return Err(fail(SolverError::NonFinite).into());
            }

            for (&event, &col) in &columns {
                for k in 0..PARAMS {
                    let delta = solution.x[col * PARAMS + k];
                    states[event].m[k] += delta;
                    shift[k] += delta.abs();
                }
            }
            moved = columns.len();
            condition_number = Some(solution.condition_number);
        }
        if moved > 0 {
            for s in &mut shift {
                *s /= moved as f64;
            }
        }

        let mut air_quakes = Vec::new();
        if self.config.air_quakes == AirQuakePolicy::Remove {
            for state in states.iter_mut().filter(|s| s.active) {
                if state.m[2] < self.config.air_quake_depth_km {
                    state.active = false;
                    state.air_quake = true;
                    air_quakes.push(state.id.clone());
                }
            }
            if !air_quakes.is_empty() {
                warn!(cluster = ctx.index, stage = stage_index, iteration, events = ?air_quakes, "Air quakes removed");
                Metrics::air_quakes(air_quakes.len());
            }
        }

        Metrics::iteration(rms_cc_ms, rms_ct_ms, condition_number.unwrap_or(0.0));
        let report = IterationReport {
            cluster: ctx.index,
            stage: stage_index,
            iteration,
            global_iteration,
            events: states.iter().filter(|s| s.active).count(),
            rows_cc,
            rows_ct,
            outliers_cc: outliers.get(&DtSource::CrossCorrelation).copied().unwrap_or(0),
            outliers_ct: outliers.get(&DtSource::Catalog).copied().unwrap_or(0),
            rms_cc_ms,
            rms_ct_ms,
            condition_number,
            mean_shift_m: [shift[0] * 1000.0, shift[1] * 1000.0, shift[2] * 1000.0],
            mean_origin_shift_ms: shift[3] * 1000.0,
            air_quakes,
        };
        debug!(
            cluster = report.cluster,
            stage = report.stage,
            iteration = report.iteration,
            rows_cc,
            rows_ct,
            rms_cc_ms = ?report.rms_cc_ms,
            rms_ct_ms = ?report.rms_ct_ms,
            condition_number = ?report.condition_number,
            "Iteration complete"
        );
        Ok(report)
    }

    /// Weighted residual row for one observation, or `None` if excluded.
    fn row(&self, obs: &Observation<'_>, stage: &IterationStage, states: &[EventState]) -> Option<Row> {
        let (sa, sb) = (&states[obs.a], &states[obs.b]);
        if !sa.active || !sb.active {
            return None;
        }
        let dt = obs.dt;
        let stage_weight = stage.weight(dt.source, dt.phase)?;

        let separation = ((sa.m[0] - sb.m[0]).powi(2)
            + (sa.m[1] - sb.m[1]).powi(2)
            + (sa.m[2] - sb.m[2]).powi(2))
        .sqrt();
        let taper = match stage.max_separation(dt.source).value() {
            Some(limit) if separation > limit => return None,
            Some(limit) if limit > 0.0 => (1.0 - (separation / limit).powi(3)).powi(3),
            _ => 1.0,
        };
        let weight = stage_weight * dt.weight * taper;
        if weight <= 0.0 {
            return None;
        }

        let (ta, partials_a) = self.predict(obs, sa);
        let (tb, partials_b) = self.predict(obs, sb);
        let residual = dt.value - (sa.m[3] - sb.m[3]) - (ta - tb);
        Some(Row {
            a: obs.a,
            b: obs.b,
            source: dt.source,
            residual,
            weight,
            partials_a,
            partials_b,
        })
    }

    /// Travel time and partial derivatives from an event to the observation's station.
    fn predict(&self, obs: &Observation<'_>, state: &EventState) -> (f64, [f64; PARAMS]) {
        let dx = obs.station_x - state.m[0];
        let dy = obs.station_y - state.m[1];
        let ray = self
            .velocity
            .travel_time(obs.dt.phase, state.m[2], obs.station_depth_km, dx.hypot(dy));
        let [tx, ty, tz] = ray.source_derivatives(dx, dy);
        (ray.time, [tx, ty, tz, 1.0])
    }

    /// Copy current states into the catalog. Air quakes get their catalog
    /// location back; events that never moved are left untouched.
    fn write_back(&self, frame: &LocalFrame, states: &[EventState], catalog: &mut Catalog) -> InversionResult<()> {
        for state in states {
            let Some(event) = catalog.get_mut(&state.id) else {
                continue;
            };
            if state.air_quake {
                event.relocate(state.catalog_hypocenter, state.catalog_origin);
                continue;
            }
            if !state.active {
                continue;
            }
            if state.m == state.initial && self.config.start == StartLocation::Catalog {
                continue;
            }
            let (latitude, longitude) = frame.to_geographic(state.m[0], state.m[1]);
            let hypocenter = Hypocenter::new(latitude, longitude, state.m[2])?;
            event.relocate(hypocenter, offset_seconds(state.catalog_origin, state.m[3]));
        }
        Ok(())
    }
}

/// `[W·G; λI; C] Δm = [W·r; 0; 0]` where `C` pins the mean shift of each
/// parameter to zero.
fn build_system(rows: &[Row], columns: &BTreeMap<usize, usize>, damp: f64) -> LinearSystem {
    let unknowns = columns.len() * PARAMS;
    let n_rows = rows.len() + unknowns + PARAMS;
    let mut matrix = DMatrix::zeros(n_rows, unknowns);
    let mut rhs = DVector::zeros(n_rows);

    for (i, row) in rows.iter().enumerate() {
        let ca = columns[&row.a] * PARAMS;
        let cb = columns[&row.b] * PARAMS;
        for k in 0..PARAMS {
            matrix[(i, ca + k)] += row.weight * row.partials_a[k];
            matrix[(i, cb + k)] -= row.weight * row.partials_b[k];
        }
        rhs[i] = row.weight * row.residual;
    }
    for j in 0..unknowns {
        matrix[(rows.len() + j, j)] = damp;
    }
    let base = rows.len() + unknowns;
    for col in columns.values() {
        for k in 0..PARAMS {
            matrix[(base + k, col * PARAMS + k)] = 1.0;
        }
    }
    LinearSystem::new(matrix, rhs)
}

/// Mean and population standard deviation, `None` for fewer than two values.
fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}
