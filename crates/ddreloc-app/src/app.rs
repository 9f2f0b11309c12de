//! Relocation run orchestration.
//!
//! `RelocatorBuilder` gathers inputs and validates the configuration once;
//! `Relocator::run` then drives the pipeline:
//! 1. Load stations and the event catalog
//! 2. Reuse or compute differential times (catalog + cross-correlation)
//! 3. Link event pairs into a neighbor graph
//! 4. Relocate and write the refined catalog

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use ddreloc_core::{DifferentialTime, DtSource};
use ddreloc_correlate::{candidate_units, CandidateLimits, Correlator, JsonDiagnosticSink};
use ddreloc_inversion::{IterationReport, RelocationEngine, RelocationSummary};
use ddreloc_linker::{catalog_differential_times, LinkStats, NeighborGraph, PairLinker};
use ddreloc_persistence::{
    parameter_hash, read_dt_cc, read_dt_ct, write_dt_cc, write_dt_ct, JsonLinesWriter,
    ManifestCounts, PersistenceError, RunManifest, WorkdirLock,
};
use ddreloc_registry::{Catalog, CatalogDocument, RegistryResult, StationRegistry, WaveformIndex};
use ddreloc_telemetry::{Metrics, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const DT_CC_FILE: &str = "dt.cc";
pub const DT_CT_FILE: &str = "dt.ct";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const WAVEFORM_INDEX_FILE: &str = "waveform_index.json";
pub const STAGES_FILE: &str = "stages.jsonl";
pub const METRICS_FILE: &str = "metrics.prom";

/// Iteration records buffered before each write to `stages.jsonl`.
const STAGE_BUFFER: usize = 16;

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RelocationSummary,
    pub pairs: usize,
    pub dt_cc: usize,
    pub dt_ct: usize,
    /// True when `dt.cc`/`dt.ct` were reloaded instead of recomputed.
    pub reused_artifacts: bool,
    /// Linker counters; `None` when artifacts were reused.
    pub link_stats: Option<LinkStats>,
    pub output: PathBuf,
}

/// Accumulates inputs before a run.
pub struct RelocatorBuilder {
    config: AppConfig,
}

impl RelocatorBuilder {
    /// Start from a configuration; its `[inputs]` section seeds the file lists.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn add_event_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config
            .inputs
            .event_files
            .extend(files.into_iter().map(Into::into));
        self
    }

    /// Trace files or directories.
    pub fn add_waveform_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config
            .inputs
            .waveform_paths
            .extend(files.into_iter().map(Into::into));
        self
    }

    pub fn add_station_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config
            .inputs
            .station_files
            .extend(files.into_iter().map(Into::into));
        self
    }

    /// Validate the configuration and construct every stage of the pipeline.
    pub fn build(self) -> AppResult<Relocator> {
        let config = self.config;
        config.validate()?;
        if config.inputs.event_files.is_empty() {
            return Err(AppError::Config("no event files given".to_string()));
        }
        if config.inputs.station_files.is_empty() {
            return Err(AppError::Config("no station files given".to_string()));
        }

        let mut correlator = Correlator::new(config.correlation.clone())?;
        if let Some(dir) = config
            .correlation
            .plot_dir
            .as_ref()
            .filter(|_| config.correlation.plot_interval > 0)
        {
            correlator = correlator.with_sink(Arc::new(JsonDiagnosticSink::new(dir.clone())?));
        }
        let linker = PairLinker::new(config.pairing.clone())?;
        let engine = RelocationEngine::new(config.inversion.clone(), config.velocity.model()?)?;

        info!(
            event_files = config.inputs.event_files.len(),
            waveform_paths = config.inputs.waveform_paths.len(),
            station_files = config.inputs.station_files.len(),
            workdir = %config.run.workdir.display(),
            "Relocator built"
        );
        Ok(Relocator {
            config,
            correlator,
            linker,
            engine,
        })
    }
}

/// A configured relocation run.
pub struct Relocator {
    config: AppConfig,
    correlator: Correlator,
    linker: PairLinker,
    engine: RelocationEngine,
}

impl Relocator {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the pipeline end to end.
    ///
    /// On a numerical failure in the engine no output catalog is written.
    pub fn run(&self) -> AppResult<RunReport> {
        let workdir = self.config.run.workdir.as_path();
        std::fs::create_dir_all(workdir)?;
        let _lock = WorkdirLock::acquire(workdir)?;

        let started = Instant::now();
        let stations = StationRegistry::load_files(&self.config.inputs.station_files)?;
        let docs = self
            .config
            .inputs
            .event_files
            .iter()
            .map(CatalogDocument::load)
            .collect::<RegistryResult<Vec<_>>>()?;
        let (mut catalog, load_stats) = Catalog::from_documents(&docs, &stations)?;
        Metrics::events_loaded(catalog.len());
        Metrics::picks_dropped("unknown_station", load_stats.picks_unknown_station);
        Metrics::picks_dropped("bad_phase", load_stats.picks_bad_phase);
        Metrics::picks_dropped("invalid", load_stats.picks_invalid);
        Metrics::step_duration("load", started.elapsed().as_secs_f64());

        let hash = parameter_hash(&self.config.artifact_parameters())?;
        let (graph, link_stats) = match self.reload_artifacts(&catalog, &hash)? {
            Some(graph) => (graph, None),
            None => {
                let (graph, stats) = self.compute_artifacts(&catalog, &stations, &hash)?;
                (graph, Some(stats))
            }
        };
        let reused_artifacts = link_stats.is_none();

        let started = Instant::now();
        let summary = self.relocate(&mut catalog, &graph, &stations)?;
        Metrics::step_duration("relocate", started.elapsed().as_secs_f64());

        let output = self.config.run.output_path();
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut refined = CatalogDocument::merge(docs);
        let updated = refined.apply_locations(&catalog);
        refined.save(&output)?;
        info!(path = %output.display(), events = updated, "Refined catalog written");

        if self.config.run.metrics {
            Metrics::write_to(workdir.join(METRICS_FILE))?;
        }
        RunSummary::collect().log();

        let dt_cc = count_source(&graph, DtSource::CrossCorrelation);
        let dt_ct = count_source(&graph, DtSource::Catalog);
        Ok(RunReport {
            summary,
            pairs: graph.len(),
            dt_cc,
            dt_ct,
            reused_artifacts,
            link_stats,
            output,
        })
    }

    /// Graph rebuilt from `dt.cc`/`dt.ct`, or `None` when they must be
    /// recomputed.
    fn reload_artifacts(&self, catalog: &Catalog, hash: &str) -> AppResult<Option<NeighborGraph>> {
        if !self.config.run.restart {
            return Ok(None);
        }
        let workdir = self.config.run.workdir.as_path();
        let cc_path = workdir.join(DT_CC_FILE);
        let ct_path = workdir.join(DT_CT_FILE);
        let manifest_path = workdir.join(MANIFEST_FILE);
        if !(cc_path.exists() && ct_path.exists() && manifest_path.exists()) {
            return Ok(None);
        }

        let manifest = match RunManifest::load(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(error = %e, "Unreadable manifest, recomputing differential times");
                return Ok(None);
            }
        };
        if !manifest.matches(hash) {
            warn!(
                stored = %manifest.parameter_hash,
                current = %hash,
                "Parameters changed since artifacts were written, recomputing"
            );
            return Ok(None);
        }

        let mut dts = read_dt_cc(&cc_path)?;
        dts.extend(read_dt_ct(&ct_path)?);
        let graph = NeighborGraph::from_observations(catalog, dts)?;
        info!(
            run_id = %manifest.run_id,
            pairs = graph.len(),
            observations = graph.observation_count(),
            "Reusing differential times"
        );
        Ok(Some(graph))
    }

    fn compute_artifacts(
        &self,
        catalog: &Catalog,
        stations: &StationRegistry,
        hash: &str,
    ) -> AppResult<(NeighborGraph, LinkStats)> {
        let workdir = self.config.run.workdir.as_path();
        remove_if_exists(&workdir.join(MANIFEST_FILE))?;

        let started = Instant::now();
        let index = WaveformIndex::build(&self.config.inputs.waveform_paths)?;
        index.save(workdir.join(WAVEFORM_INDEX_FILE))?;

        let pairing = &self.config.pairing;
        let mut dts = catalog_differential_times(catalog, stations, pairing);
        let units = candidate_units(
            catalog,
            stations,
            CandidateLimits {
                max_separation_km: pairing.max_separation_km,
                max_station_distance_km: pairing.max_distance_km,
            },
        );
        let correlated = self.correlator.correlate(catalog, &index, &units);
        info!(
            units = correlated.stats.units,
            observations = correlated.stats.observations,
            skipped = correlated.stats.skipped_total(),
            "Cross-correlation finished"
        );
        dts.extend(correlated.dts);
        Metrics::step_duration("correlate", started.elapsed().as_secs_f64());

        let started = Instant::now();
        let (graph, stats) = self.linker.link(catalog, stations, dts);
        Metrics::step_duration("link", started.elapsed().as_secs_f64());

        let admitted: Vec<DifferentialTime> = graph.observations().cloned().collect();
        let dt_cc = write_dt_cc(workdir.join(DT_CC_FILE), &admitted)?;
        let dt_ct = write_dt_ct(workdir.join(DT_CT_FILE), &admitted)?;
        let manifest = RunManifest::new(
            hash.to_string(),
            ManifestCounts {
                events: catalog.len(),
                dt_cc,
                dt_ct,
                pairs: graph.len(),
            },
        );
        manifest.save(workdir.join(MANIFEST_FILE))?;
        info!(run_id = %manifest.run_id, dt_cc, dt_ct, pairs = graph.len(), "Artifacts written");
        Ok((graph, stats))
    }

    fn relocate(
        &self,
        catalog: &mut Catalog,
        graph: &NeighborGraph,
        stations: &StationRegistry,
    ) -> AppResult<RelocationSummary> {
        let path = self.config.run.workdir.join(STAGES_FILE);
        remove_if_exists(&path)?;
        let mut writer = JsonLinesWriter::<IterationReport>::new(path, STAGE_BUFFER);
        let mut write_error: Option<PersistenceError> = None;

        let result = self
            .engine
            .relocate(catalog, graph, stations, &mut |report: &IterationReport| {
                if write_error.is_none() {
                    if let Err(e) = writer.add_record(report.clone()) {
                        write_error = Some(e);
                    }
                }
            });
        writer.close()?;

        let summary = result?;
        if let Some(e) = write_error {
            return Err(e.into());
        }
        Ok(summary)
    }
}

fn count_source(graph: &NeighborGraph, source: DtSource) -> usize {
    graph.observations().filter(|dt| dt.source == source).count()
}

fn remove_if_exists(path: &Path) -> AppResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
