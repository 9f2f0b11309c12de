//! Prometheus metrics for a relocation run.
//!
//! Everything is registered in the default registry and rendered once at the
//! end of a run into `metrics.prom`.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means duplicate metric
//! names, which is a programming error caught on first use.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    register_histogram_vec, register_int_counter, register_int_gauge, CounterVec, Encoder, Gauge,
    GaugeVec, Histogram, HistogramVec, IntCounter, IntGauge, TextEncoder,
};
use std::path::Path;

/// Events in the validated catalog.
pub static EVENTS_LOADED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("ddreloc_events_loaded", "Events in the validated catalog").unwrap()
});

/// Picks dropped while loading the catalog.
/// Labels: reason (unknown_station/bad_phase/invalid)
pub static PICKS_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ddreloc_picks_dropped_total",
        "Picks dropped while loading the catalog",
        &["reason"]
    )
    .unwrap()
});

/// Differential times produced.
/// Labels: source (ct/cc), phase (P/S)
pub static DT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ddreloc_dt_total",
        "Differential times produced",
        &["source", "phase"]
    )
    .unwrap()
});

/// Correlation units that produced no observation.
/// Labels: reason (missing_trace/sampling_rate/window/low_coefficient/error)
pub static CC_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ddreloc_cc_skipped_total",
        "Correlation components that produced no observation",
        &["reason"]
    )
    .unwrap()
});

/// Combined cross-correlation coefficient of accepted observations.
pub static CC_COEFFICIENT: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "ddreloc_cc_coefficient",
        "Combined cross-correlation coefficient of accepted observations",
        vec![0.5, 0.6, 0.7, 0.8, 0.85, 0.9, 0.95, 0.98, 1.0]
    )
    .unwrap()
});

/// Pairs in the neighbor graph.
pub static PAIRS_LINKED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("ddreloc_pairs_linked", "Event pairs in the neighbor graph").unwrap()
});

/// Candidate pairs rejected by the linker.
/// Labels: reason (separation/links/neighbors)
pub static PAIRS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ddreloc_pairs_rejected_total",
        "Candidate pairs rejected by the linker",
        &["reason"]
    )
    .unwrap()
});

/// RMS residual after the latest iteration, in ms.
/// Labels: source (ct/cc)
pub static RMS_RESIDUAL_MS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "ddreloc_rms_residual_ms",
        "RMS residual after the latest iteration in milliseconds",
        &["source"]
    )
    .unwrap()
});

/// Condition number of the latest solve.
pub static CONDITION_NUMBER: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "ddreloc_condition_number",
        "Condition number of the latest damped system"
    )
    .unwrap()
});

/// Iterations completed across all clusters.
pub static ITERATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("ddreloc_iterations_total", "Inversion iterations completed").unwrap()
});

/// Events removed as air quakes.
pub static AIR_QUAKES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("ddreloc_air_quakes_total", "Events removed as air quakes").unwrap()
});

/// Events with a refined location.
pub static EVENTS_RELOCATED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("ddreloc_events_relocated", "Events with a refined location").unwrap()
});

/// Wall-clock duration of each pipeline step in seconds.
/// Labels: step (load/catalog_dt/correlate/link/invert/write)
pub static STEP_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ddreloc_step_duration_seconds",
        "Wall-clock duration of pipeline steps",
        &["step"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 1800.0]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn events_loaded(count: usize) {
        EVENTS_LOADED.set(count as i64);
    }

    pub fn picks_dropped(reason: &str, count: usize) {
        PICKS_DROPPED_TOTAL
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    pub fn dt_produced(source: &str, phase: &str, count: usize) {
        DT_TOTAL
            .with_label_values(&[source, phase])
            .inc_by(count as f64);
    }

    pub fn cc_skipped(reason: &str) {
        CC_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn cc_coefficient(coefficient: f64) {
        CC_COEFFICIENT.observe(coefficient);
    }

    pub fn pairs_linked(count: usize) {
        PAIRS_LINKED.set(count as i64);
    }

    pub fn pairs_rejected(reason: &str, count: usize) {
        PAIRS_REJECTED_TOTAL
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    /// Record the state after one inversion iteration.
    pub fn iteration(rms_cc_ms: Option<f64>, rms_ct_ms: Option<f64>, condition_number: f64) {
        if let Some(rms) = rms_cc_ms {
            RMS_RESIDUAL_MS.with_label_values(&["cc"]).set(rms);
        }
        if let Some(rms) = rms_ct_ms {
            RMS_RESIDUAL_MS.with_label_values(&["ct"]).set(rms);
        }
        CONDITION_NUMBER.set(condition_number);
        ITERATIONS_TOTAL.inc();
    }

    pub fn air_quakes(count: usize) {
        AIR_QUAKES_TOTAL.inc_by(count as u64);
    }

    pub fn events_relocated(count: usize) {
        EVENTS_RELOCATED.set(count as i64);
    }

    pub fn step_duration(step: &str, seconds: f64) {
        STEP_DURATION_SECONDS
            .with_label_values(&[step])
            .observe(seconds);
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::TelemetryError::Metrics(e.to_string()))
    }

    pub fn write_to(path: impl AsRef<Path>) -> TelemetryResult<()> {
        std::fs::write(path, Metrics::render()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let before = DT_TOTAL.with_label_values(&["cc", "P"]).get();
        Metrics::dt_produced("cc", "P", 3);
        Metrics::dt_produced("cc", "P", 2);
        let after = DT_TOTAL.with_label_values(&["cc", "P"]).get();
        assert!(after - before >= 5.0);
    }

    #[test]
    fn test_render_contains_metrics() {
        Metrics::events_loaded(12);
        Metrics::iteration(Some(4.0), None, 25.0);
        let text = Metrics::render().unwrap();
        assert!(text.contains("ddreloc_events_loaded"));
        assert!(text.contains("ddreloc_rms_residual_ms{source=\"cc\"}"));
        assert!(text.contains("ddreloc_condition_number"));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("metrics.prom");
        Metrics::air_quakes(1);
        Metrics::write_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("ddreloc_air_quakes_total"));
    }
}
