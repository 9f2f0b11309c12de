//! End-of-run summary read back from the metrics registry.

use crate::metrics::{
    AIR_QUAKES_TOTAL, CC_COEFFICIENT, CC_SKIPPED_TOTAL, CONDITION_NUMBER, DT_TOTAL,
    EVENTS_LOADED, EVENTS_RELOCATED, ITERATIONS_TOTAL, PAIRS_LINKED,
};
use prometheus::core::Collector;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub events_loaded: i64,
    pub events_relocated: i64,
    pub dt_catalog: u64,
    pub dt_cross_correlation: u64,
    pub cc_skipped: u64,
    pub cc_coefficient_p50: f64,
    pub cc_coefficient_p95: f64,
    pub pairs_linked: i64,
    pub iterations: u64,
    pub air_quakes: u64,
    pub condition_number: f64,
}

impl RunSummary {
    pub fn collect() -> Self {
        let (p50, p95) = coefficient_percentiles();
        Self {
            events_loaded: EVENTS_LOADED.get(),
            events_relocated: EVENTS_RELOCATED.get(),
            dt_catalog: sum_counter_vec(&DT_TOTAL, Some(("source", "ct"))),
            dt_cross_correlation: sum_counter_vec(&DT_TOTAL, Some(("source", "cc"))),
            cc_skipped: sum_counter_vec(&CC_SKIPPED_TOTAL, None),
            cc_coefficient_p50: p50,
            cc_coefficient_p95: p95,
            pairs_linked: PAIRS_LINKED.get(),
            iterations: ITERATIONS_TOTAL.get(),
            air_quakes: AIR_QUAKES_TOTAL.get(),
            condition_number: CONDITION_NUMBER.get(),
        }
    }

    pub fn log(&self) {
        info!(
            events_loaded = self.events_loaded,
            events_relocated = self.events_relocated,
            dt_ct = self.dt_catalog,
            dt_cc = self.dt_cross_correlation,
            cc_skipped = self.cc_skipped,
            cc_p50 = format!("{:.3}", self.cc_coefficient_p50),
            cc_p95 = format!("{:.3}", self.cc_coefficient_p95),
            pairs = self.pairs_linked,
            iterations = self.iterations,
            air_quakes = self.air_quakes,
            cond = format!("{:.1}", self.condition_number),
            "Run summary"
        );
    }
}

/// Sum a counter vector, optionally restricted to one label value.
fn sum_counter_vec(counter: &prometheus::CounterVec, filter: Option<(&str, &str)>) -> u64 {
    let mut total = 0.0;
    for mf in counter.collect() {
        for m in mf.get_metric() {
            let keep = match filter {
                Some((name, value)) => m
                    .get_label()
                    .iter()
                    .any(|l| l.get_name() == name && l.get_value() == value),
                None => true,
            };
            if keep {
                total += m.get_counter().get_value();
            }
        }
    }
    total as u64
}

fn coefficient_percentiles() -> (f64, f64) {
    for mf in CC_COEFFICIENT.collect() {
        if let Some(m) = mf.get_metric().first() {
            let h = m.get_histogram();
            let count = h.get_sample_count();
            if count == 0 {
                return (0.0, 0.0);
            }
            let buckets = h.get_bucket();
            return (
                percentile_from_buckets(buckets, count, 0.50),
                percentile_from_buckets(buckets, count, 0.95),
            );
        }
    }
    (0.0, 0.0)
}

/// Linear interpolation inside the bucket holding the target rank.
fn percentile_from_buckets(
    buckets: &[prometheus::proto::Bucket],
    total_count: u64,
    percentile: f64,
) -> f64 {
    let target = (total_count as f64 * percentile) as u64;
    let mut prev_bound = 0.0;
    let mut prev_count = 0u64;

    for bucket in buckets {
        let upper_bound = bucket.get_upper_bound();
        let cumulative_count = bucket.get_cumulative_count();

        if cumulative_count >= target {
            let bucket_count = cumulative_count - prev_count;
            if bucket_count == 0 {
                return upper_bound;
            }
            let position = (target - prev_count) as f64 / bucket_count as f64;
            return prev_bound + position * (upper_bound - prev_bound);
        }

        prev_bound = upper_bound;
        prev_count = cumulative_count;
    }

    buckets.last().map(|b| b.get_upper_bound()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metrics;

    #[test]
    fn test_collect_reflects_recorded_values() {
        Metrics::dt_produced("ct", "S", 4);
        Metrics::cc_coefficient(0.92);
        let summary = RunSummary::collect();
        assert!(summary.dt_catalog >= 4);
        assert!(summary.cc_coefficient_p95 > 0.0);
        assert!(summary.cc_coefficient_p95 <= 1.0);
    }
}
