//! Normalized cross-correlation and sub-sample peak refinement.

/// Correlation peak. `shift` is in samples relative to zero lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub shift: f64,
    pub coefficient: f64,
}

/// Normalized correlation of `template` against every window of `search`.
///
/// `search` must be `template.len() + 2 * maxlag` samples long; the result has
/// `2 * maxlag + 1` values, index `k` holding the coefficient at lag
/// `k - maxlag`. Each window is demeaned before normalization, so a flat
/// window yields a coefficient of 0.
pub fn normalized_xcorr(template: &[f64], search: &[f64]) -> Vec<f64> {
    let n = template.len();
    if n == 0 || search.len() < n {
        return Vec::new();
    }

    let t_mean = template.iter().sum::<f64>() / n as f64;
    let t: Vec<f64> = template.iter().map(|v| v - t_mean).collect();
    let t_energy: f64 = t.iter().map(|v| v * v).sum();

    (0..=search.len() - n)
        .map(|k| {
            let window = &search[k..k + n];
            let w_mean = window.iter().sum::<f64>() / n as f64;
            let mut dot = 0.0;
            let mut w_energy = 0.0;
            for (a, b) in t.iter().zip(window) {
                let b = b - w_mean;
                dot += a * b;
                w_energy += b * b;
            }
            let denom = (t_energy * w_energy).sqrt();
            if denom > 0.0 {
                dot / denom
            } else {
                0.0
            }
        })
        .collect()
}

/// Locate the maximum and refine it with a parabola through its neighbours.
///
/// `maxlag` is subtracted from the index so that the returned shift is
/// relative to zero lag. The refined coefficient is capped at 1. Peaks on the
/// edge of the lag range are not refined.
pub fn refine_peak(cc: &[f64], maxlag: usize) -> Option<Peak> {
    let (idx, &max) = cc
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;

    let mut shift = idx as f64;
    let mut coefficient = max;
    if idx > 0 && idx + 1 < cc.len() {
        let (y0, y1, y2) = (cc[idx - 1], cc[idx], cc[idx + 1]);
        let curvature = y0 - 2.0 * y1 + y2;
        if curvature < 0.0 {
            let delta = 0.5 * (y0 - y2) / curvature;
            shift += delta;
            coefficient = y1 - 0.25 * (y0 - y2) * delta;
        }
    }

    Some(Peak {
        shift: shift - maxlag as f64,
        coefficient: coefficient.min(1.0),
    })
}
