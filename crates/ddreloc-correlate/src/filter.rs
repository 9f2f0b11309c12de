//! Butterworth bandpass as cascaded second-order sections.

use crate::error::{CorrelateError, CorrelateResult};
use std::f64::consts::PI;

/// One second-order section, coefficients normalized by `a0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    pub fn lowpass(cutoff: f64, sampling_rate: f64, q: f64) -> Self {
        let (cos_w0, alpha) = Self::prewarp(cutoff, sampling_rate, q);
        let b1 = 1.0 - cos_w0;
        Self::normalized(b1 / 2.0, b1, b1 / 2.0, cos_w0, alpha)
    }

    pub fn highpass(cutoff: f64, sampling_rate: f64, q: f64) -> Self {
        let (cos_w0, alpha) = Self::prewarp(cutoff, sampling_rate, q);
        let b0 = (1.0 + cos_w0) / 2.0;
        Self::normalized(b0, -(1.0 + cos_w0), b0, cos_w0, alpha)
    }

    fn prewarp(cutoff: f64, sampling_rate: f64, q: f64) -> (f64, f64) {
        let w0 = 2.0 * PI * cutoff / sampling_rate;
        (w0.cos(), w0.sin() / (2.0 * q))
    }

    fn normalized(b0: f64, b1: f64, b2: f64, cos_w0: f64, alpha: f64) -> Self {
        let a0 = 1.0 + alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Filter in place (transposed direct form II, zero initial state).
    pub fn apply(&self, x: &mut [f64]) {
        let (mut z1, mut z2) = (0.0, 0.0);
        for v in x.iter_mut() {
            let input = *v;
            let out = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * out + z2;
            z2 = self.b2 * input - self.a2 * out;
            *v = out;
        }
    }
}

/// Butterworth bandpass: a highpass at `min_freq` followed by a lowpass at
/// `max_freq`, each of order `corners`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bandpass {
    sections: Vec<Biquad>,
}

impl Bandpass {
    pub fn new(
        min_freq: f64,
        max_freq: f64,
        sampling_rate: f64,
        corners: usize,
    ) -> CorrelateResult<Self> {
        let nyquist = sampling_rate / 2.0;
        if !(min_freq > 0.0 && min_freq < max_freq) {
            return Err(CorrelateError::Filter(format!(
                "band {min_freq}-{max_freq} Hz is empty"
            )));
        }
        if max_freq >= nyquist {
            return Err(CorrelateError::Filter(format!(
                "max frequency {max_freq} Hz at or above Nyquist {nyquist} Hz"
            )));
        }
        if corners == 0 || corners % 2 != 0 {
            return Err(CorrelateError::Filter(format!(
                "corners must be a positive even number, got {corners}"
            )));
        }

        let qs = butterworth_qs(corners);
        let mut sections = Vec::with_capacity(qs.len() * 2);
        sections.extend(qs.iter().map(|&q| Biquad::highpass(min_freq, sampling_rate, q)));
        sections.extend(qs.iter().map(|&q| Biquad::lowpass(max_freq, sampling_rate, q)));
        Ok(Self { sections })
    }

    /// Demean and filter a copy of `x`.
    pub fn filter(&self, x: &[f64]) -> Vec<f64> {
        let mut y = x.to_vec();
        if !y.is_empty() {
            let mean = y.iter().sum::<f64>() / y.len() as f64;
            y.iter_mut().for_each(|v| *v -= mean);
        }
        for section in &self.sections {
            section.apply(&mut y);
        }
        y
    }
}

/// Section quality factors of an order-`n` Butterworth prototype.
fn butterworth_qs(n: usize) -> Vec<f64> {
    (1..=n / 2)
        .map(|k| {
            let theta = (2 * k - 1) as f64 * PI / (2 * n) as f64;
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}
