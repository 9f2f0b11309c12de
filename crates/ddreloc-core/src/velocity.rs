//! Layered 1-D velocity model with a constant Vp/Vs ratio.
//!
//! Travel times are first arrivals: the faster of the direct ray and every
//! head wave refracted along a layer top below the source. Depths are km,
//! positive down; velocities are km/s.

use crate::error::{CoreError, Result};
use crate::event::Phase;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bisection steps when solving for the direct-ray parameter.
const RAY_BISECTION_STEPS: usize = 80;

/// A layer defined by its top depth and P velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityLayer {
    pub top_km: f64,
    pub vp: f64,
}

/// How the first arrival travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayKind {
    Direct,
    /// Refracted along the top of the given layer index.
    Head(usize),
}

/// First-arrival ray between a source and a receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPath {
    pub kind: RayKind,
    /// Travel time in seconds.
    pub time: f64,
    /// Horizontal slowness p (s/km).
    pub horizontal_slowness: f64,
    /// Vertical slowness at the source (s/km).
    pub source_vertical_slowness: f64,
    /// Whether the ray leaves the source upwards.
    pub upgoing: bool,
}

impl RayPath {
    /// Partial derivatives of travel time with respect to the source
    /// position (east, north, depth), given the receiver offset from the source.
    pub fn source_derivatives(&self, dx_km: f64, dy_km: f64) -> [f64; 3] {
        let horizontal = dx_km.hypot(dy_km);
        let (tx, ty) = if horizontal > 0.0 {
            (
                -self.horizontal_slowness * dx_km / horizontal,
                -self.horizontal_slowness * dy_km / horizontal,
            )
        } else {
            (0.0, 0.0)
        };
        let tz = if self.upgoing {
            self.source_vertical_slowness
        } else {
            -self.source_vertical_slowness
        };
        [tx, ty, tz]
    }
}

/// A piece of the path through one layer: (thickness, velocity).
type Segment = (f64, f64);

/// Layered velocity model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityModel {
    layers: Vec<VelocityLayer>,
    vp_vs_ratio: f64,
}

impl VelocityModel {
    /// Build a model from `(top_km, vp)` layers.
    ///
    /// Tops must be strictly increasing. Velocity inversions are accepted but
    /// logged, since the head-wave search assumes velocity grows with depth.
    pub fn new(layers: Vec<VelocityLayer>, vp_vs_ratio: f64) -> Result<Self> {
        if layers.is_empty() {
            return Err(CoreError::InvalidVelocityModel(
                "at least one layer is required".to_string(),
            ));
        }
        if !vp_vs_ratio.is_finite() || vp_vs_ratio <= 1.0 {
            return Err(CoreError::InvalidVelocityModel(format!(
                "vp_vs_ratio ({vp_vs_ratio}) must be > 1"
            )));
        }
        for (i, layer) in layers.iter().enumerate() {
            if !layer.top_km.is_finite() || !layer.vp.is_finite() || layer.vp <= 0.0 {
                return Err(CoreError::InvalidVelocityModel(format!(
                    "layer {i}: top {} / vp {} invalid",
                    layer.top_km, layer.vp
                )));
            }
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[1].top_km <= pair[0].top_km {
                return Err(CoreError::InvalidVelocityModel(format!(
                    "layer tops must be strictly increasing ({} then {} at layer {})",
                    pair[0].top_km,
                    pair[1].top_km,
                    i + 1
                )));
            }
            if pair[1].vp < pair[0].vp {
                warn!(
                    layer = i + 1,
                    top_km = pair[1].top_km,
                    vp = pair[1].vp,
                    "Velocity decreases with depth"
                );
            }
        }
        Ok(Self {
            layers,
            vp_vs_ratio,
        })
    }

    /// Convenience constructor from `(top_km, vp)` tuples.
    pub fn from_tops(tops: &[(f64, f64)], vp_vs_ratio: f64) -> Result<Self> {
        let layers = tops
            .iter()
            .map(|&(top_km, vp)| VelocityLayer { top_km, vp })
            .collect();
        Self::new(layers, vp_vs_ratio)
    }

    pub fn layers(&self) -> &[VelocityLayer] {
        &self.layers
    }

    pub fn vp_vs_ratio(&self) -> f64 {
        self.vp_vs_ratio
    }

    /// Depth of the top of the model.
    pub fn top_km(&self) -> f64 {
        self.layers[0].top_km
    }

    fn layer_velocity(&self, index: usize, phase: Phase) -> f64 {
        let vp = self.layers[index].vp;
        match phase {
            Phase::P => vp,
            Phase::S => vp / self.vp_vs_ratio,
        }
    }

    fn layer_index(&self, depth_km: f64) -> usize {
        self.layers
            .iter()
            .rposition(|l| l.top_km <= depth_km)
            .unwrap_or(0)
    }

    /// Phase velocity at a depth. Depths above the model use the top layer.
    pub fn velocity_at(&self, depth_km: f64, phase: Phase) -> f64 {
        self.layer_velocity(self.layer_index(depth_km), phase)
    }

    /// Path pieces between two depths, shallow to deep.
    fn segments(&self, z_top: f64, z_bottom: f64, phase: Phase) -> Vec<Segment> {
        let mut out = Vec::new();
        for i in 0..self.layers.len() {
            let lo = if i == 0 {
                f64::NEG_INFINITY
            } else {
                self.layers[i].top_km
            };
            let hi = self
                .layers
                .get(i + 1)
                .map(|l| l.top_km)
                .unwrap_or(f64::INFINITY);
            let a = z_top.max(lo);
            let b = z_bottom.min(hi);
            if b > a {
                out.push((b - a, self.layer_velocity(i, phase)));
            }
        }
        out
    }

    /// First-arrival travel time from a source to a receiver.
    ///
    /// Receiver depths above the model top are clamped onto it.
    pub fn travel_time(
        &self,
        phase: Phase,
        source_depth_km: f64,
        receiver_depth_km: f64,
        horizontal_km: f64,
    ) -> RayPath {
        let zs = source_depth_km.max(self.top_km());
        let zr = receiver_depth_km.max(self.top_km());
        let horizontal_km = horizontal_km.abs();

        let mut best = self.direct_ray(phase, zs, zr, horizontal_km);
        for k in 1..self.layers.len() {
            if let Some(head) = self.head_wave(phase, zs, zr, horizontal_km, k) {
                if head.time < best.time {
                    best = head;
                }
            }
        }
        best
    }

    fn direct_ray(&self, phase: Phase, zs: f64, zr: f64, horizontal: f64) -> RayPath {
        let upgoing = zs > zr;
        let (z_top, z_bottom) = if upgoing { (zr, zs) } else { (zs, zr) };
        let segments = self.segments(z_top, z_bottom, phase);

        if segments.is_empty() {
            // Source and receiver at the same depth: straight horizontal path.
            let v = self.velocity_at(zs, phase);
            return RayPath {
                kind: RayKind::Direct,
                time: horizontal / v,
                horizontal_slowness: 1.0 / v,
                source_vertical_slowness: 0.0,
                upgoing,
            };
        }

        // Velocity of the piece touching the source.
        let v_source = if upgoing {
            segments[segments.len() - 1].1
        } else {
            segments[0].1
        };
        let v_max = segments.iter().map(|s| s.1).fold(0.0, f64::max);

        let offset = |p: f64| -> f64 {
            segments
                .iter()
                .map(|&(h, v)| {
                    let pv = p * v;
                    h * pv / (1.0 - pv * pv).sqrt()
                })
                .sum()
        };

        let mut lo = 0.0;
        let mut hi = (1.0 / v_max) * (1.0 - 1e-12);
        let p = if horizontal <= 0.0 {
            0.0
        } else if offset(hi) <= horizontal {
            hi
        } else {
            for _ in 0..RAY_BISECTION_STEPS {
                let mid = 0.5 * (lo + hi);
                if offset(mid) < horizontal {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            0.5 * (lo + hi)
        };

        let time: f64 = segments
            .iter()
            .map(|&(h, v)| {
                let pv = p * v;
                h / (v * (1.0 - pv * pv).sqrt())
            })
            .sum();
        // Offset left unexplained by the layered path travels at the fastest layer.
        let residual_offset = (horizontal - offset(p)).max(0.0);
        let time = time + residual_offset * p;

        RayPath {
            kind: RayKind::Direct,
            time,
            horizontal_slowness: p,
            source_vertical_slowness: (1.0 / (v_source * v_source) - p * p).max(0.0).sqrt(),
            upgoing,
        }
    }

    fn head_wave(
        &self,
        phase: Phase,
        zs: f64,
        zr: f64,
        horizontal: f64,
        refractor: usize,
    ) -> Option<RayPath> {
        let z_ref = self.layers[refractor].top_km;
        if z_ref <= zs || z_ref <= zr {
            return None;
        }
        let v_ref = self.layer_velocity(refractor, phase);
        let down = self.segments(zs, z_ref, phase);
        let up = self.segments(zr, z_ref, phase);
        if down.iter().chain(up.iter()).any(|&(_, v)| v >= v_ref) {
            return None;
        }

        let p = 1.0 / v_ref;
        let mut crossover = 0.0;
        let mut vertical_time = 0.0;
        for &(h, v) in down.iter().chain(up.iter()) {
            let pv = p * v;
            crossover += h * pv / (1.0 - pv * pv).sqrt();
            vertical_time += h * (1.0 / (v * v) - p * p).sqrt();
        }
        if horizontal < crossover {
            return None;
        }

        let v_source = down.first().map(|s| s.1)?;
        Some(RayPath {
            kind: RayKind::Head(refractor),
            time: horizontal * p + vertical_time,
            horizontal_slowness: p,
            source_vertical_slowness: (1.0 / (v_source * v_source) - p * p).max(0.0).sqrt(),
            upgoing: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_space(v: f64) -> VelocityModel {
        VelocityModel::from_tops(&[(0.0, v)], 1.73).unwrap()
    }

    #[test]
    fn test_rejects_non_increasing_tops() {
        assert!(VelocityModel::from_tops(&[(0.0, 3.0), (0.0, 4.0)], 1.7).is_err());
        assert!(VelocityModel::from_tops(&[(1.0, 3.0), (0.5, 4.0)], 1.7).is_err());
        assert!(VelocityModel::from_tops(&[], 1.7).is_err());
        assert!(VelocityModel::from_tops(&[(0.0, 3.0)], 0.9).is_err());
    }

    #[test]
    fn test_accepts_velocity_inversion() {
        assert!(VelocityModel::from_tops(&[(0.0, 5.0), (2.0, 4.0)], 1.7).is_ok());
    }

    #[test]
    fn test_half_space_straight_ray() {
        let model = half_space(6.0);
        let ray = model.travel_time(Phase::P, 4.0, 0.0, 3.0);
        assert_eq!(ray.kind, RayKind::Direct);
        // Straight-line distance 5 km at 6 km/s.
        assert!((ray.time - 5.0 / 6.0).abs() < 1e-6, "time {}", ray.time);
        // sin(i) = 3/5, cos(i) = 4/5.
        assert!((ray.horizontal_slowness - 0.6 / 6.0).abs() < 1e-6);
        assert!((ray.source_vertical_slowness - 0.8 / 6.0).abs() < 1e-6);
        assert!(ray.upgoing);
    }

    #[test]
    fn test_s_wave_uses_ratio() {
        let model = VelocityModel::from_tops(&[(0.0, 6.0)], 2.0).unwrap();
        let p = model.travel_time(Phase::P, 5.0, 0.0, 0.0);
        let s = model.travel_time(Phase::S, 5.0, 0.0, 0.0);
        assert!((s.time - 2.0 * p.time).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_ray() {
        let model = VelocityModel::from_tops(&[(0.0, 3.0), (2.0, 6.0)], 1.73).unwrap();
        let ray = model.travel_time(Phase::P, 5.0, 0.0, 0.0);
        assert!((ray.time - (2.0 / 3.0 + 3.0 / 6.0)).abs() < 1e-9);
        assert_eq!(ray.horizontal_slowness, 0.0);
    }

    #[test]
    fn test_head_wave_wins_at_long_range() {
        let model = VelocityModel::from_tops(&[(0.0, 3.0), (2.0, 6.0)], 1.73).unwrap();
        let ray = model.travel_time(Phase::P, 1.0, 0.0, 60.0);
        assert_eq!(ray.kind, RayKind::Head(1));
        assert!(!ray.upgoing);
        let direct = 60.0f64.hypot(1.0) / 3.0;
        assert!(ray.time < direct);
    }

    #[test]
    fn test_derivatives_match_finite_difference() {
        let model = VelocityModel::from_tops(
            &[(-0.6, 1.9), (0.2, 2.6), (1.0, 3.5), (2.0, 3.9), (5.0, 5.4)],
            1.7,
        )
        .unwrap();
        let (dx, dy, zs, zr): (f64, f64, f64, f64) = (3.0, 4.0, 3.5, -0.3);
        let ray = model.travel_time(Phase::P, zs, zr, dx.hypot(dy));
        let d = ray.source_derivatives(dx, dy);

        let h = 1e-4;
        // Moving the source east shrinks the east offset to the receiver.
        let t_east = model.travel_time(Phase::P, zs, zr, (dx - h).hypot(dy)).time;
        let t_down = model.travel_time(Phase::P, zs + h, zr, dx.hypot(dy)).time;
        assert!(((t_east - ray.time) / h - d[0]).abs() < 1e-3);
        assert!(((t_down - ray.time) / h - d[2]).abs() < 1e-3);
    }

    #[test]
    fn test_receiver_above_model_is_clamped() {
        let model = half_space(5.0);
        let a = model.travel_time(Phase::P, 5.0, -2.0, 0.0);
        let b = model.travel_time(Phase::P, 5.0, 0.0, 0.0);
        assert!((a.time - b.time).abs() < 1e-12);
    }
}
