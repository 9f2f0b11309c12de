//! Local flat-earth geometry.
//!
//! Relocation works on clusters a few tens of km wide, so coordinates are
//! projected onto a tangent plane about a reference point.

use crate::event::Hypocenter;

/// Kilometres per degree of latitude.
pub const KM_PER_DEG: f64 = 111.19;

/// Equirectangular projection about a reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    lat0: f64,
    lon0: f64,
    cos_lat0: f64,
}

impl LocalFrame {
    pub fn new(lat0: f64, lon0: f64) -> Self {
        Self {
            lat0,
            lon0,
            cos_lat0: lat0.to_radians().cos(),
        }
    }

    /// Frame centred on the mean position of the given hypocenters.
    pub fn centred_on<'a>(hypocenters: impl IntoIterator<Item = &'a Hypocenter>) -> Option<Self> {
        centroid(hypocenters).map(|c| Self::new(c.latitude, c.longitude))
    }

    /// (east, north) in km.
    pub fn to_local(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let x = (longitude - self.lon0) * KM_PER_DEG * self.cos_lat0;
        let y = (latitude - self.lat0) * KM_PER_DEG;
        (x, y)
    }

    /// (latitude, longitude) of a local (east, north) point.
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let latitude = self.lat0 + y / KM_PER_DEG;
        let longitude = self.lon0 + x / (KM_PER_DEG * self.cos_lat0);
        (latitude, longitude)
    }
}

/// Arithmetic mean hypocenter.
pub fn centroid<'a>(hypocenters: impl IntoIterator<Item = &'a Hypocenter>) -> Option<Hypocenter> {
    let mut n = 0usize;
    let (mut lat, mut lon, mut depth) = (0.0, 0.0, 0.0);
    for h in hypocenters {
        lat += h.latitude;
        lon += h.longitude;
        depth += h.depth_km;
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let n = n as f64;
    Some(Hypocenter {
        latitude: lat / n,
        longitude: lon / n,
        depth_km: depth / n,
    })
}

/// Horizontal distance in km between two geographic points.
pub fn epicentral_distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let mid_lat = ((lat_a + lat_b) / 2.0).to_radians();
    let x = (lon_b - lon_a) * KM_PER_DEG * mid_lat.cos();
    let y = (lat_b - lat_a) * KM_PER_DEG;
    x.hypot(y)
}

/// 3-D distance in km between two hypocenters.
pub fn hypocentral_separation_km(a: &Hypocenter, b: &Hypocenter) -> f64 {
    let h = epicentral_distance_km(a.latitude, a.longitude, b.latitude, b.longitude);
    h.hypot(a.depth_km - b.depth_km)
}

/// Azimuth in degrees clockwise from north, from point A to point B.
pub fn azimuth_deg(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let frame = LocalFrame::new(lat_a, lon_a);
    let (x, y) = frame.to_local(lat_b, lon_b);
    let az = x.atan2(y).to_degrees();
    if az < 0.0 {
        az + 360.0
    } else {
        az
    }
}

/// Largest azimuthal gap in degrees. Fewer than two azimuths give 360.
pub fn azimuthal_gap_deg(azimuths: &[f64]) -> f64 {
    if azimuths.len() < 2 {
        return 360.0;
    }
    let mut sorted: Vec<f64> = azimuths.iter().map(|a| a.rem_euclid(360.0)).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut gap = sorted[0] + 360.0 - sorted[sorted.len() - 1];
    for w in sorted.windows(2) {
        gap = gap.max(w[1] - w[0]);
    }
    gap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_round_trip() {
        let frame = LocalFrame::new(-38.6, 176.1);
        let (x, y) = frame.to_local(-38.55, 176.2);
        let (lat, lon) = frame.to_geographic(x, y);
        assert!((lat + 38.55).abs() < 1e-10);
        assert!((lon - 176.2).abs() < 1e-10);
    }

    #[test]
    fn test_one_degree_north() {
        let d = epicentral_distance_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - KM_PER_DEG).abs() < 1e-9);
    }

    #[test]
    fn test_separation_includes_depth() {
        let a = Hypocenter::new(0.0, 0.0, 3.0).unwrap();
        let b = Hypocenter::new(0.0, 0.0, 7.0).unwrap();
        assert!((hypocentral_separation_km(&a, &b) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_azimuth_quadrants() {
        assert!((azimuth_deg(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((azimuth_deg(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((azimuth_deg(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((azimuth_deg(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_azimuthal_gap() {
        assert_eq!(azimuthal_gap_deg(&[]), 360.0);
        assert_eq!(azimuthal_gap_deg(&[10.0]), 360.0);
        assert!((azimuthal_gap_deg(&[0.0, 90.0, 180.0, 270.0]) - 90.0).abs() < 1e-9);
        assert!((azimuthal_gap_deg(&[350.0, 10.0]) - 340.0).abs() < 1e-9);
    }

    #[test]
    fn test_centroid() {
        let hs = [
            Hypocenter::new(0.0, 0.0, 2.0).unwrap(),
            Hypocenter::new(2.0, 4.0, 4.0).unwrap(),
        ];
        let c = centroid(hs.iter()).unwrap();
        assert_eq!(c.latitude, 1.0);
        assert_eq!(c.longitude, 2.0);
        assert_eq!(c.depth_km, 3.0);
        assert!(centroid(std::iter::empty()).is_none());
    }
}
