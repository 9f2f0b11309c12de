//! Pairing configuration.

use ddreloc_core::Limit;
use serde::{Deserialize, Serialize};

/// Event-pair admission parameters (ph2dt control values).
///
/// Upper-case hypoDD names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Minimum pick weight for catalog differential times.
    #[serde(default, alias = "MINWGHT")]
    pub min_weight: f64,
    /// Maximum event-station distance (km).
    #[serde(default = "default_max_distance", alias = "MAXDIST")]
    pub max_distance_km: Limit,
    /// Maximum hypocentral separation of a pair (km).
    #[serde(default = "default_max_separation", alias = "MAXSEP")]
    pub max_separation_km: Limit,
    /// Maximum neighbors per event.
    #[serde(default = "default_max_neighbors", alias = "MAXNGH")]
    pub max_neighbors: usize,
    /// Minimum distinct (station, phase) links per pair. 0 disables the gate.
    #[serde(default = "default_min_links", alias = "MINLNK")]
    pub min_links: usize,
    /// Minimum observations per pair.
    #[serde(default = "default_min_obs", alias = "MINOBS")]
    pub min_obs: usize,
    /// Maximum observations per pair.
    #[serde(default = "default_max_obs", alias = "MAXOBS")]
    pub max_obs: usize,
}

fn default_max_distance() -> Limit {
    Limit::new(50.0)
}

fn default_max_separation() -> Limit {
    Limit::new(2.0)
}

fn default_max_neighbors() -> usize {
    1000
}

fn default_min_links() -> usize {
    6
}

fn default_min_obs() -> usize {
    1
}

fn default_max_obs() -> usize {
    45
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.0,
            max_distance_km: default_max_distance(),
            max_separation_km: default_max_separation(),
            max_neighbors: default_max_neighbors(),
            min_links: default_min_links(),
            min_obs: default_min_obs(),
            max_obs: default_max_obs(),
        }
    }
}

impl PairingConfig {
    /// Validate configuration values.
    ///
    /// Returns Err if:
    /// - MINWGHT is negative or not finite
    /// - MAXNGH or MAXOBS is zero
    /// - MINLNK or MINOBS exceeds MAXOBS
    pub fn validate(&self) -> Result<(), String> {
        if !self.min_weight.is_finite() || self.min_weight < 0.0 {
            return Err(format!("MINWGHT ({}) must be non-negative", self.min_weight));
        }
        if self.max_neighbors == 0 {
            return Err("MAXNGH must be at least 1".to_string());
        }
        if self.max_obs == 0 {
            return Err("MAXOBS must be at least 1".to_string());
        }
        if self.min_links > self.max_obs {
            return Err(format!(
                "MINLNK ({}) must not exceed MAXOBS ({})",
                self.min_links, self.max_obs
            ));
        }
        if self.min_obs > self.max_obs {
            return Err(format!(
                "MINOBS ({}) must not exceed MAXOBS ({})",
                self.min_obs, self.max_obs
            ));
        }
        Ok(())
    }

    /// Links a pair needs to be admitted, or `None` when the link gate is off.
    pub fn link_threshold(&self) -> Option<usize> {
        (self.min_links > 0).then(|| self.min_links.max(self.min_obs))
    }

    /// Observations a pair needs when the link gate is off.
    pub fn observation_threshold(&self) -> usize {
        self.min_obs.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PairingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link_threshold(), Some(6));
    }

    #[test]
    fn test_hypodd_names() {
        let config: PairingConfig = toml::from_str(
            r#"
            MINWGHT = 0
            MAXDIST = 50
            MAXSEP = 2
            MAXNGH = 1000
            MINLNK = 0
            MINOBS = 3
            MAXOBS = 45
            "#,
        )
        .unwrap();
        assert_eq!(config.max_separation_km, Limit::new(2.0));
        assert_eq!(config.link_threshold(), None);
        assert_eq!(config.observation_threshold(), 3);
    }

    #[test]
    fn test_disabled_distance() {
        let config: PairingConfig = toml::from_str("MAXDIST = -999").unwrap();
        assert!(config.max_distance_km.is_disabled());
    }

    #[test]
    fn test_minlnk_above_maxobs_rejected() {
        let config = PairingConfig {
            min_links: 50,
            max_obs: 45,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("MINLNK"));
    }

    #[test]
    fn test_effective_threshold_uses_minobs() {
        let config = PairingConfig {
            min_links: 4,
            min_obs: 8,
            ..Default::default()
        };
        assert_eq!(config.link_threshold(), Some(8));
    }
}
