//! Correlator configuration.

use ddreloc_core::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Cross-correlation parameters.
///
/// Field names follow the `[correlation]` TOML section. The prefixed
/// `cc_*` names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Seconds before the pick in the correlation window.
    #[serde(default = "default_time_before", alias = "cc_time_before")]
    pub time_before: f64,
    /// Seconds after the pick in the correlation window.
    #[serde(default = "default_time_after", alias = "cc_time_after")]
    pub time_after: f64,
    /// Maximum lag searched in either direction, in seconds.
    #[serde(default = "default_maxlag", alias = "cc_maxlag")]
    pub maxlag: f64,
    #[serde(default = "default_filter_min_freq", alias = "cc_filter_min_freq")]
    pub filter_min_freq: f64,
    #[serde(default = "default_filter_max_freq", alias = "cc_filter_max_freq")]
    pub filter_max_freq: f64,
    /// Filter corners (order). Even values only.
    #[serde(default = "default_filter_corners")]
    pub filter_corners: usize,
    /// Component letter -> weight for P picks.
    #[serde(default = "default_p_weighting", alias = "cc_p_phase_weighting")]
    pub p_phase_weighting: BTreeMap<String, f64>,
    /// Component letter -> weight for S picks.
    #[serde(default = "default_s_weighting", alias = "cc_s_phase_weighting")]
    pub s_phase_weighting: BTreeMap<String, f64>,
    /// Combined coefficients below this are discarded. Equality is accepted.
    #[serde(
        default = "default_min_coefficient",
        alias = "cc_min_allowed_cross_corr_coeff"
    )]
    pub min_coefficient: f64,
    /// Worker threads.
    #[serde(default = "default_workers", alias = "ncores")]
    pub workers: usize,
    /// Emit diagnostic records for every unit of each Nth event pair. 0 disables.
    #[serde(default, alias = "cc_plot_int")]
    pub plot_interval: usize,
    #[serde(default, alias = "cc_plot_dir")]
    pub plot_dir: Option<PathBuf>,
}

fn default_time_before() -> f64 {
    0.1
}

fn default_time_after() -> f64 {
    0.5
}

fn default_maxlag() -> f64 {
    0.3
}

fn default_filter_min_freq() -> f64 {
    3.0
}

fn default_filter_max_freq() -> f64 {
    20.0
}

fn default_filter_corners() -> usize {
    4
}

fn default_p_weighting() -> BTreeMap<String, f64> {
    BTreeMap::from([("Z".to_string(), 1.0)])
}

fn default_s_weighting() -> BTreeMap<String, f64> {
    BTreeMap::new()
}

fn default_min_coefficient() -> f64 {
    0.7
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            time_before: default_time_before(),
            time_after: default_time_after(),
            maxlag: default_maxlag(),
            filter_min_freq: default_filter_min_freq(),
            filter_max_freq: default_filter_max_freq(),
            filter_corners: default_filter_corners(),
            p_phase_weighting: default_p_weighting(),
            s_phase_weighting: default_s_weighting(),
            min_coefficient: default_min_coefficient(),
            workers: default_workers(),
            plot_interval: 0,
            plot_dir: None,
        }
    }
}

impl CorrelationConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.time_before.is_finite() || self.time_before < 0.0 {
            return Err(format!(
                "cc_time_before ({}) must be non-negative",
                self.time_before
            ));
        }
        if !self.time_after.is_finite() || self.time_after <= 0.0 {
            return Err(format!("cc_time_after ({}) must be positive", self.time_after));
        }
        if !self.maxlag.is_finite() || self.maxlag <= 0.0 {
            return Err(format!("cc_maxlag ({}) must be positive", self.maxlag));
        }
        if !(self.filter_min_freq.is_finite() && self.filter_min_freq > 0.0) {
            return Err(format!(
                "cc_filter_min_freq ({}) must be positive",
                self.filter_min_freq
            ));
        }
        if !self.filter_max_freq.is_finite() || self.filter_min_freq >= self.filter_max_freq {
            return Err(format!(
                "cc_filter_min_freq ({}) must be less than cc_filter_max_freq ({})",
                self.filter_min_freq, self.filter_max_freq
            ));
        }
        if self.filter_corners == 0 || self.filter_corners % 2 != 0 {
            return Err(format!(
                "filter_corners ({}) must be a positive even number",
                self.filter_corners
            ));
        }
        for (name, map) in [
            ("cc_p_phase_weighting", &self.p_phase_weighting),
            ("cc_s_phase_weighting", &self.s_phase_weighting),
        ] {
            for (component, weight) in map {
                if component.chars().count() != 1 {
                    return Err(format!(
                        "{name}: component key '{component}' must be a single letter"
                    ));
                }
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(format!(
                        "{name}: weight for '{component}' ({weight}) must be non-negative"
                    ));
                }
            }
        }
        if !(-1.0..=1.0).contains(&self.min_coefficient) {
            return Err(format!(
                "cc_min_allowed_cross_corr_coeff ({}) must be within [-1, 1]",
                self.min_coefficient
            ));
        }
        if self.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }
        if self.plot_interval > 0 && self.plot_dir.is_none() {
            return Err("cc_plot_dir is required when cc_plot_int > 0".to_string());
        }
        Ok(())
    }

    /// Components with positive weight for a phase, in component order.
    pub fn components(&self, phase: Phase) -> Vec<(char, f64)> {
        let map = match phase {
            Phase::P => &self.p_phase_weighting,
            Phase::S => &self.s_phase_weighting,
        };
        map.iter()
            .filter(|(_, &w)| w > 0.0)
            .filter_map(|(c, &w)| c.chars().next().map(|c| (c.to_ascii_uppercase(), w)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CorrelationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.components(Phase::P), vec![('Z', 1.0)]);
    }

    #[test]
    fn test_prefixed_names_accepted() {
        let toml_str = r#"
            cc_time_before = 0.1
            cc_time_after = 0.5
            cc_maxlag = 0.3
            cc_filter_min_freq = 3.0
            cc_filter_max_freq = 20.0
            cc_min_allowed_cross_corr_coeff = 0.7
            cc_plot_int = 0
            ncores = 2

            [cc_p_phase_weighting]
            Z = 1.0

            [cc_s_phase_weighting]
        "#;
        let config: CorrelationConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.time_after, 0.5);
        assert_eq!(config.workers, 2);
        assert!(config.s_phase_weighting.is_empty());
        assert!(config.components(Phase::S).is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_weight_components_excluded() {
        let config = CorrelationConfig {
            s_phase_weighting: BTreeMap::from([("N".to_string(), 1.0), ("E".to_string(), 0.0)]),
            ..Default::default()
        };
        assert_eq!(config.components(Phase::S), vec![('N', 1.0)]);
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        let config = CorrelationConfig {
            filter_min_freq: 20.0,
            filter_max_freq: 3.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("cc_filter_min_freq"));
    }

    #[test]
    fn test_validate_requires_plot_dir() {
        let config = CorrelationConfig {
            plot_interval: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
