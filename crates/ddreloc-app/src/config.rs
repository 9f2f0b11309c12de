//! Application configuration.

use crate::error::{AppError, AppResult};
use ddreloc_core::VelocityModel;
use ddreloc_correlate::CorrelationConfig;
use ddreloc_inversion::InversionConfig;
use ddreloc_linker::PairingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Working directory and output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Intermediate artifacts are written here.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Refined catalog path. Defaults to `<workdir>/relocated.json`.
    #[serde(default, alias = "output_event_file")]
    pub output_catalog: Option<PathBuf>,
    /// Reuse `dt.cc`/`dt.ct` when the manifest hash matches.
    #[serde(default = "default_true")]
    pub restart: bool,
    /// Write `metrics.prom` at the end of the run.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

fn default_workdir() -> PathBuf {
    PathBuf::from("work")
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            output_catalog: None,
            restart: true,
            metrics: true,
        }
    }
}

impl RunConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output_catalog
            .clone()
            .unwrap_or_else(|| self.workdir.join("relocated.json"))
    }
}

/// Input files. The builder can add more before the run starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub event_files: Vec<PathBuf>,
    /// Trace files or directories scanned recursively.
    #[serde(default, alias = "waveform_files")]
    pub waveform_paths: Vec<PathBuf>,
    #[serde(default)]
    pub station_files: Vec<PathBuf>,
}

/// Layered P velocity model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// `[top_depth_km, vp_km_s]` rows, shallowest first.
    #[serde(default = "default_layer_tops")]
    pub layer_tops: Vec<(f64, f64)>,
    #[serde(default = "default_vp_vs_ratio")]
    pub vp_vs_ratio: f64,
}

/// Ngatamariki 1D model.
fn default_layer_tops() -> Vec<(f64, f64)> {
    vec![
        (-0.6, 1.9),
        (0.2, 2.6),
        (1.0, 3.5),
        (1.5, 3.6),
        (2.0, 3.9),
        (3.0, 4.9),
        (5.0, 5.4),
        (10.0, 5.8),
        (20.0, 6.9),
        (50.0, 7.4),
    ]
}

fn default_vp_vs_ratio() -> f64 {
    1.7
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            layer_tops: default_layer_tops(),
            vp_vs_ratio: default_vp_vs_ratio(),
        }
    }
}

impl VelocityConfig {
    pub fn model(&self) -> AppResult<VelocityModel> {
        Ok(VelocityModel::from_tops(&self.layer_tops, self.vp_vs_ratio)?)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub inputs: InputsConfig,
    #[serde(default)]
    pub velocity: VelocityConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
    #[serde(default)]
    pub inversion: InversionConfig,
}

/// Everything that determines the contents of `dt.cc` and `dt.ct`.
#[derive(Serialize)]
pub(crate) struct ArtifactParameters<'a> {
    pub inputs: &'a InputsConfig,
    pub correlation: CorrelationConfig,
    pub pairing: &'a PairingConfig,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Validate every section.
    ///
    /// Returns Err naming the offending section and parameter.
    pub fn validate(&self) -> AppResult<()> {
        self.correlation
            .validate()
            .map_err(|e| AppError::Config(format!("[correlation] {e}")))?;
        self.pairing
            .validate()
            .map_err(|e| AppError::Config(format!("[pairing] {e}")))?;
        self.inversion
            .validate()
            .map_err(|e| AppError::Config(format!("[inversion] {e}")))?;
        self.velocity
            .model()
            .map_err(|e| AppError::Config(format!("[velocity] {e}")))?;
        Ok(())
    }

    /// Parameters hashed into the run manifest. Worker count and
    /// diagnostic settings do not change the artifacts and are left out.
    pub(crate) fn artifact_parameters(&self) -> ArtifactParameters<'_> {
        ArtifactParameters {
            inputs: &self.inputs,
            correlation: CorrelationConfig {
                workers: 0,
                plot_interval: 0,
                plot_dir: None,
                ..self.correlation.clone()
            },
            pairing: &self.pairing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddreloc_persistence::parameter_hash;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.velocity.layer_tops.len(), 10);
        assert_eq!(config.run.output_path(), PathBuf::from("work/relocated.json"));
        assert!(config.run.restart);
    }

    #[test]
    fn test_parse_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [run]
            workdir = "/tmp/reloc"
            output_event_file = "/tmp/out.json"

            [inputs]
            event_files = ["events.json"]
            waveform_paths = ["waveforms"]
            station_files = ["stations.json"]

            [velocity]
            layer_tops = [[-1.0, 4.0], [2.0, 5.0]]
            vp_vs_ratio = 1.75

            [correlation]
            cc_maxlag = 0.2
            ncores = 2

            [pairing]
            MAXSEP = 3.0
            MINLNK = 8

            [inversion]
            IDAT = 3
            stages = ["   3  1.0  -999  -9  -9  0.01  -999  -9  -9  20"]
            "#,
        )
        .unwrap();

        assert_eq!(config.run.output_path(), PathBuf::from("/tmp/out.json"));
        assert_eq!(config.inputs.station_files.len(), 1);
        assert_eq!(config.velocity.layer_tops[1], (2.0, 5.0));
        assert_eq!(config.correlation.maxlag, 0.2);
        assert_eq!(config.correlation.workers, 2);
        assert_eq!(config.pairing.min_links, 8);
        assert_eq!(config.inversion.stages.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_section_named() {
        let mut config = AppConfig::default();
        config.pairing.min_links = 100;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("[pairing]"));
        assert!(err.contains("MINLNK"));

        let mut config = AppConfig::default();
        config.velocity.layer_tops = vec![(2.0, 5.0), (1.0, 6.0)];
        assert!(config.validate().unwrap_err().to_string().contains("[velocity]"));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/ddreloc.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn test_artifact_hash_ignores_workers() {
        let a = AppConfig::default();
        let mut b = a.clone();
        b.correlation.workers = a.correlation.workers + 3;
        b.correlation.plot_interval = 10;
        assert_eq!(
            parameter_hash(&a.artifact_parameters()).unwrap(),
            parameter_hash(&b.artifact_parameters()).unwrap()
        );

        b.pairing.min_links = 7;
        assert_ne!(
            parameter_hash(&a.artifact_parameters()).unwrap(),
            parameter_hash(&b.artifact_parameters()).unwrap()
        );
    }
}
