//! Inversion schedule rows.
//!
//! A stage is written either as a hypoDD-style row
//! `"NITER WTCCP WTCCS WRCC WDCC WTCTP WTCTS WRCT WDCT DAMP"` or as a table
//! with the same field names. Negative values are the "disabled" sentinel
//! (`-999` in the usual control files).

use crate::dtime::DtSource;
use crate::error::{CoreError, Result};
use crate::event::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Serialized form of a disabled value.
const DISABLED_SENTINEL: f64 = -999.0;

/// Upper bound that a negative sentinel disables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Limit(Option<f64>);

impl Limit {
    pub const DISABLED: Self = Self(None);

    pub fn new(value: f64) -> Self {
        Self::from(value)
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn is_disabled(&self) -> bool {
        self.0.is_none()
    }

    /// True when `x` is within the limit (always true when disabled).
    pub fn allows(&self, x: f64) -> bool {
        match self.0 {
            Some(limit) => x <= limit,
            None => true,
        }
    }
}

impl From<f64> for Limit {
    fn from(value: f64) -> Self {
        if value.is_finite() && value >= 0.0 {
            Self(Some(value))
        } else {
            Self(None)
        }
    }
}

impl From<Limit> for f64 {
    fn from(limit: Limit) -> Self {
        limit.0.unwrap_or(DISABLED_SENTINEL)
    }
}

/// Residual cutoff for outlier rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub enum OutlierCutoff {
    Disabled,
    /// Absolute residual threshold in seconds (raw value in (0, 1)).
    Static(f64),
    /// Multiple of the residual standard deviation (raw value >= 1).
    Dynamic(f64),
}

impl OutlierCutoff {
    /// Residual magnitude above which an observation is excluded.
    pub fn threshold(&self, residual_std: f64) -> Option<f64> {
        match *self {
            OutlierCutoff::Disabled => None,
            OutlierCutoff::Static(seconds) => Some(seconds),
            OutlierCutoff::Dynamic(factor) => Some(factor * residual_std),
        }
    }
}

impl From<f64> for OutlierCutoff {
    fn from(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            OutlierCutoff::Disabled
        } else if value < 1.0 {
            OutlierCutoff::Static(value)
        } else {
            OutlierCutoff::Dynamic(value)
        }
    }
}

impl From<OutlierCutoff> for f64 {
    fn from(cutoff: OutlierCutoff) -> Self {
        match cutoff {
            OutlierCutoff::Disabled => DISABLED_SENTINEL,
            OutlierCutoff::Static(v) | OutlierCutoff::Dynamic(v) => v,
        }
    }
}

/// One stage of the iterative inversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StageRepr", into = "StageTable")]
pub struct IterationStage {
    /// Number of iterations in this stage.
    pub niter: u32,
    /// Cross-correlation weights (P, S); negative = data not used.
    pub wtccp: f64,
    pub wtccs: f64,
    /// Cross-correlation outlier cutoff.
    pub wrcc: OutlierCutoff,
    /// Cross-correlation max inter-event separation (km).
    pub wdcc: Limit,
    /// Catalog weights (P, S); negative = data not used.
    pub wtctp: f64,
    pub wtcts: f64,
    /// Catalog outlier cutoff.
    pub wrct: OutlierCutoff,
    /// Catalog max inter-event separation (km).
    pub wdct: Limit,
    /// Damping factor.
    pub damp: f64,
}

impl IterationStage {
    /// Stage weight for a data class, `None` when the class is switched off.
    pub fn weight(&self, source: DtSource, phase: Phase) -> Option<f64> {
        let w = match (source, phase) {
            (DtSource::CrossCorrelation, Phase::P) => self.wtccp,
            (DtSource::CrossCorrelation, Phase::S) => self.wtccs,
            (DtSource::Catalog, Phase::P) => self.wtctp,
            (DtSource::Catalog, Phase::S) => self.wtcts,
        };
        (w >= 0.0).then_some(w)
    }

    pub fn outlier_cutoff(&self, source: DtSource) -> OutlierCutoff {
        match source {
            DtSource::CrossCorrelation => self.wrcc,
            DtSource::Catalog => self.wrct,
        }
    }

    pub fn max_separation(&self, source: DtSource) -> Limit {
        match source {
            DtSource::CrossCorrelation => self.wdcc,
            DtSource::Catalog => self.wdct,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.niter == 0 {
            return Err(CoreError::InvalidStage("NITER must be at least 1".to_string()));
        }
        for (name, w) in [
            ("WTCCP", self.wtccp),
            ("WTCCS", self.wtccs),
            ("WTCTP", self.wtctp),
            ("WTCTS", self.wtcts),
        ] {
            if !w.is_finite() {
                return Err(CoreError::InvalidStage(format!("{name} is not finite")));
            }
        }
        if !self.damp.is_finite() || self.damp < 0.0 {
            return Err(CoreError::InvalidStage(format!(
                "DAMP ({}) must be finite and >= 0",
                self.damp
            )));
        }
        Ok(())
    }
}

impl FromStr for IterationStage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 10 {
            return Err(CoreError::InvalidStage(format!(
                "expected 10 fields, got {}: {s:?}",
                fields.len()
            )));
        }
        let num = |i: usize| -> Result<f64> {
            fields[i].parse::<f64>().map_err(|e| {
                CoreError::InvalidStage(format!("field {} ({:?}): {e}", i + 1, fields[i]))
            })
        };
        let niter = fields[0].parse::<u32>().map_err(|e| {
            CoreError::InvalidStage(format!("NITER ({:?}): {e}", fields[0]))
        })?;
        let stage = IterationStage {
            niter,
            wtccp: num(1)?,
            wtccs: num(2)?,
            wrcc: num(3)?.into(),
            wdcc: num(4)?.into(),
            wtctp: num(5)?,
            wtcts: num(6)?,
            wrct: num(7)?.into(),
            wdct: num(8)?.into(),
            damp: num(9)?,
        };
        stage.validate()?;
        Ok(stage)
    }
}

impl fmt::Display for IterationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>4} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
            self.niter,
            self.wtccp,
            self.wtccs,
            f64::from(self.wrcc),
            f64::from(self.wdcc),
            self.wtctp,
            self.wtcts,
            f64::from(self.wrct),
            f64::from(self.wdct),
            self.damp
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StageTable {
    #[serde(alias = "NITER")]
    niter: u32,
    #[serde(alias = "WTCCP")]
    wtccp: f64,
    #[serde(alias = "WTCCS")]
    wtccs: f64,
    #[serde(alias = "WRCC")]
    wrcc: f64,
    #[serde(alias = "WDCC")]
    wdcc: f64,
    #[serde(alias = "WTCTP")]
    wtctp: f64,
    #[serde(alias = "WTCTS")]
    wtcts: f64,
    #[serde(alias = "WRCT")]
    wrct: f64,
    #[serde(alias = "WDCT")]
    wdct: f64,
    #[serde(alias = "DAMP")]
    damp: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StageRepr {
    Row(String),
    Table(StageTable),
}

impl TryFrom<StageRepr> for IterationStage {
    type Error = CoreError;

    fn try_from(repr: StageRepr) -> Result<Self> {
        match repr {
            StageRepr::Row(row) => row.parse(),
            StageRepr::Table(t) => {
                let stage = IterationStage {
                    niter: t.niter,
                    wtccp: t.wtccp,
                    wtccs: t.wtccs,
                    wrcc: t.wrcc.into(),
                    wdcc: t.wdcc.into(),
                    wtctp: t.wtctp,
                    wtcts: t.wtcts,
                    wrct: t.wrct.into(),
                    wdct: t.wdct.into(),
                    damp: t.damp,
                };
                stage.validate()?;
                Ok(stage)
            }
        }
    }
}

impl From<IterationStage> for StageTable {
    fn from(s: IterationStage) -> Self {
        Self {
            niter: s.niter,
            wtccp: s.wtccp,
            wtccs: s.wtccs,
            wrcc: s.wrcc.into(),
            wdcc: s.wdcc.into(),
            wtctp: s.wtctp,
            wtcts: s.wtcts,
            wrct: s.wrct.into(),
            wdct: s.wdct.into(),
            damp: s.damp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row() {
        let stage: IterationStage = "   5  1.00  0.01 -999  0.5  0.01 0.005 -999    4   20"
            .parse()
            .unwrap();
        assert_eq!(stage.niter, 5);
        assert_eq!(stage.wtccp, 1.0);
        assert_eq!(stage.wrcc, OutlierCutoff::Disabled);
        assert_eq!(stage.wdcc.value(), Some(0.5));
        assert_eq!(stage.wdct.value(), Some(4.0));
        assert_eq!(stage.damp, 20.0);
    }

    #[test]
    fn test_negative_weight_disables_data() {
        let stage: IterationStage = "5 0.10 -999 2 1 1.0 -999 2 1 150".parse().unwrap();
        assert_eq!(stage.weight(DtSource::CrossCorrelation, Phase::P), Some(0.10));
        assert_eq!(stage.weight(DtSource::CrossCorrelation, Phase::S), None);
        assert_eq!(stage.weight(DtSource::Catalog, Phase::S), None);
        assert_eq!(stage.outlier_cutoff(DtSource::Catalog), OutlierCutoff::Dynamic(2.0));
    }

    #[test]
    fn test_cutoff_classification() {
        assert_eq!(OutlierCutoff::from(-999.0), OutlierCutoff::Disabled);
        assert_eq!(OutlierCutoff::from(0.3), OutlierCutoff::Static(0.3));
        assert_eq!(OutlierCutoff::from(1.0), OutlierCutoff::Dynamic(1.0));
        assert_eq!(OutlierCutoff::Static(0.3).threshold(10.0), Some(0.3));
        assert_eq!(OutlierCutoff::Dynamic(3.0).threshold(0.02), Some(3.0 * 0.02));
        assert_eq!(OutlierCutoff::Disabled.threshold(1.0), None);
    }

    #[test]
    fn test_limit() {
        let disabled = Limit::new(-999.0);
        assert!(disabled.is_disabled());
        assert!(disabled.allows(1e9));
        let limit = Limit::new(2.0);
        assert!(limit.allows(2.0));
        assert!(!limit.allows(2.0001));
    }

    #[test]
    fn test_bad_rows() {
        assert!("5 1 1".parse::<IterationStage>().is_err());
        assert!("0 1 1 -999 -999 1 1 -999 -999 20".parse::<IterationStage>().is_err());
        assert!("5 x 1 -999 -999 1 1 -999 -999 20".parse::<IterationStage>().is_err());
        assert!("5 1 1 -999 -999 1 1 -999 -999 -1".parse::<IterationStage>().is_err());
    }

    #[test]
    fn test_toml_row_and_table_forms() {
        #[derive(Deserialize)]
        struct Doc {
            stages: Vec<IterationStage>,
        }
        let doc: Doc = toml::from_str(
            r#"
            stages = [
                "5 0.01 0.01 -999 -999 1.0 0.005 -999 -999 20",
                { NITER = 3, WTCCP = 1.0, WTCCS = 0.5, WRCC = 6, WDCC = 2, WTCTP = 0.01, WTCTS = 0.005, WRCT = 6, WDCT = 4, DAMP = 30 },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(doc.stages.len(), 2);
        assert_eq!(doc.stages[1].niter, 3);
        assert_eq!(doc.stages[1].wrcc, OutlierCutoff::Dynamic(6.0));
    }

    #[test]
    fn test_display_round_trips() {
        let stage: IterationStage = "5 0.7 -999 2 0.75 0.3 -999 2 0.75 50".parse().unwrap();
        let reparsed: IterationStage = stage.to_string().parse().unwrap();
        assert_eq!(stage, reparsed);
    }
}
