//! Linear least-squares capability.

use nalgebra::{DMatrix, DVector, SVD};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum SolverError {
    #[error("system is singular (condition number {0:e})")]
    Singular(f64),

    #[error("solution is not finite")]
    NonFinite,

    #[error("dimension mismatch: {rows} rows, {rhs} right-hand side values")]
    DimensionMismatch { rows: usize, rhs: usize },

    #[error("solver failed: {0}")]
    Failed(String),
}

/// Over-determined system `A x = b`, solved in the least-squares sense.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    pub matrix: DMatrix<f64>,
    pub rhs: DVector<f64>,
}

impl LinearSystem {
    pub fn new(matrix: DMatrix<f64>, rhs: DVector<f64>) -> Self {
        Self { matrix, rhs }
    }

    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn unknowns(&self) -> usize {
        self.matrix.ncols()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub x: DVector<f64>,
    /// Ratio of the largest to the smallest singular value.
    pub condition_number: f64,
}

/// Solves the damped least-squares system of one iteration.
#[cfg_attr(test, mockall::automock)]
pub trait Solver {
    fn solve(&self, system: &LinearSystem) -> Result<Solution, SolverError>;
}

/// Least squares through the singular value decomposition.
#[derive(Debug, Clone)]
pub struct SvdSolver {
    /// Smallest accepted `min / max` singular value ratio.
    pub rcond: f64,
}

impl Default for SvdSolver {
    fn default() -> Self {
        Self { rcond: 1e-12 }
    }
}

impl Solver for SvdSolver {
    fn solve(&self, system: &LinearSystem) -> Result<Solution, SolverError> {
        if system.rows() != system.rhs.len() {
            return Err(SolverError::DimensionMismatch {
                rows: system.rows(),
                rhs: system.rhs.len(),
            });
        }
        if system.unknowns() == 0 {
            return Ok(Solution {
                x: DVector::zeros(0),
                condition_number: 1.0,
            });
        }
        if system.rows() < system.unknowns() {
            return Err(SolverError::Singular(f64::INFINITY));
        }
        if system.matrix.iter().chain(system.rhs.iter()).any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite);
        }

        let svd = SVD::new(system.matrix.clone(), true, true);
        let max = svd.singular_values.max();
        let min = svd.singular_values.min();
        let condition_number = if min > 0.0 { max / min } else { f64::INFINITY };
        if max <= 0.0 || min < self.rcond * max {
            return Err(SolverError::Singular(condition_number));
        }

        let x = svd
            .solve(&system.rhs, self.rcond * max)
            .map_err(|e| SolverError::Failed(e.to_string()))?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite);
        }
        Ok(Solution {
            x,
            condition_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overdetermined_least_squares() {
        // Fit y = a + b t to exact points.
        let matrix = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let rhs = DVector::from_vec(vec![1.0, 3.0, 5.0, 7.0]);
        let solution = SvdSolver::default()
            .solve(&LinearSystem::new(matrix, rhs))
            .unwrap();
        assert!((solution.x[0] - 1.0).abs() < 1e-10);
        assert!((solution.x[1] - 2.0).abs() < 1e-10);
        assert!(solution.condition_number >= 1.0);
    }

    #[test]
    fn test_singular_system_rejected() {
        let matrix = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        let rhs = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let err = SvdSolver::default()
            .solve(&LinearSystem::new(matrix, rhs))
            .unwrap_err();
        assert!(matches!(err, SolverError::Singular(_)));
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let matrix = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        let rhs = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(
            SvdSolver::default().solve(&LinearSystem::new(matrix, rhs)),
            Err(SolverError::NonFinite)
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let matrix = DMatrix::identity(2, 2);
        let rhs = DVector::from_vec(vec![1.0]);
        assert!(matches!(
            SvdSolver::default().solve(&LinearSystem::new(matrix, rhs)),
            Err(SolverError::DimensionMismatch { rows: 2, rhs: 1 })
        ));
    }
}
