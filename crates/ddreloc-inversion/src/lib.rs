//! Double-difference relocation engine.
//!
//! Relocates clusters of linked events by iterating damped least-squares
//! solves over an ordered schedule of `IterationStage`s. The linear solve is
//! delegated to a `Solver`; `SvdSolver` is the shipped implementation.

pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod solver;

pub use cluster::{clusters, Cluster};
pub use config::{AirQuakePolicy, DataSelection, InversionConfig, PhaseSelection, StartLocation};
pub use engine::{IterationReport, RelocationEngine, RelocationSummary};
pub use error::{InversionError, InversionResult, NumericalError};
pub use solver::{LinearSystem, Solution, Solver, SolverError, SvdSolver};
