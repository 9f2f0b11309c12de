//! Event pairing for double-difference relocation.
//!
//! Builds catalog differential times from shared picks and links event pairs
//! into a `NeighborGraph` under separation, distance and data-sufficiency
//! constraints.

pub mod catalog_dt;
pub mod config;
pub mod error;
pub mod graph;
pub mod linker;

pub use catalog_dt::catalog_differential_times;
pub use config::PairingConfig;
pub use error::{LinkerError, LinkerResult};
pub use graph::{EventPair, NeighborGraph};
pub use linker::{LinkStats, PairLinker};
