//! Core domain types for double-difference relocation.
//!
//! This crate provides the types shared by every pipeline stage:
//! - `Event`, `Pick`, `Phase`: catalog events and their arrival picks
//! - `Station`: read-only station reference data
//! - `DifferentialTime`, `PairKey`: event-pair observations
//! - `IterationStage`: one row of the inversion schedule
//! - `VelocityModel`: layered 1-D model with ray tracing and partial derivatives

pub mod dtime;
pub mod error;
pub mod event;
pub mod geo;
pub mod stage;
pub mod station;
pub mod velocity;

pub use dtime::{DifferentialTime, DtSource, PairKey};
pub use error::{CoreError, Result};
pub use event::{offset_seconds, seconds_between, Event, EventId, Hypocenter, Phase, Pick};
pub use geo::{
    azimuth_deg, azimuthal_gap_deg, centroid, epicentral_distance_km, hypocentral_separation_km,
    LocalFrame, KM_PER_DEG,
};
pub use stage::{IterationStage, Limit, OutlierCutoff};
pub use station::{ChannelOrientation, Station};
pub use velocity::{RayKind, RayPath, VelocityLayer, VelocityModel};
