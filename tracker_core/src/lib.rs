//! `tracker_core` — single nearest-neighbour multi-object tracking.
//!
//! # Module layout
//! - [`types`]        — Fundamental types (IDs, state vectors, measurements)
//! - [`error`]        — Precondition violations
//! - [`sensor`]       — Sensor capability consumed by the filter and the manager
//! - [`track`]        — Track struct and lifecycle status
//! - [`kf`]           — Kalman filter (predict / residual / update)
//! - [`gating`]       — χ² Mahalanobis gating
//! - [`association`]  — Gated association matrix, greedy closest-pair resolution
//! - [`track_manager`] — Score bookkeeping, birth and deletion
//! - [`pipeline`]     — One tracking cycle per sensor batch
//! - [`metrics`]      — RMSE, precision/recall against ground truth

pub mod association;
pub mod error;
pub mod gating;
pub mod kf;
pub mod metrics;
pub mod pipeline;
pub mod sensor;
pub mod track;
pub mod track_manager;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{TrackerError, TrackerResult};
pub use pipeline::{CycleOutput, Pipeline, PipelineConfig};
pub use sensor::Sensor;
pub use track::{Track, TrackStatus};
pub use types::{DMat, DVec, Measurement, Shape, StateCov, StateVec, TrackId};
