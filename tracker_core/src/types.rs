//! Fundamental types used across the entire workspace.

use crate::error::{TrackerError, TrackerResult};
use crate::sensor::Sensor;
use nalgebra::{DMatrix, DVector, Matrix6, Vector6};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Scalar type: use f64 throughout for numerical precision in Kalman filter.
// ---------------------------------------------------------------------------

/// Dimension of the kinematic state.
pub const STATE_DIM: usize = 6;

/// 6-DOF state vector: [px, py, pz, vx, vy, vz] in vehicle coordinates
pub type StateVec = Vector6<f64>;

/// 6×6 state covariance matrix
pub type StateCov = Matrix6<f64>;

/// Generic dynamic-size vector (measurement z, residual γ)
pub type DVec = DVector<f64>;

/// Generic dynamic-size matrix (used for H, R, S, K)
pub type DMat = DMatrix<f64>;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

/// Track identifier. Allocated monotonically and never reused.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Object geometry
// ---------------------------------------------------------------------------

/// Bounding-box extent of an object in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

impl Shape {
    pub fn new(width: f64, length: f64, height: f64) -> Self {
        Self {
            width,
            length,
            height,
        }
    }

    /// Exponential moving average towards `other` with weight `c` on `other`.
    pub fn blend(&self, other: &Shape, c: f64) -> Shape {
        Shape {
            width: c * other.width + (1.0 - c) * self.width,
            length: c * other.length + (1.0 - c) * self.length,
            height: c * other.height + (1.0 - c) * self.height,
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// One sensor observation for one cycle, expressed in the sensor frame.
///
/// The sensor is shared, not owned: every measurement of a batch points at the
/// same capability object.
#[derive(Clone, Debug)]
pub struct Measurement {
    /// Time of observation in seconds
    pub timestamp: f64,
    /// Observation vector z (sensor frame)
    pub z: DVec,
    /// Measurement noise covariance R (sensor frame)
    pub noise_cov: DMat,
    /// Observed extent (only meaningful for geometry-contributing sensors)
    pub shape: Shape,
    /// Observed heading in the sensor frame (radians)
    pub yaw: f64,
    /// Originating sensor
    pub sensor: Arc<dyn Sensor>,
}

impl Measurement {
    /// Build a measurement, taking R from the sensor's noise model.
    pub fn new(sensor: Arc<dyn Sensor>, z: DVec, timestamp: f64) -> TrackerResult<Self> {
        let dim = sensor.measurement_dim();
        if z.len() != dim {
            return Err(TrackerError::length("measurement vector z", dim, z.len()));
        }
        let noise_cov = sensor.noise_covariance();
        if noise_cov.shape() != (dim, dim) {
            return Err(TrackerError::shape(
                "measurement noise R",
                (dim, dim),
                noise_cov.shape(),
            ));
        }
        Ok(Self {
            timestamp,
            z,
            noise_cov,
            shape: Shape::default(),
            yaw: 0.0,
            sensor,
        })
    }

    /// Attach object extent and heading.
    pub fn with_geometry(mut self, shape: Shape, yaw: f64) -> Self {
        self.shape = shape;
        self.yaw = yaw;
        self
    }

    /// Dimension of the observation vector
    pub fn dim(&self) -> usize {
        self.z.len()
    }
}
