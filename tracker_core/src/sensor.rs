//! Sensor capability consumed by the tracker.
//!
//! Concrete measurement models live outside this crate (see `sensor_models`).
//! The tracker only needs the handful of operations below.

use crate::error::TrackerResult;
use crate::types::{DMat, DVec, StateVec};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use std::fmt;

/// Measurement model and mounting of one physical sensor.
pub trait Sensor: fmt::Debug + Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Dimension of the observation vector z.
    fn measurement_dim(&self) -> usize;

    /// Predicted observation h(x) for a vehicle-frame state.
    fn measurement_function(&self, state: &StateVec) -> TrackerResult<DVec>;

    /// Jacobian of h evaluated at `state` (`measurement_dim × 6`).
    fn measurement_jacobian(&self, state: &StateVec) -> TrackerResult<DMat>;

    /// True if the vehicle-frame position of `state` is inside the field of view.
    fn in_field_of_view(&self, state: &StateVec) -> bool;

    /// Homogeneous sensor-to-vehicle transform.
    fn frame_transform(&self) -> Matrix4<f64>;

    /// Measurement noise covariance R in the sensor frame.
    fn noise_covariance(&self) -> DMat;

    /// Whether measurements from this sensor may spawn tracks and refine
    /// object extent and heading.
    fn contributes_geometry(&self) -> bool;

    /// Rotational part of [`Sensor::frame_transform`].
    fn rotation(&self) -> Matrix3<f64> {
        self.frame_transform().fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Map a sensor-frame position to vehicle coordinates.
    fn to_vehicle(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let p = self.frame_transform() * Vector4::new(position.x, position.y, position.z, 1.0);
        Vector3::new(p.x, p.y, p.z)
    }

    /// Rotate a sensor-frame heading into the vehicle frame.
    fn yaw_to_vehicle(&self, yaw: f64) -> f64 {
        let rot = self.rotation();
        let c = rot[(0, 0)] * yaw.cos() + rot[(0, 1)] * yaw.sin();
        c.clamp(-1.0, 1.0).acos()
    }
}
