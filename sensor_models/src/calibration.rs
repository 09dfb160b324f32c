//! Sensor mounting: rigid sensor-to-vehicle transform and azimuth field of view.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracker_core::StateVec;

/// Pose of a sensor on the vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mounting {
    /// Sensor origin in vehicle coordinates (meters)
    pub translation: [f64; 3],
    /// Rotation about the vehicle z axis (radians)
    pub yaw: f64,
    /// Rotation about the y axis (radians)
    pub pitch: f64,
    /// Rotation about the x axis (radians)
    pub roll: f64,
}

impl Default for Mounting {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

/// Horizontal opening of a sensor, as an azimuth interval in the sensor frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    /// Lower azimuth bound (radians)
    pub min_azimuth: f64,
    /// Upper azimuth bound (radians)
    pub max_azimuth: f64,
}

impl FieldOfView {
    /// Symmetric wedge of `half` radians around the boresight.
    pub fn symmetric(half: f64) -> Self {
        Self {
            min_azimuth: -half,
            max_azimuth: half,
        }
    }

    /// Bounds are exclusive.
    pub fn contains(&self, p_sens: &Vector3<f64>) -> bool {
        let azimuth = p_sens.y.atan2(p_sens.x);
        self.min_azimuth < azimuth && azimuth < self.max_azimuth
    }
}

/// Precomputed transforms for one mounting.
#[derive(Clone, Debug)]
pub struct Calibration {
    sens_to_veh: Isometry3<f64>,
}

impl Calibration {
    pub fn new(mounting: &Mounting) -> Self {
        let [tx, ty, tz] = mounting.translation;
        let rotation = UnitQuaternion::from_euler_angles(mounting.roll, mounting.pitch, mounting.yaw);
        Self {
            sens_to_veh: Isometry3::from_parts(Translation3::new(tx, ty, tz), rotation),
        }
    }

    /// Homogeneous sensor-to-vehicle matrix.
    pub fn sens_to_veh(&self) -> Matrix4<f64> {
        self.sens_to_veh.to_homogeneous()
    }

    /// Rotation taking vehicle-frame vectors into the sensor frame.
    pub fn veh_to_sens_rotation(&self) -> Matrix3<f64> {
        self.sens_to_veh.rotation.inverse().to_rotation_matrix().into_inner()
    }

    /// Position part of a vehicle-frame state, expressed in the sensor frame.
    pub fn to_sensor(&self, state: &StateVec) -> Vector3<f64> {
        let p = Point3::new(state[0], state[1], state[2]);
        self.sens_to_veh.inverse_transform_point(&p).coords
    }
}
