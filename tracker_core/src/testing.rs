//! Minimal sensors for unit tests.

use crate::{
    error::TrackerResult,
    sensor::Sensor,
    types::{DMat, DVec, Measurement, StateVec},
};
use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
use std::sync::Arc;

/// Linear position sensor with a rigid mounting and a symmetric azimuth wedge.
#[derive(Debug, Clone)]
pub(crate) struct TestSensor {
    pub transform: Matrix4<f64>,
    pub sigma: f64,
    pub fov_half: f64,
    pub dim: usize,
    pub geometry: bool,
}

impl TestSensor {
    fn sensor_position(&self, state: &StateVec) -> Vector3<f64> {
        let inv = self.transform.try_inverse().unwrap_or_else(Matrix4::identity);
        let p = inv * nalgebra::Vector4::new(state[0], state[1], state[2], 1.0);
        Vector3::new(p.x, p.y, p.z)
    }
}

impl Sensor for TestSensor {
    fn name(&self) -> &str {
        if self.geometry {
            "test-lidar"
        } else {
            "test-planar"
        }
    }

    fn measurement_dim(&self) -> usize {
        self.dim
    }

    fn measurement_function(&self, state: &StateVec) -> TrackerResult<DVec> {
        let p = self.sensor_position(state);
        Ok(DVec::from_iterator(self.dim, p.iter().copied()))
    }

    fn measurement_jacobian(&self, _state: &StateVec) -> TrackerResult<DMat> {
        let rot: Matrix3<f64> = self.rotation().transpose();
        let mut h = DMat::zeros(self.dim, 6);
        for r in 0..self.dim {
            for c in 0..3 {
                h[(r, c)] = rot[(r, c)];
            }
        }
        Ok(h)
    }

    fn in_field_of_view(&self, state: &StateVec) -> bool {
        let p = self.sensor_position(state);
        p.y.atan2(p.x).abs() < self.fov_half
    }

    fn frame_transform(&self) -> Matrix4<f64> {
        self.transform
    }

    fn noise_covariance(&self) -> DMat {
        DMat::identity(self.dim, self.dim) * (self.sigma * self.sigma)
    }

    fn contributes_geometry(&self) -> bool {
        self.geometry
    }
}

pub(crate) fn mounted_lidar(tx: f64, ty: f64, tz: f64, yaw: f64) -> Arc<dyn Sensor> {
    let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), yaw);
    let mut transform = rot.to_homogeneous();
    transform[(0, 3)] = tx;
    transform[(1, 3)] = ty;
    transform[(2, 3)] = tz;
    Arc::new(TestSensor {
        transform,
        sigma: 0.1,
        fov_half: std::f64::consts::FRAC_PI_2,
        dim: 3,
        geometry: true,
    })
}

pub(crate) fn identity_lidar() -> Arc<dyn Sensor> {
    mounted_lidar(0.0, 0.0, 0.0, 0.0)
}

/// 2-D position sensor that never spawns tracks.
pub(crate) fn planar_sensor() -> Arc<dyn Sensor> {
    Arc::new(TestSensor {
        transform: Matrix4::identity(),
        sigma: 0.5,
        fov_half: std::f64::consts::FRAC_PI_2,
        dim: 2,
        geometry: false,
    })
}

pub(crate) fn lidar_measurement(sensor: &Arc<dyn Sensor>, z: [f64; 3], t: f64) -> Measurement {
    Measurement::new(Arc::clone(sensor), DVec::from_row_slice(&z), t)
        .expect("test measurement has matching dimension")
}

pub(crate) fn planar_measurement(sensor: &Arc<dyn Sensor>, z: [f64; 2], t: f64) -> Measurement {
    Measurement::new(Arc::clone(sensor), DVec::from_row_slice(&z), t)
        .expect("test measurement has matching dimension")
}
