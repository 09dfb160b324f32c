//! Lidar: linear 3-D position sensor. Spawns tracks and refines their extent.
//!
//! z = [x, y, z] in the sensor frame, h(x) = T_veh→sens · [px, py, pz, 1],
//! H = [R_veh→sens | 0₃].

use crate::calibration::{Calibration, FieldOfView, Mounting};
use nalgebra::{DMatrix, DVector, Matrix4};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use tracker_core::{DMat, DVec, Sensor, StateVec, TrackerResult};

/// Physical configuration of a lidar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarParams {
    pub mounting: Mounting,
    pub fov: FieldOfView,
    /// Measurement noise std dev per axis (meters)
    pub sigma: [f64; 3],
}

impl Default for LidarParams {
    fn default() -> Self {
        Self {
            mounting: Mounting::default(),
            fov: FieldOfView::symmetric(FRAC_PI_2),
            sigma: [0.1, 0.1, 0.1],
        }
    }
}

/// Lidar measurement model.
#[derive(Clone, Debug)]
pub struct Lidar {
    params: LidarParams,
    calib: Calibration,
}

impl Lidar {
    pub fn new(params: LidarParams) -> Self {
        let calib = Calibration::new(&params.mounting);
        Self { params, calib }
    }
}

impl Sensor for Lidar {
    fn name(&self) -> &str {
        "lidar"
    }

    fn measurement_dim(&self) -> usize {
        3
    }

    fn measurement_function(&self, state: &StateVec) -> TrackerResult<DVec> {
        let p = self.calib.to_sensor(state);
        Ok(DVector::from_column_slice(p.as_slice()))
    }

    fn measurement_jacobian(&self, _state: &StateVec) -> TrackerResult<DMat> {
        let rot = self.calib.veh_to_sens_rotation();
        let mut h = DMatrix::zeros(3, 6);
        h.view_mut((0, 0), (3, 3)).copy_from(&rot);
        Ok(h)
    }

    fn in_field_of_view(&self, state: &StateVec) -> bool {
        self.params.fov.contains(&self.calib.to_sensor(state))
    }

    fn frame_transform(&self) -> Matrix4<f64> {
        self.calib.sens_to_veh()
    }

    fn noise_covariance(&self) -> DMat {
        let var = self.params.sigma.map(|s| s * s);
        DMatrix::from_diagonal(&DVector::from_column_slice(&var))
    }

    fn contributes_geometry(&self) -> bool {
        true
    }
}
