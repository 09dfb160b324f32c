//! Camera: nonlinear pinhole projection to image coordinates.
//!
//! With p = (px, py, pz) the object position in the camera frame (x forward):
//!   h(x) = [c_i − f_i·py/px,  c_j − f_j·pz/px]
//! The Jacobian is evaluated at the current estimate. Cameras never spawn
//! tracks and do not refine extent or heading.

use crate::calibration::{Calibration, FieldOfView, Mounting};
use nalgebra::{DMatrix, DVector, Matrix4};
use serde::{Deserialize, Serialize};
use tracker_core::{DMat, DVec, Sensor, StateVec, TrackerError, TrackerResult};

/// Points closer than this to the image plane cannot be projected.
const MIN_DEPTH: f64 = 1e-6;

/// Intrinsics, mounting and noise of a camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    pub mounting: Mounting,
    pub fov: FieldOfView,
    /// Focal lengths [f_i, f_j] (pixels)
    pub focal: [f64; 2],
    /// Principal point [c_i, c_j] (pixels)
    pub principal: [f64; 2],
    /// Measurement noise std dev per image axis (pixels)
    pub sigma: [f64; 2],
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            mounting: Mounting::default(),
            fov: FieldOfView::symmetric(0.35),
            focal: [2095.5, 2095.5],
            principal: [944.9, 640.2],
            sigma: [5.0, 5.0],
        }
    }
}

/// Camera measurement model.
#[derive(Clone, Debug)]
pub struct Camera {
    params: CameraParams,
    calib: Calibration,
}

impl Camera {
    pub fn new(params: CameraParams) -> Self {
        let calib = Calibration::new(&params.mounting);
        Self { params, calib }
    }

    fn depth_checked(&self, state: &StateVec) -> TrackerResult<nalgebra::Vector3<f64>> {
        let p = self.calib.to_sensor(state);
        if p.x.abs() < MIN_DEPTH {
            return Err(TrackerError::DegenerateProjection);
        }
        Ok(p)
    }
}

impl Sensor for Camera {
    fn name(&self) -> &str {
        "camera"
    }

    fn measurement_dim(&self) -> usize {
        2
    }

    fn measurement_function(&self, state: &StateVec) -> TrackerResult<DVec> {
        let p = self.depth_checked(state)?;
        let [fi, fj] = self.params.focal;
        let [ci, cj] = self.params.principal;
        Ok(DVector::from_vec(vec![ci - fi * p.y / p.x, cj - fj * p.z / p.x]))
    }

    fn measurement_jacobian(&self, state: &StateVec) -> TrackerResult<DMat> {
        let p = self.depth_checked(state)?;
        let r = self.calib.veh_to_sens_rotation();
        let [fi, fj] = self.params.focal;
        let px2 = p.x * p.x;

        let mut h = DMatrix::zeros(2, 6);
        for c in 0..3 {
            h[(0, c)] = fi * (-r[(1, c)] / p.x + r[(0, c)] * p.y / px2);
            h[(1, c)] = fj * (-r[(2, c)] / p.x + r[(0, c)] * p.z / px2);
        }
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
        false
    }
}
