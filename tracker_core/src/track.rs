//! Track: state, covariance, lifecycle status, confidence score, geometry.

use crate::{
    error::{TrackerError, TrackerResult},
    types::{Measurement, Shape, StateCov, StateVec, TrackId},
};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a track.
///
/// Ordered so that progress only ever moves forward; see [`Track::promote`].
/// Deletion is not a status, deleted tracks leave the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Just spawned from a single measurement
    Initialized,
    /// Updated at least once
    Tentative,
    /// Score reached the confirmation threshold
    Confirmed,
}

/// A single tracked object hypothesis.
#[derive(Clone, Debug)]
pub struct Track {
    /// Unique identifier
    pub id: TrackId,
    /// Estimated state vector [px,py,pz,vx,vy,vz] (vehicle frame)
    pub state: StateVec,
    /// Estimation error covariance
    pub cov: StateCov,
    /// Lifecycle status
    pub status: TrackStatus,
    /// Confidence accumulator, never above 1.0
    pub score: f64,
    /// Smoothed object extent
    pub shape: Shape,
    /// Heading in the vehicle frame (radians)
    pub yaw: f64,
    /// Time of last update (seconds)
    pub timestamp: f64,
}

impl Track {
    /// Create a track with an explicit initial estimate.
    pub fn new(id: TrackId, state: StateVec, cov: StateCov, score: f64, timestamp: f64) -> Self {
        Self {
            id,
            state,
            cov,
            status: TrackStatus::Initialized,
            score,
            shape: Shape::default(),
            yaw: 0.0,
            timestamp,
        }
    }

    /// Seed a track from an unassociated measurement.
    ///
    /// Position is the first three components of z mapped to the vehicle frame,
    /// velocity is zero. The position block of P is `M·R·Mᵀ` with `M` the
    /// rotational part of the sensor transform; the velocity block is
    /// `diag(velocity_std²)`.
    pub fn from_measurement(
        id: TrackId,
        meas: &Measurement,
        velocity_std: [f64; 3],
        score: f64,
    ) -> TrackerResult<Self> {
        if meas.z.len() < 3 {
            return Err(TrackerError::length(
                "position-bearing measurement",
                3,
                meas.z.len(),
            ));
        }
        if meas.noise_cov.shape() != (3, 3) {
            return Err(TrackerError::shape(
                "position measurement noise R",
                (3, 3),
                meas.noise_cov.shape(),
            ));
        }

        let sensor = &meas.sensor;
        let pos_sens = Vector3::new(meas.z[0], meas.z[1], meas.z[2]);
        let pos_veh = sensor.to_vehicle(&pos_sens);

        let mut state = StateVec::zeros();
        state.fixed_rows_mut::<3>(0).copy_from(&pos_veh);

        let rot = sensor.rotation();
        let r = Matrix3::from_iterator(meas.noise_cov.iter().copied());
        let mut cov = StateCov::zeros();
        cov.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(rot * r * rot.transpose()));
        for (i, sigma) in velocity_std.iter().enumerate() {
            cov[(i + 3, i + 3)] = sigma * sigma;
        }

        Ok(Self {
            id,
            state,
            cov,
            status: TrackStatus::Initialized,
            score,
            shape: meas.shape,
            yaw: sensor.yaw_to_vehicle(meas.yaw),
            timestamp: meas.timestamp,
        })
    }

    /// Smooth extent and heading towards a measurement with weight `c`.
    /// Sensors that do not contribute geometry leave both untouched.
    pub fn update_attributes(&mut self, meas: &Measurement, c: f64) {
        if !meas.sensor.contributes_geometry() {
            return;
        }
        self.shape = self.shape.blend(&meas.shape, c);
        self.yaw = meas.sensor.yaw_to_vehicle(meas.yaw);
    }

    /// Move the status forward; never regresses.
    pub fn promote(&mut self, status: TrackStatus) {
        self.status = self.status.max(status);
    }

    /// Largest of the x/y position variances.
    pub fn max_position_variance(&self) -> f64 {
        self.cov[(0, 0)].max(self.cov[(1, 1)])
    }

    /// Vehicle-frame position [x, y, z]
    pub fn position(&self) -> Vector3<f64> {
        self.state.fixed_rows::<3>(0).into_owned()
    }

    /// Vehicle-frame velocity [vx, vy, vz]
    pub fn velocity(&self) -> Vector3<f64> {
        self.state.fixed_rows::<3>(3).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
