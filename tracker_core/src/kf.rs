//! Kalman filter: predict and update steps.
//!
//! # Design choices
//! - **Linear KF** with a constant-velocity (CV) motion model and a fixed
//!   cycle time `dt` taken from the configuration.
//! - All math is done in `f64` via `nalgebra`.
//! - S is never inverted explicitly; every use of S⁻¹ goes through an LU solve.
//!
//! ## State vector
//! x = [px, py, pz, vx, vy, vz]ᵀ  (6-dimensional)
//!
//! ## CV Transition model
//! F = I₆ + dt * [[0₃ I₃]; [0₃ 0₃]]
//! i.e. px += vx*dt, etc.
//!
//! ## Process noise Q (white-noise acceleration, intensity q)
//! Q_pos = q·dt³/3,  Q_pos_vel = q·dt²/2,  Q_vel = q·dt   (per axis)

use crate::{
    error::{TrackerError, TrackerResult},
    track::Track,
    types::{DMat, DVec, Measurement, StateCov, StateVec, STATE_DIM},
};
use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the CV Kalman filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvKfConfig {
    /// Cycle time in seconds
    pub dt: f64,
    /// Process noise intensity q (acceleration PSD, m²/s³)
    pub process_noise_q: f64,
    /// State dimension; only 6 is supported
    pub dim_state: usize,
    /// Weight of a new observation in the extent/heading moving average
    pub geometry_weight: f64,
}

impl Default for CvKfConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            process_noise_q: 3.0,
            dim_state: STATE_DIM,
            geometry_weight: 0.1,
        }
    }
}

impl CvKfConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        if self.dt.is_nan() || self.dt < 0.0 {
            return Err(TrackerError::InvalidConfig(format!(
                "time step must be non-negative, got {}",
                self.dt
            )));
        }
        if self.process_noise_q.is_nan() || self.process_noise_q < 0.0 {
            return Err(TrackerError::InvalidConfig(format!(
                "process noise intensity must be non-negative, got {}",
                self.process_noise_q
            )));
        }
        if self.dim_state != STATE_DIM {
            return Err(TrackerError::InvalidConfig(format!(
                "state dimension must be {STATE_DIM}, got {}",
                self.dim_state
            )));
        }
        if !(0.0..=1.0).contains(&self.geometry_weight) {
            return Err(TrackerError::InvalidConfig(format!(
                "geometry weight must lie in [0, 1], got {}",
                self.geometry_weight
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Constant Velocity model
// ---------------------------------------------------------------------------

/// Constant-Velocity Kalman filter (6-state, linear). Owns no track state.
#[derive(Clone, Debug)]
pub struct CvKalmanFilter {
    config: CvKfConfig,
    f: Matrix6<f64>,
    q: Matrix6<f64>,
}

impl CvKalmanFilter {
    pub fn new(config: CvKfConfig) -> TrackerResult<Self> {
        config.validate()?;
        let f = Self::transition_matrix(config.dt);
        let q = Self::process_noise(config.dt, config.process_noise_q);
        Ok(Self { config, f, q })
    }

    pub fn config(&self) -> &CvKfConfig {
        &self.config
    }

    /// Build state transition matrix F for timestep dt.
    pub fn transition_matrix(dt: f64) -> Matrix6<f64> {
        let mut f = Matrix6::<f64>::identity();
        // position += velocity * dt
        f[(0, 3)] = dt;
        f[(1, 4)] = dt;
        f[(2, 5)] = dt;
        f
    }

    /// Build process noise matrix Q for timestep dt and intensity q.
    pub fn process_noise(dt: f64, q: f64) -> Matrix6<f64> {
        let q1 = dt * q;
        let q2 = dt * dt / 2.0 * q;
        let q3 = dt * dt * dt / 3.0 * q;

        let mut qm = Matrix6::<f64>::zeros();
        for i in 0..3usize {
            qm[(i, i)] = q3;
            qm[(i + 3, i + 3)] = q1;
            qm[(i, i + 3)] = q2;
            qm[(i + 3, i)] = q2;
        }
        qm
    }

    /// x ← F·x,  P ← F·P·Fᵀ + Q
    pub fn predict(&self, track: &mut Track) {
        track.state = self.f * track.state;
        track.cov = self.f * track.cov * self.f.transpose() + self.q;
    }

    /// Residual γ = z − h(x).
    pub fn residual(&self, track: &Track, meas: &Measurement) -> TrackerResult<DVec> {
        let hx = meas.sensor.measurement_function(&track.state)?;
        if hx.len() != meas.z.len() {
            return Err(TrackerError::length("predicted observation h(x)", meas.z.len(), hx.len()));
        }
        Ok(&meas.z - hx)
    }

    /// Residual covariance S = H·P·Hᵀ + R.
    pub fn innovation_covariance(
        &self,
        track: &Track,
        meas: &Measurement,
        h: &DMat,
    ) -> TrackerResult<DMat> {
        let dim = meas.z.len();
        if h.shape() != (dim, STATE_DIM) {
            return Err(TrackerError::shape("measurement Jacobian H", (dim, STATE_DIM), h.shape()));
        }
        if meas.noise_cov.shape() != (dim, dim) {
            return Err(TrackerError::shape(
                "measurement noise R",
                (dim, dim),
                meas.noise_cov.shape(),
            ));
        }
        let p = dyn_cov(&track.cov);
        Ok(h * p * h.transpose() + &meas.noise_cov)
    }

    /// Squared Mahalanobis distance d² = γᵀ·S⁻¹·γ.
    pub fn mahalanobis(&self, track: &Track, meas: &Measurement) -> TrackerResult<f64> {
        let h = meas.sensor.measurement_jacobian(&track.state)?;
        let gamma = self.residual(track, meas)?;
        let s = self.innovation_covariance(track, meas, &h)?;
        let s_inv_gamma = s
            .lu()
            .solve(&gamma)
            .ok_or(TrackerError::SingularInnovation)?;
        Ok(gamma.dot(&s_inv_gamma))
    }

    /// Correct x and P with an associated measurement, then smooth the track
    /// geometry.
    ///
    /// K = P·Hᵀ·S⁻¹ is obtained by solving S·Kᵀ = H·P (S and P are symmetric).
    /// Returns the innovation γ the correction was computed from.
    pub fn update(&self, track: &mut Track, meas: &Measurement) -> TrackerResult<DVec> {
        let h = meas.sensor.measurement_jacobian(&track.state)?;
        let gamma = self.residual(track, meas)?;
        let s = self.innovation_covariance(track, meas, &h)?;

        let p = dyn_cov(&track.cov);
        let hp = &h * &p;
        let k_t = s
            .lu()
            .solve(&hp)
            .ok_or(TrackerError::SingularInnovation)?;
        let k = k_t.transpose();

        let correction = &k * &gamma;
        track.state += StateVec::from_iterator(correction.iter().copied());

        let i_kh = DMat::identity(STATE_DIM, STATE_DIM) - &k * &h;
        let new_p = i_kh * p;
        let new_cov = StateCov::from_iterator(new_p.iter().copied());
        // (I−KH)·P is symmetric in exact arithmetic; remove round-off asymmetry.
        track.cov = (new_cov + new_cov.transpose()) * 0.5;

        track.timestamp = meas.timestamp;
        track.update_attributes(meas, self.config.geometry_weight);

        Ok(gamma)
    }
}

fn dyn_cov(cov: &StateCov) -> DMat {
    DMat::from_iterator(STATE_DIM, STATE_DIM, cov.iter().copied())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
