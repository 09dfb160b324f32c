//! Object trajectory models and state propagation.
//!
//! Each target has a 6-DOF true state [px,py,pz,vx,vy,vz] in vehicle
//! coordinates, a box extent and a `MotionSpec` describing how it moves.

use serde::{Deserialize, Serialize};
use tracker_core::metrics::GroundTruth;
use tracker_core::Shape;

/// Describes target motion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Constant velocity: no acceleration. State propagates as CV.
    ConstantVelocity,
    /// Constant-turn-rate on XY plane. `omega` = yaw rate (rad/s).
    ConstantTurn { omega: f64 },
    /// Constant acceleration model. `ax, ay, az` in m/s².
    ConstantAccel { ax: f64, ay: f64, az: f64 },
}

/// A simulated object with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    /// Unique target ID (used for metrics)
    pub id: u64,
    /// True state [px, py, pz, vx, vy, vz]
    pub state: [f64; 6],
    /// True box extent
    pub shape: Shape,
    /// Motion model for this target
    pub motion: MotionSpec,
    /// Optional: target disappears after this time
    pub disappear_at: Option<f64>,
    /// Optional: target appears after this time (no measurements before)
    pub appear_at: Option<f64>,
}

impl Target {
    /// Propagate true state by `dt` seconds according to motion spec.
    pub fn step(&mut self, dt: f64) {
        let s = &mut self.state;
        match self.motion {
            MotionSpec::ConstantVelocity => {
                s[0] += s[3] * dt;
                s[1] += s[4] * dt;
                s[2] += s[5] * dt;
            }
            MotionSpec::ConstantTurn { omega } => {
                let v = (s[3] * s[3] + s[4] * s[4]).sqrt();
                let heading = s[4].atan2(s[3]);
                let new_heading = heading + omega * dt;
                s[0] += v * heading.cos() * dt;
                s[1] += v * heading.sin() * dt;
                s[3] = v * new_heading.cos();
                s[4] = v * new_heading.sin();
            }
            MotionSpec::ConstantAccel { ax, ay, az } => {
                s[0] += s[3] * dt + 0.5 * ax * dt * dt;
                s[1] += s[4] * dt + 0.5 * ay * dt * dt;
                s[2] += s[5] * dt + 0.5 * az * dt * dt;
                s[3] += ax * dt;
                s[4] += ay * dt;
                s[5] += az * dt;
            }
        }
    }

    /// True if target is active at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if let Some(appear) = self.appear_at {
            if t < appear {
                return false;
            }
        }
        if let Some(disappear) = self.disappear_at {
            if t >= disappear {
                return false;
            }
        }
        true
    }

    /// Heading of the velocity vector in the vehicle frame (radians).
    pub fn yaw(&self) -> f64 {
        self.state[4].atan2(self.state[3])
    }

    pub fn ground_truth(&self, time: f64) -> GroundTruth {
        GroundTruth {
            target_id: self.id,
            time,
            state: self.state,
        }
    }
}
