//! Scenario definitions.
//!
//! Each scenario is a named set of objects around the ego vehicle plus the
//! lidar/camera rig observing them. All scenarios are deterministic given
//! the same seed.

use crate::{
    sensor_sim::{MeasurementSimulator, SimSensor},
    target::{MotionSpec, Target},
};
use sensor_models::{Camera, CameraParams, Lidar, LidarParams, Mounting};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracker_core::Shape;

/// Which pre-defined scenario to load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// One vehicle ahead, lidar + camera, no clutter
    Single,
    /// Four vehicles in adjacent lanes, one merging in and one leaving, light clutter
    Highway,
    /// Two vehicles crossing in front of the ego vehicle and one turning
    Crossing,
}

/// Detection behaviour shared by the sensors of a scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Probability of detection per object per scan
    pub p_detection: f64,
    /// Mean clutter returns per lidar scan
    pub lambda_clutter: f64,
    /// Maximum detection range (meters)
    pub max_range: f64,
    /// Scan rate of every sensor (Hz)
    pub refresh_rate: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            p_detection: 0.9,
            lambda_clutter: 0.0,
            max_range: 50.0,
            refresh_rate: 10.0,
        }
    }
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: f64, // seconds
    pub sim_dt: f64,   // simulation step (s), one tracker cycle
    pub targets: Vec<Target>,
    pub lidar: LidarParams,
    /// Optional secondary sensor
    pub camera: Option<CameraParams>,
    pub detection: DetectionParams,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Single => Self::single(seed),
            ScenarioKind::Highway => Self::highway(seed),
            ScenarioKind::Crossing => Self::crossing(seed),
        }
    }

    /// Sensors of this scenario, lidar first.
    pub fn sim_sensors(&self) -> Vec<SimSensor> {
        let mut sensors = vec![self.sim_sensor(
            Arc::new(Lidar::new(self.lidar.clone())),
            self.lidar.mounting.yaw,
            self.detection.lambda_clutter,
        )];
        if let Some(camera) = &self.camera {
            sensors.push(self.sim_sensor(
                Arc::new(Camera::new(camera.clone())),
                camera.mounting.yaw,
                0.0,
            ));
        }
        sensors
    }

    /// Measurement simulator seeded with the scenario seed.
    pub fn simulator(&self) -> MeasurementSimulator {
        MeasurementSimulator::new(self.sim_sensors(), self.seed)
    }

    fn sim_sensor(
        &self,
        sensor: Arc<dyn tracker_core::Sensor>,
        mounting_yaw: f64,
        lambda_clutter: f64,
    ) -> SimSensor {
        let mut s = SimSensor::new(sensor, mounting_yaw);
        s.p_detection = self.detection.p_detection;
        s.lambda_clutter = lambda_clutter;
        s.max_range = self.detection.max_range;
        s.refresh_rate = self.detection.refresh_rate;
        s
    }

    // -----------------------------------------------------------------------
    // Scenario 1: Single
    // -----------------------------------------------------------------------
    fn single(seed: u64) -> Self {
        let targets = vec![target(
            0,
            [15., 1., 0.8],
            [1., 0., 0.],
            MotionSpec::ConstantVelocity,
            None,
            None,
        )];

        Scenario {
            name: "single".into(),
            seed,
            duration: 20.0,
            sim_dt: 0.1,
            targets,
            lidar: roof_lidar(),
            camera: Some(front_camera()),
            detection: DetectionParams::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 2: Highway
    // -----------------------------------------------------------------------
    fn highway(seed: u64) -> Self {
        let targets = vec![
            target(0, [12., 0., 0.8], [1., 0., 0.], MotionSpec::ConstantVelocity, None, None),
            target(1, [25., -3.5, 0.8], [-0.5, 0., 0.], MotionSpec::ConstantVelocity, None, None),
            target(2, [18., 3.5, 0.8], [1.5, 0., 0.], MotionSpec::ConstantVelocity, None, Some(12.0)),
            // Overtakes from behind and merges into the ego lane
            target(
                3,
                [2., -3.5, 0.8],
                [3., 0.3, 0.],
                MotionSpec::ConstantAccel { ax: 0.0, ay: 0.02, az: 0.0 },
                Some(4.0),
                None,
            ),
        ];

        Scenario {
            name: "highway".into(),
            seed,
            duration: 25.0,
            sim_dt: 0.1,
            targets,
            lidar: roof_lidar(),
            camera: Some(front_camera()),
            detection: DetectionParams {
                lambda_clutter: 1.0,
                ..Default::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 3: Crossing
    // -----------------------------------------------------------------------
    fn crossing(seed: u64) -> Self {
        let targets = vec![
            target(0, [20., -10., 0.8], [0., 2.5, 0.], MotionSpec::ConstantVelocity, None, None),
            target(1, [24., 10., 0.8], [0., -2.5, 0.], MotionSpec::ConstantVelocity, None, None),
            target(
                2,
                [30., 0., 0.8],
                [-3., 0., 0.],
                MotionSpec::ConstantTurn { omega: 0.1 },
                Some(2.0),
                None,
            ),
        ];

        Scenario {
            name: "crossing".into(),
            seed,
            duration: 15.0,
            sim_dt: 0.1,
            targets,
            lidar: roof_lidar(),
            camera: Some(front_camera()),
            detection: DetectionParams {
                p_detection: 0.85,
                lambda_clutter: 0.5,
                ..Default::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Builder helpers
// ---------------------------------------------------------------------------

fn target(
    id: u64,
    pos: [f64; 3],
    vel: [f64; 3],
    motion: MotionSpec,
    appear_at: Option<f64>,
    disappear_at: Option<f64>,
) -> Target {
    Target {
        id,
        state: [pos[0], pos[1], pos[2], vel[0], vel[1], vel[2]],
        shape: Shape::new(1.9, 4.6, 1.6),
        motion,
        appear_at,
        disappear_at,
    }
}

/// Roof-mounted lidar facing forward.
fn roof_lidar() -> LidarParams {
    LidarParams {
        mounting: Mounting {
            translation: [1.43, 0.0, 1.73],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Windshield camera facing forward.
fn front_camera() -> CameraParams {
    CameraParams {
        mounting: Mounting {
            translation: [2.1, 0.0, 1.47],
            ..Default::default()
        },
        ..Default::default()
    }
}
