//! `sim` — Scenario simulator: object trajectories, lidar and camera measurements.

pub mod scenarios;
pub mod sensor_sim;
pub mod target;

pub use scenarios::{Scenario, ScenarioKind};
pub use sensor_sim::{MeasurementSimulator, SensorBatch, SimSensor};
pub use target::{MotionSpec, Target};
