//! `sensor_models` — Lidar and camera measurement models, mounting calibration, Jacobians.

pub mod calibration;
pub mod camera;
pub mod lidar;

pub use calibration::{Calibration, FieldOfView, Mounting};
pub use camera::{Camera, CameraParams};
pub use lidar::{Lidar, LidarParams};
