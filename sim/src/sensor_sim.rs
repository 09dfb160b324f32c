//! Measurement simulator.
//!
//! Generates timestamped per-sensor batches with:
//! - Gaussian noise drawn from each sensor's own noise covariance
//! - Miss probability (1 - P_D)
//! - Poisson clutter (false alarms) inside the field of view
//!
//! Observations are produced through the sensor's measurement function, so
//! lidar batches are sensor-frame positions and camera batches are pixels.

use crate::target::Target;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Normal, StandardNormal};
use std::sync::Arc;
use tracker_core::{DVec, Measurement, Sensor, Shape, StateVec, TrackerResult};

/// Relative noise applied to simulated box extents.
const SHAPE_NOISE: f64 = 0.05;

/// One configured sensor in the simulation.
#[derive(Clone, Debug)]
pub struct SimSensor {
    pub sensor: Arc<dyn Sensor>,
    /// Mounting yaw, used to express object headings in the sensor frame
    pub mounting_yaw: f64,
    /// Probability of detection per target per scan
    pub p_detection: f64,
    /// Mean number of clutter returns per scan
    pub lambda_clutter: f64,
    /// Maximum detection range (meters)
    pub max_range: f64,
    /// Update rate (Hz)
    pub refresh_rate: f64,
    /// Next scheduled scan time
    pub next_scan_time: f64,
}

impl SimSensor {
    pub fn new(sensor: Arc<dyn Sensor>, mounting_yaw: f64) -> Self {
        Self {
            sensor,
            mounting_yaw,
            p_detection: 0.9,
            lambda_clutter: 0.0,
            max_range: 50.0,
            refresh_rate: 10.0,
            next_scan_time: 0.0,
        }
    }

    /// Check if this sensor should fire at the current simulation time.
    pub fn should_scan(&self, t: f64) -> bool {
        // Half a microsecond of slack so accumulated float steps do not skip scans.
        t + 5e-7 >= self.next_scan_time
    }

    /// Advance the schedule by one scan interval.
    pub fn advance_schedule(&mut self) {
        self.next_scan_time += 1.0 / self.refresh_rate;
    }
}

/// All measurements of one sensor scan.
#[derive(Clone, Debug)]
pub struct SensorBatch {
    pub sensor_name: String,
    pub time: f64,
    pub measurements: Vec<Measurement>,
}

/// Generates measurement batches from a set of targets.
pub struct MeasurementSimulator {
    pub sensors: Vec<SimSensor>,
    rng: ChaCha8Rng,
}

impl MeasurementSimulator {
    pub fn new(sensors: Vec<SimSensor>, seed: u64) -> Self {
        Self {
            sensors,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generate all batches that should fire at `sim_time`, in sensor order.
    pub fn generate_batches(
        &mut self,
        targets: &[Target],
        sim_time: f64,
    ) -> TrackerResult<Vec<SensorBatch>> {
        let mut batches = Vec::new();

        for sim_sensor in &mut self.sensors {
            if !sim_sensor.should_scan(sim_time) {
                continue;
            }
            sim_sensor.advance_schedule();
            let sensor = &sim_sensor.sensor;
            let mut measurements = Vec::new();

            // True detections
            for target in targets {
                if !target.is_active(sim_time) {
                    continue;
                }
                let state = StateVec::from_column_slice(&target.state);
                let range = (state[0] * state[0] + state[1] * state[1]).sqrt();
                if range > sim_sensor.max_range || !sensor.in_field_of_view(&state) {
                    continue;
                }
                // Miss detection?
                if self.rng.gen::<f64>() > sim_sensor.p_detection {
                    continue;
                }

                let z = noisy_observation(&mut self.rng, sensor.as_ref(), &state)?;
                let shape = Shape::new(
                    jitter(&mut self.rng, target.shape.width),
                    jitter(&mut self.rng, target.shape.length),
                    jitter(&mut self.rng, target.shape.height),
                );
                let yaw = target.yaw() - sim_sensor.mounting_yaw;
                measurements.push(
                    Measurement::new(Arc::clone(sensor), z, sim_time)?.with_geometry(shape, yaw),
                );
            }

            // Clutter (Poisson), placed uniformly in the visible half-plane.
            let n_clutter = poisson(&mut self.rng, sim_sensor.lambda_clutter);
            for _ in 0..n_clutter {
                let max_range = sim_sensor.max_range;
                let candidate = (0..20).find_map(|_| {
                    let x = self.rng.gen::<f64>() * max_range;
                    let y = (self.rng.gen::<f64>() - 0.5) * max_range;
                    let state = StateVec::new(x, y, 0.5, 0.0, 0.0, 0.0);
                    sensor.in_field_of_view(&state).then_some(state)
                });
                if let Some(state) = candidate {
                    let z = noisy_observation(&mut self.rng, sensor.as_ref(), &state)?;
                    let shape = Shape::new(0.5, 0.5, 0.5);
                    measurements.push(
                        Measurement::new(Arc::clone(sensor), z, sim_time)?.with_geometry(shape, 0.0),
                    );
                }
            }

            batches.push(SensorBatch {
                sensor_name: sensor.name().to_string(),
                time: sim_time,
                measurements,
            });
        }

        Ok(batches)
    }
}

/// h(x) plus zero-mean noise with the sensor's diagonal variances.
fn noisy_observation(
    rng: &mut ChaCha8Rng,
    sensor: &dyn Sensor,
    state: &StateVec,
) -> TrackerResult<DVec> {
    let mut z = sensor.measurement_function(state)?;
    let r = sensor.noise_covariance();
    for i in 0..z.len() {
        let n: f64 = rng.sample(StandardNormal);
        z[i] += r[(i, i)].max(0.0).sqrt() * n;
    }
    Ok(z)
}

fn jitter(rng: &mut ChaCha8Rng, value: f64) -> f64 {
    match Normal::new(value, value * SHAPE_NOISE) {
        Ok(dist) => dist.sample(rng).max(0.0),
        Err(_) => value,
    }
}

/// Knuth's multiplication method; fine for the small rates used here.
fn poisson(rng: &mut ChaCha8Rng, lambda: f64) -> usize {
    if lambda <= 0.0 {
        return 0;
    }
    let threshold = (-lambda).exp();
    let mut n = 0usize;
    let mut prod = rng.gen::<f64>();
    while prod > threshold && n < 50 {
        prod *= rng.gen::<f64>();
        n += 1;
    }
    n
}
