//! Pipeline orchestrator: one tracking cycle for one sensor batch.
//!
//! # Processing steps per batch
//! 1. Predict all live tracks one cycle forward (parallel, read-only per track)
//! 2. Build the gated association matrix (Mahalanobis distance, χ² gate)
//! 3. Pop the closest (track, measurement) pair until none is left:
//!    skip pairs where the track is outside the sensor's field of view,
//!    otherwise KF update + score/status bookkeeping
//! 4. Track management on whatever stayed unassociated: miss penalties,
//!    deletions, births

use crate::{
    association::{Association, AssociationConfig},
    error::TrackerResult,
    kf::{CvKalmanFilter, CvKfConfig},
    track::{Track, TrackStatus},
    track_manager::{DeletionReason, TrackManager, TrackManagerConfig},
    types::{Measurement, TrackId},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the tracking pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Motion model and geometry smoothing
    pub kf: CvKfConfig,
    /// Gating
    pub association: AssociationConfig,
    /// Track management policy
    pub track_manager: TrackManagerConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        self.kf.validate()?;
        self.track_manager.validate()?;
        crate::gating::chi2_quantile(self.association.gating_probability, 1)?;
        Ok(())
    }
}

/// Outputs of one cycle.
#[derive(Clone, Debug, Default)]
pub struct CycleOutput {
    /// Pairs that produced a KF update, in resolution order
    pub updates: Vec<(TrackId, usize)>,
    /// Resolved pairs whose track lay outside the sensor's field of view
    pub skipped: Vec<(TrackId, usize)>,
    /// Tracks left without a measurement
    pub unassigned_tracks: Vec<TrackId>,
    /// Measurement indices left without a track
    pub unassigned_measurements: Vec<usize>,
    /// Tracks that became confirmed during this cycle
    pub confirmations: Vec<TrackId>,
    /// Tracks born this cycle
    pub births: Vec<TrackId>,
    /// Tracks deleted this cycle
    pub deletions: Vec<(TrackId, DeletionReason)>,
    /// Wall-clock time of processing
    pub total_time_us: u64,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The main tracking pipeline. Holds the track pool and filter.
#[derive(Debug)]
pub struct Pipeline {
    kf: CvKalmanFilter,
    association: Association,
    track_manager: TrackManager,
}

impl Pipeline {
    /// Create a new pipeline.
    pub fn new(config: PipelineConfig) -> TrackerResult<Self> {
        config.validate()?;
        Ok(Self {
            kf: CvKalmanFilter::new(config.kf.clone())?,
            association: Association::new(&config.association)?,
            track_manager: TrackManager::new(config.track_manager.clone())?,
        })
    }

    /// All live tracks in creation order.
    pub fn tracks(&self) -> &[Track] {
        self.track_manager.tracks()
    }

    pub fn track_manager_mut(&mut self) -> &mut TrackManager {
        &mut self.track_manager
    }

    /// Predict every track one cycle forward and stamp it with `timestamp`.
    pub fn predict(&mut self, timestamp: f64) {
        let kf = &self.kf;
        self.track_manager
            .tracks_mut()
            .par_iter_mut()
            .for_each(|track| {
                kf.predict(track);
                track.timestamp = timestamp;
            });
    }

    /// Associate a batch against the current tracks, update the associated
    /// ones and run track management on the rest.
    pub fn associate_and_update(
        &mut self,
        measurements: &[Measurement],
    ) -> TrackerResult<CycleOutput> {
        let start = Instant::now();
        let mut out = CycleOutput::default();

        self.association
            .associate(&self.kf, self.track_manager.tracks(), measurements)?;

        while let Some((id, j)) = self.association.pop_closest() {
            let meas = &measurements[j];
            let Some(track) = self.track_manager.get_mut(id) else {
                continue;
            };
            if !meas.sensor.in_field_of_view(&track.state) {
                trace!(track = %id, meas = j, "associated track outside field of view");
                out.skipped.push((id, j));
                continue;
            }

            let prev_status = track.status;
            let innovation = self.kf.update(track, meas)?;
            debug!(
                track = %id,
                meas = j,
                sensor = meas.sensor.name(),
                innovation = innovation.norm(),
                "update track"
            );

            if self.track_manager.on_track_updated(id) == Some(TrackStatus::Confirmed)
                && prev_status != TrackStatus::Confirmed
            {
                out.confirmations.push(id);
            }
            out.updates.push((id, j));
        }

        out.unassigned_tracks = self.association.unassigned_tracks().to_vec();
        out.unassigned_measurements = self.association.unassigned_measurements().to_vec();

        let managed = self.track_manager.manage_tracks(
            &out.unassigned_tracks,
            &out.unassigned_measurements,
            measurements,
        )?;
        out.births = managed.born;
        out.deletions = managed.deleted;
        out.total_time_us = start.elapsed().as_micros() as u64;
        Ok(out)
    }

    /// Full cycle: predict to the batch time, then associate and update.
    pub fn process_batch(
        &mut self,
        measurements: &[Measurement],
        timestamp: f64,
    ) -> TrackerResult<CycleOutput> {
        self.predict(timestamp);
        self.associate_and_update(measurements)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity_lidar, lidar_measurement, planar_measurement, planar_sensor};
    use approx::assert_abs_diff_eq;

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn births_then_absorbs_measurements() {
        let mut p = pipeline();
        let lidar = identity_lidar();

        let batch = vec![
            lidar_measurement(&lidar, [10.0, 2.0, 0.0], 0.0),
            lidar_measurement(&lidar, [25.0, -4.0, 0.0], 0.0),
        ];
        let out = p.process_batch(&batch, 0.0).unwrap();
        assert_eq!(out.births.len(), 2, "Should birth 2 tracks");
        assert!(out.updates.is_empty());

        let batch = vec![
            lidar_measurement(&lidar, [25.0, -4.05, 0.0], 0.1),
            lidar_measurement(&lidar, [10.02, 2.0, 0.0], 0.1),
        ];
        let out = p.process_batch(&batch, 0.1).unwrap();
        assert!(out.births.is_empty(), "Existing tracks should absorb measurements");
        assert_eq!(out.updates.len(), 2);
        assert!(out.updates.contains(&(TrackId(0), 1)));
        assert!(out.updates.contains(&(TrackId(1), 0)));
        assert!(p.tracks().iter().all(|t| t.status == TrackStatus::Tentative));
    }

    #[test]
    fn steady_target_gets_confirmed() {
        let mut p = pipeline();
        let lidar = identity_lidar();
        let mut confirmed_at = None;
        for k in 0..8 {
            let t = k as f64 * 0.1;
            let batch = vec![lidar_measurement(&lidar, [15.0 + t, 1.0, 0.0], t)];
            let out = p.process_batch(&batch, t).unwrap();
            if !out.confirmations.is_empty() {
                confirmed_at.get_or_insert(k);
            }
        }
        assert_eq!(p.tracks().len(), 1);
        let track = &p.tracks()[0];
        assert_eq!(track.status, TrackStatus::Confirmed);
        assert_abs_diff_eq!(track.score, 1.0, epsilon = 1e-9);
        // Born at 1/6, needs 0.8: four updates (cycles 1..=4).
        assert_eq!(confirmed_at, Some(4));
        assert!(track.cov[(0, 0)] < 0.1);
    }

    #[test]
    fn unobserved_track_fades_out() {
        let mut p = pipeline();
        let lidar = identity_lidar();
        p.process_batch(&[lidar_measurement(&lidar, [20.0, 0.0, 0.0], 0.0)], 0.0)
            .unwrap();
        assert_eq!(p.tracks().len(), 1);

        // Only a far-away measurement: the track stays unassociated but visible.
        let mut deleted = false;
        for k in 1..4 {
            let t = k as f64 * 0.1;
            let far = lidar_measurement(&lidar, [60.0, 30.0, 0.0], t);
            let out = p.process_batch(&[far], t).unwrap();
            if out.deletions.iter().any(|(id, _)| *id == TrackId(0)) {
                deleted = true;
                break;
            }
            assert_eq!(out.unassigned_tracks.first(), Some(&TrackId(0)));
        }
        assert!(deleted);
        assert!(p.tracks().iter().all(|t| t.id != TrackId(0)));
    }

    #[test]
    fn out_of_view_pair_is_skipped_not_updated() {
        let mut p = pipeline();
        let lidar = identity_lidar();
        p.process_batch(&[lidar_measurement(&lidar, [20.0, 0.0, 0.0], 0.0)], 0.0)
            .unwrap();
        // Move the track behind the sensor, then feed a measurement at the same spot.
        p.track_manager_mut().tracks_mut()[0].state[0] = -20.0;
        let before = p.tracks()[0].clone();

        let out = p
            .associate_and_update(&[lidar_measurement(&lidar, [-20.0, 0.0, 0.0], 0.1)])
            .unwrap();
        assert_eq!(out.skipped, vec![(TrackId(0), 0)]);
        assert!(out.updates.is_empty());
        assert!(out.births.is_empty());
        assert!(out.unassigned_measurements.is_empty());
        let after = &p.tracks()[0];
        assert_eq!(after.state, before.state);
        assert_abs_diff_eq!(after.score, before.score);
    }

    #[test]
    fn secondary_sensor_updates_but_never_births() {
        let mut p = pipeline();
        let lidar = identity_lidar();
        let planar = planar_sensor();
        p.process_batch(&[lidar_measurement(&lidar, [12.0, 3.0, 0.0], 0.0)], 0.0)
            .unwrap();

        let batch = vec![
            planar_measurement(&planar, [12.1, 3.0], 0.1),
            planar_measurement(&planar, [40.0, -9.0], 0.1),
        ];
        let out = p.process_batch(&batch, 0.1).unwrap();
        assert_eq!(out.updates, vec![(TrackId(0), 0)]);
        assert_eq!(out.unassigned_measurements, vec![1]);
        assert!(out.births.is_empty());
        assert_eq!(p.tracks().len(), 1);
    }

    #[test]
    fn covariance_stays_symmetric_over_cycles() {
        let mut p = pipeline();
        let lidar = identity_lidar();
        for k in 0..20 {
            let t = k as f64 * 0.1;
            let batch = vec![lidar_measurement(&lidar, [10.0 + 2.0 * t, 0.5 * t, 0.0], t)];
            p.process_batch(&batch, t).unwrap();
            for track in p.tracks() {
                assert_abs_diff_eq!(track.cov, track.cov.transpose(), epsilon = 1e-9);
                assert!(track.score <= 1.0);
            }
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = PipelineConfig {
            association: AssociationConfig {
                gating_probability: 1.5,
            },
            ..Default::default()
        };
        assert!(Pipeline::new(cfg).is_err());
    }
}
