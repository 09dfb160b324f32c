//! Track lifecycle management: birth, score-based confirmation, deletion.
//!
//! # Track Management Policy
//! - **Birth**: each unassociated measurement from a geometry-contributing
//!   sensor spawns an `Initialized` track with score = one increment.
//! - **Update**: an associated track gains one increment (capped at 1.0),
//!   becomes `Tentative`, and `Confirmed` once the score reaches the
//!   confirmation threshold.
//! - **Miss**: an unassociated track that the sensor could have seen loses
//!   one increment.
//! - **Deletion**: confirmed tracks below the deletion threshold, any track
//!   whose x/y position variance exceeds the limit, any track with a
//!   negative score.

use crate::{
    error::{TrackerError, TrackerResult},
    track::{Track, TrackStatus},
    types::{Measurement, TrackId},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for track management policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackManagerConfig {
    /// Score gained per update and lost per miss
    pub score_increment: f64,
    /// Score at or above which a track becomes confirmed
    pub confirmed_threshold: f64,
    /// Confirmed tracks scoring below this are deleted
    pub delete_threshold: f64,
    /// Tracks whose larger x/y position variance exceeds this are deleted (m²)
    pub max_position_variance: f64,
    /// Initial velocity uncertainty per axis (1σ in m/s)
    pub init_velocity_std: [f64; 3],
}

impl Default for TrackManagerConfig {
    fn default() -> Self {
        Self {
            score_increment: 1.0 / 6.0,
            confirmed_threshold: 0.8,
            delete_threshold: 0.6,
            max_position_variance: 3.0 * 3.0,
            init_velocity_std: [50.0, 50.0, 5.0],
        }
    }
}

impl TrackManagerConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        if !(self.score_increment > 0.0 && self.score_increment <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "score increment must lie in (0, 1], got {}",
                self.score_increment
            )));
        }
        if self.max_position_variance.is_nan() || self.max_position_variance <= 0.0 {
            return Err(TrackerError::InvalidConfig(format!(
                "maximum position variance must be positive, got {}",
                self.max_position_variance
            )));
        }
        if self.init_velocity_std.iter().any(|s| s.is_nan() || *s < 0.0) {
            return Err(TrackerError::InvalidConfig(
                "initial velocity std must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Why a track was removed from the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionReason {
    /// Confirmed and score fell below the deletion threshold
    LowScore,
    /// Position uncertainty grew beyond the limit
    Uncertainty,
    /// Score went negative
    NegativeScore,
}

/// What one `manage_tracks` call changed.
#[derive(Clone, Debug, Default)]
pub struct ManageOutcome {
    /// Tracks that lost score because they were visible but unassociated
    pub missed: Vec<TrackId>,
    pub deleted: Vec<(TrackId, DeletionReason)>,
    pub born: Vec<TrackId>,
}

/// Owns the authoritative track collection.
#[derive(Debug)]
pub struct TrackManager {
    config: TrackManagerConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl TrackManager {
    pub fn new(config: TrackManagerConfig) -> TrackerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
        })
    }

    /// All live tracks in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Score and status bookkeeping for a track that just received an update.
    /// Returns the new status, or `None` if no such track exists.
    pub fn on_track_updated(&mut self, id: TrackId) -> Option<TrackStatus> {
        let config = &self.config;
        let track = self.tracks.iter_mut().find(|t| t.id == id)?;
        apply_hit(config, track);
        Some(track.status)
    }

    /// Spawn a track from a measurement and append it to the collection.
    pub fn init_track(&mut self, meas: &Measurement) -> TrackerResult<TrackId> {
        let track = Track::from_measurement(
            TrackId(self.next_id),
            meas,
            self.config.init_velocity_std,
            self.config.score_increment,
        )?;
        let id = self.next_track_id();
        debug!(
            track = %id,
            sensor = meas.sensor.name(),
            x = track.state[0],
            y = track.state[1],
            "creating track"
        );
        self.tracks.push(track);
        Ok(id)
    }

    /// End-of-cycle management: penalise visible unassociated tracks, delete
    /// tracks that fail the policy, spawn tracks from unassociated
    /// measurements of geometry-contributing sensors.
    pub fn manage_tracks(
        &mut self,
        unassigned_tracks: &[TrackId],
        unassigned_meas: &[usize],
        measurements: &[Measurement],
    ) -> TrackerResult<ManageOutcome> {
        let mut outcome = ManageOutcome::default();

        // The first measurement's sensor decides visibility for the whole batch.
        if let Some(oracle) = measurements.first().map(|m| &m.sensor) {
            for id in unassigned_tracks {
                if let Some(track) = self.tracks.iter_mut().find(|t| t.id == *id) {
                    if oracle.in_field_of_view(&track.state) {
                        track.score -= self.config.score_increment;
                        outcome.missed.push(track.id);
                    }
                }
            }
        }

        let config = &self.config;
        self.tracks.retain(|track| match deletion_reason(config, track) {
            Some(reason) => {
                info!(track = %track.id, ?reason, score = track.score, "deleting track");
                outcome.deleted.push((track.id, reason));
                false
            }
            None => true,
        });

        for &j in unassigned_meas {
            let meas = measurements.get(j).ok_or_else(|| {
                TrackerError::length("unassociated measurement index", measurements.len(), j)
            })?;
            if meas.sensor.contributes_geometry() {
                outcome.born.push(self.init_track(meas)?);
            }
        }

        Ok(outcome)
    }
}

fn apply_hit(config: &TrackManagerConfig, track: &mut Track) {
    track.score = (track.score + config.score_increment).min(1.0);
    track.promote(TrackStatus::Tentative);
    if track.score >= config.confirmed_threshold {
        track.promote(TrackStatus::Confirmed);
    }
}

fn deletion_reason(config: &TrackManagerConfig, track: &Track) -> Option<DeletionReason> {
    if track.status == TrackStatus::Confirmed && track.score < config.delete_threshold {
        Some(DeletionReason::LowScore)
    } else if track.max_position_variance() > config.max_position_variance {
        Some(DeletionReason::Uncertainty)
    } else if track.score < 0.0 {
        Some(DeletionReason::NegativeScore)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity_lidar, lidar_measurement, planar_measurement, planar_sensor};
    use crate::types::{StateCov, StateVec};
    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector3, Vector6};

    fn manager(config: TrackManagerConfig) -> TrackManager {
        TrackManager::new(config).unwrap()
    }

    fn push(mgr: &mut TrackManager, state: StateVec, cov: StateCov, score: f64) -> TrackId {
        let id = mgr.next_track_id();
        mgr.tracks.push(Track::new(id, state, cov, score, 0.0));
        id
    }

    fn ahead_of_sensor(x: f64) -> StateVec {
        Vector6::new(x, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn update_confirms_above_threshold() {
        let mut mgr = manager(TrackManagerConfig {
            score_increment: 0.1,
            confirmed_threshold: 0.5,
            ..Default::default()
        });
        let id = push(&mut mgr, StateVec::zeros(), StateCov::identity(), 0.6);
        assert_eq!(mgr.on_track_updated(id), Some(TrackStatus::Confirmed));
        let track = mgr.get(id).unwrap();
        assert_abs_diff_eq!(track.score, 0.7, epsilon = 1e-12);
        assert_eq!(track.status, TrackStatus::Confirmed);
    }

    #[test]
    fn first_update_makes_tentative_and_score_is_capped() {
        let mut mgr = manager(TrackManagerConfig {
            score_increment: 0.3,
            confirmed_threshold: 0.95,
            ..Default::default()
        });
        let id = push(&mut mgr, StateVec::zeros(), StateCov::identity(), 0.3);
        assert_eq!(mgr.on_track_updated(id), Some(TrackStatus::Tentative));
        for _ in 0..5 {
            mgr.on_track_updated(id);
            assert!(mgr.get(id).unwrap().score <= 1.0);
        }
        let track = mgr.get(id).unwrap();
        assert_abs_diff_eq!(track.score, 1.0);
        assert_eq!(track.status, TrackStatus::Confirmed);
    }

    #[test]
    fn confirmed_track_does_not_regress_when_score_drops() {
        let mut mgr = manager(TrackManagerConfig {
            score_increment: 0.1,
            confirmed_threshold: 0.5,
            delete_threshold: 0.2,
            ..Default::default()
        });
        let id = push(&mut mgr, ahead_of_sensor(5.0), StateCov::identity(), 0.5);
        assert_eq!(mgr.on_track_updated(id), Some(TrackStatus::Confirmed));

        let lidar = identity_lidar();
        let meas = vec![lidar_measurement(&lidar, [40.0, 0.0, 0.0], 0.0)];
        let out = mgr.manage_tracks(&[id], &[], &meas).unwrap();
        assert_eq!(out.missed, vec![id]);
        let track = mgr.get(id).unwrap();
        assert_abs_diff_eq!(track.score, 0.5, epsilon = 1e-12);
        assert_eq!(track.status, TrackStatus::Confirmed);
    }

    #[test]
    fn unknown_track_update_is_none() {
        let mut mgr = manager(TrackManagerConfig::default());
        assert_eq!(mgr.on_track_updated(TrackId(42)), None);
    }

    #[test]
    fn deletion_by_uncertainty() {
        let mut mgr = manager(TrackManagerConfig {
            max_position_variance: 5.0,
            ..Default::default()
        });
        let mut cov = StateCov::identity();
        cov[(0, 0)] = 10.0;
        let id = push(&mut mgr, StateVec::zeros(), cov, 1.0);
        let out = mgr.manage_tracks(&[], &[], &[]).unwrap();
        assert!(mgr.get(id).is_none());
        assert_eq!(out.deleted, vec![(id, DeletionReason::Uncertainty)]);
    }

    #[test]
    fn deletion_of_confirmed_low_score_and_negative_score() {
        let mut mgr = manager(TrackManagerConfig::default());
        let low = push(&mut mgr, StateVec::zeros(), StateCov::identity(), 0.5);
        mgr.get_mut(low).unwrap().status = TrackStatus::Confirmed;
        let tentative = push(&mut mgr, StateVec::zeros(), StateCov::identity(), 0.5);
        mgr.get_mut(tentative).unwrap().status = TrackStatus::Tentative;
        let negative = push(&mut mgr, StateVec::zeros(), StateCov::identity(), -0.01);

        let out = mgr.manage_tracks(&[], &[], &[]).unwrap();
        assert_eq!(
            out.deleted,
            vec![
                (low, DeletionReason::LowScore),
                (negative, DeletionReason::NegativeScore)
            ]
        );
        assert_eq!(mgr.tracks().len(), 1);
        assert!(mgr.get(tentative).is_some());
    }

    #[test]
    fn miss_only_counts_inside_field_of_view() {
        let mut mgr = manager(TrackManagerConfig::default());
        let ahead = push(&mut mgr, ahead_of_sensor(10.0), StateCov::identity(), 0.5);
        let behind = push(&mut mgr, ahead_of_sensor(-10.0), StateCov::identity(), 0.5);

        let lidar = identity_lidar();
        let meas = vec![lidar_measurement(&lidar, [30.0, 1.0, 0.0], 0.0)];
        let out = mgr.manage_tracks(&[ahead, behind], &[], &meas).unwrap();
        assert_eq!(out.missed, vec![ahead]);
        assert_abs_diff_eq!(mgr.get(ahead).unwrap().score, 0.5 - 1.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mgr.get(behind).unwrap().score, 0.5);
    }

    #[test]
    fn no_measurements_means_no_miss_penalty() {
        let mut mgr = manager(TrackManagerConfig::default());
        let id = push(&mut mgr, ahead_of_sensor(10.0), StateCov::identity(), 0.1);
        let out = mgr.manage_tracks(&[id], &[], &[]).unwrap();
        assert!(out.missed.is_empty());
        assert_abs_diff_eq!(mgr.get(id).unwrap().score, 0.1);
    }

    #[test]
    fn new_track_from_unassociated_lidar_measurement() {
        let mut mgr = manager(TrackManagerConfig::default());
        let lidar = identity_lidar();
        let meas = vec![lidar_measurement(&lidar, [1.0, 2.0, 3.0], 0.0)];
        let out = mgr.manage_tracks(&[], &[0], &meas).unwrap();
        assert_eq!(out.born.len(), 1);

        let track = mgr.get(out.born[0]).unwrap();
        assert_abs_diff_eq!(track.position(), Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
        assert_abs_diff_eq!(track.velocity(), Vector3::zeros());
        assert_eq!(track.status, TrackStatus::Initialized);
        assert_abs_diff_eq!(track.score, 1.0 / 6.0);
    }

    #[test]
    fn non_geometry_sensor_never_spawns() {
        let mut mgr = manager(TrackManagerConfig::default());
        let planar = planar_sensor();
        let meas = vec![planar_measurement(&planar, [5.0, 1.0], 0.0)];
        let out = mgr.manage_tracks(&[], &[0], &meas).unwrap();
        assert!(out.born.is_empty());
        assert!(mgr.tracks().is_empty());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut mgr = manager(TrackManagerConfig::default());
        let lidar = identity_lidar();
        let mut seen = Vec::new();
        for round in 0..4 {
            let meas = vec![
                lidar_measurement(&lidar, [10.0 + round as f64, 0.0, 0.0], 0.0),
                lidar_measurement(&lidar, [20.0, 5.0, 0.0], 0.0),
            ];
            let out = mgr.manage_tracks(&[], &[0, 1], &meas).unwrap();
            seen.extend(out.born);
            // Drop everything; a negative score is deleted on the next pass.
            for t in mgr.tracks_mut() {
                t.score = -1.0;
            }
            mgr.manage_tracks(&[], &[], &[]).unwrap();
            assert!(mgr.tracks().is_empty());
        }
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len());
        assert_eq!(seen.last(), Some(&TrackId(7)));
    }

    #[test]
    fn out_of_range_measurement_index_is_an_error() {
        let mut mgr = manager(TrackManagerConfig::default());
        assert!(matches!(
            mgr.manage_tracks(&[], &[3], &[]),
            Err(TrackerError::DimensionMismatch { .. })
        ));
    }
}
