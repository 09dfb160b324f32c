//! Tracking metrics: RMSE position/velocity, precision/recall of confirmed tracks.

use crate::track::{Track, TrackStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ground-truth state of one object at a given time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundTruth {
    /// True object ID (from simulator)
    pub target_id: u64,
    pub time: f64,
    /// [px, py, pz, vx, vy, vz] in vehicle coordinates
    pub state: [f64; 6],
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    /// Number of frames evaluated
    pub n_frames: u64,
    /// Total number of matched (track, object) pairs evaluated
    pub n_matched: u64,
    /// Sum of squared position errors (for RMSE)
    pub sum_sq_pos_err: f64,
    /// Sum of squared velocity errors (for RMSE)
    pub sum_sq_vel_err: f64,
    /// Confirmed tracks within the match radius of an object
    pub true_positives: u64,
    /// Confirmed tracks with no object nearby
    pub false_positives: u64,
    /// Objects without a confirmed track nearby
    pub false_negatives: u64,
}

impl TrackingMetrics {
    /// Root-mean-square position error (meters, 3D).
    pub fn rmse_position(&self) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        (self.sum_sq_pos_err / self.n_matched as f64).sqrt()
    }

    /// Root-mean-square velocity error (m/s, 3D).
    pub fn rmse_velocity(&self) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        (self.sum_sq_vel_err / self.n_matched as f64).sqrt()
    }

    /// Precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = (self.true_positives + self.false_positives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Recall = TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = (self.true_positives + self.false_negatives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Accumulate one frame: every confirmed track is matched to the nearest
    /// object within `max_distance` meters.
    pub fn accumulate(&mut self, tracks: &[Track], ground_truths: &[GroundTruth], max_distance: f64) {
        self.n_frames += 1;
        let mut matched_targets = HashSet::new();

        for track in tracks.iter().filter(|t| t.status == TrackStatus::Confirmed) {
            let nearest = ground_truths
                .iter()
                .map(|gt| (gt, sq_dist(&track.state.as_slice()[..3], &gt.state[..3])))
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match nearest {
                Some((gt, d2)) if d2.sqrt() <= max_distance => {
                    self.sum_sq_pos_err += d2;
                    self.sum_sq_vel_err += sq_dist(&track.state.as_slice()[3..], &gt.state[3..]);
                    self.n_matched += 1;
                    self.true_positives += 1;
                    matched_targets.insert(gt.target_id);
                }
                _ => self.false_positives += 1,
            }
        }

        self.false_negatives += ground_truths
            .iter()
            .filter(|g| !matched_targets.contains(&g.target_id))
            .count() as u64;
    }
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
