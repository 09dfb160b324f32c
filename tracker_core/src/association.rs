//! Data association: gated association matrix and greedy single
//! nearest-neighbour resolution.
//!
//! # Algorithm
//! 1. Fill a |tracks| × |measurements| matrix with the squared Mahalanobis
//!    distance of every pair that passes the χ² gate; every other cell holds
//!    [`NO_ASSOCIATION`]. Rows are independent and computed in parallel.
//! 2. [`Association::pop_closest`] repeatedly takes the global minimum,
//!    removes its row and column and reports the pair, until only the
//!    sentinel remains.
//!
//! This is greedy nearest-neighbour resolution, not an optimal assignment.
//! Each pop rescans the remaining matrix, so a full pass is O(n·m·min(n, m)).

use crate::{
    error::{TrackerError, TrackerResult},
    gating::ChiSquareGate,
    kf::CvKalmanFilter,
    track::Track,
    types::{DMat, Measurement, TrackId},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Matrix cell value for a pair outside the gate.
pub const NO_ASSOCIATION: f64 = f64::INFINITY;

/// Configuration for gating and association.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Probability mass of the χ² gate
    pub gating_probability: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            gating_probability: 0.995,
        }
    }
}

/// Per-cycle association state.
///
/// Row `i` of the matrix always belongs to `unassigned_tracks[i]` and column
/// `j` to `unassigned_meas[j]`; resolving a pair shrinks all three together.
#[derive(Clone, Debug)]
pub struct Association {
    gate: ChiSquareGate,
    matrix: DMat,
    unassigned_tracks: Vec<TrackId>,
    unassigned_meas: Vec<usize>,
}

impl Association {
    pub fn new(config: &AssociationConfig) -> TrackerResult<Self> {
        Ok(Self {
            gate: ChiSquareGate::new(config.gating_probability)?,
            matrix: DMat::zeros(0, 0),
            unassigned_tracks: Vec::new(),
            unassigned_meas: Vec::new(),
        })
    }

    /// Build the gated distance matrix for this cycle and reset the
    /// unassociated sets to every track and every measurement.
    pub fn associate(
        &mut self,
        kf: &CvKalmanFilter,
        tracks: &[Track],
        measurements: &[Measurement],
    ) -> TrackerResult<()> {
        let gate = &self.gate;
        let rows: Vec<Vec<f64>> = tracks
            .par_iter()
            .map(|track| {
                measurements
                    .iter()
                    .map(|meas| {
                        let d2 = kf.mahalanobis(track, meas)?;
                        let inside = gate.accepts(d2, meas.sensor.measurement_dim())?;
                        Ok(if inside { d2 } else { NO_ASSOCIATION })
                    })
                    .collect::<TrackerResult<Vec<f64>>>()
            })
            .collect::<TrackerResult<_>>()?;

        self.matrix = DMat::from_fn(tracks.len(), measurements.len(), |i, j| rows[i][j]);
        self.unassigned_tracks = tracks.iter().map(|t| t.id).collect();
        self.unassigned_meas = (0..measurements.len()).collect();
        Ok(())
    }

    /// Install a precomputed distance matrix, one row per entry of `track_ids`.
    pub fn load_matrix(&mut self, matrix: DMat, track_ids: Vec<TrackId>) -> TrackerResult<()> {
        if matrix.nrows() != track_ids.len() {
            return Err(TrackerError::length(
                "association matrix rows",
                track_ids.len(),
                matrix.nrows(),
            ));
        }
        self.unassigned_meas = (0..matrix.ncols()).collect();
        self.unassigned_tracks = track_ids;
        self.matrix = matrix;
        Ok(())
    }

    /// Take the closest remaining (track, measurement index) pair.
    ///
    /// Returns `None` once no finite entry is left. Ties resolve to the first
    /// minimum in row-major order.
    pub fn pop_closest(&mut self) -> Option<(TrackId, usize)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..self.matrix.nrows() {
            for j in 0..self.matrix.ncols() {
                let d = self.matrix[(i, j)];
                if d < best.map_or(NO_ASSOCIATION, |b| b.2) {
                    best = Some((i, j, d));
                }
            }
        }
        let (row, col, _) = best?;

        let matrix = std::mem::replace(&mut self.matrix, DMat::zeros(0, 0));
        self.matrix = matrix.remove_row(row).remove_column(col);
        let track = self.unassigned_tracks.remove(row);
        let meas = self.unassigned_meas.remove(col);
        Some((track, meas))
    }

    /// Remaining distance matrix.
    pub fn matrix(&self) -> &DMat {
        &self.matrix
    }

    pub fn unassigned_tracks(&self) -> &[TrackId] {
        &self.unassigned_tracks
    }

    pub fn unassigned_measurements(&self) -> &[usize] {
        &self.unassigned_meas
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kf::CvKfConfig;
    use crate::testing::{identity_lidar, lidar_measurement};
    use crate::types::StateCov;
    use nalgebra::Vector6;

    const INF: f64 = NO_ASSOCIATION;

    fn assoc() -> Association {
        Association::new(&AssociationConfig::default()).unwrap()
    }

    fn ids(n: u64) -> Vec<TrackId> {
        (0..n).map(TrackId).collect()
    }

    #[test]
    fn no_finite_entries_pops_nothing() {
        let mut a = assoc();
        a.load_matrix(DMat::from_element(2, 3, INF), ids(2)).unwrap();
        assert_eq!(a.pop_closest(), None);
        assert_eq!(a.unassigned_tracks(), &ids(2)[..]);
        assert_eq!(a.unassigned_measurements(), &[0, 1, 2]);
    }

    #[test]
    fn greedy_resolution_order() {
        let mut a = assoc();
        #[rustfmt::skip]
        let m = DMat::from_row_slice(3, 3, &[
            1.0, 5.0, INF,
            2.0, 0.5, INF,
            INF, INF, INF,
        ]);
        a.load_matrix(m, ids(3)).unwrap();

        assert_eq!(a.pop_closest(), Some((TrackId(1), 1)));
        assert_eq!(a.matrix().shape(), (2, 2));
        assert_eq!(a.pop_closest(), Some((TrackId(0), 0)));
        assert_eq!(a.matrix().shape(), (1, 1));
        assert_eq!(a.pop_closest(), None);
        assert_eq!(a.unassigned_tracks(), &[TrackId(2)]);
        assert_eq!(a.unassigned_measurements(), &[2]);
    }

    #[test]
    fn greedy_is_not_optimal_but_deterministic() {
        // Optimal would pair (0,1) and (1,0) with total 4; greedy takes 1 first.
        let m = DMat::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 9.0]);
        let run = || {
            let mut a = assoc();
            a.load_matrix(m.clone(), ids(2)).unwrap();
            std::iter::from_fn(|| a.pop_closest()).collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first, vec![(TrackId(0), 0), (TrackId(1), 1)]);
        assert_eq!(first, run());
    }

    #[test]
    fn ties_resolve_row_major() {
        let mut a = assoc();
        a.load_matrix(DMat::from_element(2, 2, 3.0), ids(2)).unwrap();
        assert_eq!(a.pop_closest(), Some((TrackId(0), 0)));
        assert_eq!(a.pop_closest(), Some((TrackId(1), 1)));
    }

    #[test]
    fn load_matrix_checks_rows() {
        let mut a = assoc();
        assert!(a.load_matrix(DMat::zeros(2, 2), ids(3)).is_err());
    }

    #[test]
    fn associate_gates_tracks_against_measurements() {
        let kf = CvKalmanFilter::new(CvKfConfig::default()).unwrap();
        let lidar = identity_lidar();
        let tracks = vec![
            Track::new(
                TrackId(4),
                Vector6::new(10.0, 0.0, 0.0, 0.0, 0.0, 0.0),
                StateCov::identity() * 0.25,
                0.5,
                0.0,
            ),
            Track::new(
                TrackId(9),
                Vector6::new(20.0, 5.0, 0.0, 0.0, 0.0, 0.0),
                StateCov::identity() * 0.25,
                0.5,
                0.0,
            ),
        ];
        let meas = vec![
            lidar_measurement(&lidar, [20.2, 5.1, 0.0], 0.0),
            lidar_measurement(&lidar, [50.0, -3.0, 0.0], 0.0),
            lidar_measurement(&lidar, [10.1, 0.0, 0.0], 0.0),
        ];

        let mut a = assoc();
        a.associate(&kf, &tracks, &meas).unwrap();
        assert_eq!(a.matrix().shape(), (2, 3));
        assert!(a.matrix()[(0, 1)].is_infinite());
        assert!(a.matrix()[(0, 2)].is_finite());

        let pairs: Vec<_> = std::iter::from_fn(|| a.pop_closest()).collect();
        assert_eq!(pairs, vec![(TrackId(4), 2), (TrackId(9), 0)]);
        assert!(a.unassigned_tracks().is_empty());
        assert_eq!(a.unassigned_measurements(), &[1]);
    }

    #[test]
    fn point_inside_and_outside_gate() {
        let kf = CvKalmanFilter::new(CvKfConfig::default()).unwrap();
        let lidar = identity_lidar();
        // Zero state covariance: S = R = 0.01·I, so d² = 100·|γ|².
        let tracks = vec![Track::new(
            TrackId(0),
            Vector6::new(10.0, 10.0, 0.0, 0.0, 0.0, 0.0),
            StateCov::zeros(),
            0.5,
            0.0,
        )];
        let offset = |d2: f64| (d2 / 100.0).sqrt();
        let meas = vec![
            lidar_measurement(&lidar, [10.0, 10.0, 0.0], 0.0),
            lidar_measurement(&lidar, [1000.0, 1000.0, 0.0], 0.0),
            // χ²(0.995, 3) = 12.838156...
            lidar_measurement(&lidar, [10.0 + offset(12.83815), 10.0, 0.0], 0.0),
            lidar_measurement(&lidar, [10.0 + offset(12.8382), 10.0, 0.0], 0.0),
        ];

        let mut a = assoc();
        a.associate(&kf, &tracks, &meas).unwrap();
        let m = a.matrix();
        assert!(m[(0, 0)] < 1e-9, "measurement on the track must pass the gate");
        assert_eq!(m[(0, 1)], NO_ASSOCIATION);
        assert!(m[(0, 2)].is_finite());
        assert_eq!(m[(0, 3)], NO_ASSOCIATION);
    }

    #[test]
    fn associate_with_no_measurements() {
        let kf = CvKalmanFilter::new(CvKfConfig::default()).unwrap();
        let tracks = vec![Track::new(TrackId(1), Vector6::zeros(), StateCov::identity(), 0.5, 0.0)];
        let mut a = assoc();
        a.associate(&kf, &tracks, &[]).unwrap();
        assert_eq!(a.pop_closest(), None);
        assert_eq!(a.unassigned_tracks(), &[TrackId(1)]);
        assert!(a.unassigned_measurements().is_empty());
    }
}
