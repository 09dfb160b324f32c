//! Error types for the tracking core.
//!
//! Only precondition violations are errors. Running out of associable pairs
//! and policy outcomes such as deletion or score clamping are ordinary results.

use thiserror::Error;

/// Result alias used throughout `tracker_core`.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Fatal precondition violations. A cycle that hits one of these must be aborted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// The innovation covariance S = H·P·Hᵀ + R could not be solved against.
    #[error("innovation covariance is singular")]
    SingularInnovation,

    /// A vector or matrix did not have the shape the operation requires.
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    /// A configuration constant is out of its admissible range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A camera-type projection hit a point with zero depth.
    #[error("projection is degenerate: point lies on the sensor image plane")]
    DegenerateProjection,

    /// A gating probability outside the open interval (0, 1).
    #[error("gating probability {0} is outside (0, 1)")]
    InvalidProbability(f64),
}

impl TrackerError {
    pub(crate) fn shape(what: &'static str, expected: (usize, usize), found: (usize, usize)) -> Self {
        TrackerError::DimensionMismatch {
            what,
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", found.0, found.1),
        }
    }

    pub(crate) fn length(what: &'static str, expected: usize, found: usize) -> Self {
        TrackerError::DimensionMismatch {
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
