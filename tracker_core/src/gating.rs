//! Mahalanobis gating: determines whether a measurement is "close enough"
//! to a predicted track to be considered as a potential association.
//!
//! # Gating criterion
//! d²(z, track) = γᵀ S⁻¹ γ  where γ = z − h(x̂),  S = H·P·Hᵀ + R
//!
//! Accept if d² < χ²(p, dof) for probability mass p, with dof the
//! measurement dimension. The boundary itself is rejected.
//!
//! # Gate threshold table (p = 0.995)
//! dof=2: χ² ≈ 10.60
//! dof=3: χ² ≈ 12.84

use crate::{
    error::{TrackerError, TrackerResult},
    types::STATE_DIM,
};
use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF};

/// Newton iterations applied on top of the statrs estimate.
const MAX_REFINE_STEPS: usize = 20;

/// Quantile of the χ² distribution with `dof` degrees of freedom.
pub fn chi2_quantile(probability: f64, dof: usize) -> TrackerResult<f64> {
    if !(probability > 0.0 && probability < 1.0) {
        return Err(TrackerError::InvalidProbability(probability));
    }
    let dist = ChiSquared::new(dof as f64).map_err(|e| {
        TrackerError::InvalidConfig(format!("chi-squared with {dof} degrees of freedom: {e}"))
    })?;
    // statrs only brackets the root to ~1e-4; polish it against the cdf.
    let mut x = dist.inverse_cdf(probability);
    for _ in 0..MAX_REFINE_STEPS {
        let density = dist.pdf(x);
        if !(density > 0.0) {
            break;
        }
        let step = (dist.cdf(x) - probability) / density;
        let next = x - step;
        if !(next > 0.0) {
            break;
        }
        x = next;
        if step.abs() <= 1e-14 * x {
            break;
        }
    }
    Ok(x)
}

/// χ² gate thresholds at a fixed probability mass, pre-computed per
/// measurement dimension [1..=6].
#[derive(Clone, Debug)]
pub struct ChiSquareGate {
    thresholds: [f64; STATE_DIM + 1],
}

impl ChiSquareGate {
    pub fn new(probability: f64) -> TrackerResult<Self> {
        let mut thresholds = [0.0; STATE_DIM + 1];
        for (dof, slot) in thresholds.iter_mut().enumerate().skip(1) {
            *slot = chi2_quantile(probability, dof)?;
        }
        Ok(Self { thresholds })
    }

    /// Gate threshold for a measurement of dimension `dof`.
    pub fn threshold(&self, dof: usize) -> TrackerResult<f64> {
        match dof {
            1..=STATE_DIM => Ok(self.thresholds[dof]),
            _ => Err(TrackerError::length("gated measurement dimension", STATE_DIM, dof)),
        }
    }

    /// Strict inequality: a distance exactly on the boundary is outside.
    pub fn accepts(&self, d2: f64, dof: usize) -> TrackerResult<bool> {
        Ok(d2 < self.threshold(dof)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
