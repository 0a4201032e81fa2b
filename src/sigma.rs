//! Merwe scaled sigma points.
//!
//! For an `n`-dimensional belief `(x, P)` the generator produces `2n+1` points
//!
//! - χ₀ = x
//! - χᵢ = x + γ·col_i(L) for i = 1..n
//! - χₙ₊ᵢ = x - γ·col_i(L) for i = 1..n
//!
//! where `L` is the lower Cholesky factor of `P`, `λ = α²(n+κ) - n` and
//! `γ = √(n+λ)`. The angle component of every point is wrapped right away.

use log::debug;

use crate::config::{Regularization, SpreadParams};
use crate::error::{UkfError, UkfResult};
use crate::linalg::{cholesky, wrap};
use crate::{Covariance, State, SIGMA_POINTS, STATE_DIM, THETA};

/// A full set of sigma points of dimension `D`.
pub type SigmaPoints<const D: usize> = [nalgebra::SVector<f64, D>; SIGMA_POINTS];

/// Mean and covariance weights for the sigma points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub mean: [f64; SIGMA_POINTS],
    pub covariance: [f64; SIGMA_POINTS],
}

impl Weights {
    /// `Wm[0] = λ/(n+λ)`, `Wc[0] = Wm[0] + 1 - α² + β` and
    /// `Wm[i] = Wc[i] = 1/(2(n+λ))` elsewhere. `Wm` sums to one.
    pub fn new(spread: &SpreadParams) -> Self {
        let n = STATE_DIM as f64;
        let lambda = spread.lambda(STATE_DIM);
        let outer = 0.5 / (n + lambda);

        let mut mean = [outer; SIGMA_POINTS];
        let mut covariance = [outer; SIGMA_POINTS];
        mean[0] = lambda / (n + lambda);
        covariance[0] = mean[0] + (1.0 - spread.alpha.powi(2) + spread.beta);

        Self { mean, covariance }
    }
}

/// Sigma point generator for the fixed 4-state observer.
#[derive(Debug, Clone, Copy)]
pub struct SigmaPointGenerator {
    gamma: f64,
    weights: Weights,
    regularization: Regularization,
}

impl SigmaPointGenerator {
    /// Fails with [`UkfError::InvalidSpread`] unless `n+λ = α²(n+κ)` is
    /// positive and every weight is finite.
    pub fn new(spread: &SpreadParams, regularization: Regularization) -> UkfResult<Self> {
        let scale = STATE_DIM as f64 + spread.lambda(STATE_DIM);
        let weights = Weights::new(spread);
        let finite = weights.mean.iter().chain(weights.covariance.iter()).all(|w| w.is_finite());
        if !(scale > 0.0 && scale.is_finite() && finite) {
            return Err(UkfError::InvalidSpread { scale });
        }

        Ok(Self {
            gamma: scale.sqrt(),
            weights,
            regularization,
        })
    }

    pub fn with_regularization(mut self, regularization: Regularization) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn regularization(&self) -> &Regularization {
        &self.regularization
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Factor `P`, retrying once with the larger jitter. Returns the factor and
    /// whether the retry was needed.
    pub fn factor(&self, p: &Covariance) -> UkfResult<(Covariance, bool)> {
        match cholesky(p, self.regularization.jitter) {
            Ok(l) => Ok((l, false)),
            Err(UkfError::NonPositiveDefinite { jitter }) => {
                debug!(
                    "Cholesky failed with jitter {:e}, retrying with {:e}",
                    jitter, self.regularization.retry_jitter
                );
                cholesky(p, self.regularization.retry_jitter).map(|l| (l, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Build the sigma points for the belief `(x, p)`. Also reports whether the
    /// covariance needed the retry jitter.
    pub fn generate(&self, x: &State, p: &Covariance) -> UkfResult<(SigmaPoints<STATE_DIM>, bool)> {
        let (lower, retried) = self.factor(p)?;

        let mut points = [*x; SIGMA_POINTS];
        for i in 0..STATE_DIM {
            let delta = lower.column(i) * self.gamma;
            points[i + 1] += delta;
            points[STATE_DIM + i + 1] -= delta;
        }
        for point in points.iter_mut() {
            point[THETA] = wrap(point[THETA]);
        }

        Ok((points, retried))
    }
}
