//! The unscented transform: collapse a propagated sigma point set back into a
//! mean and covariance.
//!
//! The mean is produced by a [`SigmaMean`] strategy. [`WeightedMean`] is the
//! usual `Σ Wm[i]·χᵢ`; [`WrappedAngleMean`] additionally averages one circular
//! component through wrapped differences to the central point. Deviations from
//! the mean are wrapped on the designated angle index before they enter the
//! covariance sum.

use nalgebra::{SMatrix, SVector};

use crate::linalg::{symmetrize, wrap};
use crate::sigma::{SigmaPoints, Weights};
use crate::SIGMA_POINTS;

/// Reduces a sigma point set to its mean.
pub trait SigmaMean<const D: usize> {
    fn mean(&self, points: &SigmaPoints<D>, weights: &Weights) -> SVector<f64, D>;
}

/// `Σ Wm[i]·χᵢ`
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedMean;

impl<const D: usize> SigmaMean<D> for WeightedMean {
    fn mean(&self, points: &SigmaPoints<D>, weights: &Weights) -> SVector<f64, D> {
        points
            .iter()
            .zip(weights.mean.iter())
            .fold(SVector::zeros(), |acc, (p, w)| acc + p * *w)
    }
}

/// Weighted mean with component `index` averaged as
/// `χ₀ + Σ Wm[i]·wrap(χᵢ - χ₀)`, wrapped into (-π, π].
///
/// Matches [`WeightedMean`] when no point crosses the ±π seam. Averaging
/// trigonometric moments instead is not usable here: with small α the
/// weights are of order 1e6 and the moment sum loses its sign once the angle
/// variance passes ~2 rad².
#[derive(Debug, Clone, Copy)]
pub struct WrappedAngleMean {
    pub index: usize,
}

impl<const D: usize> SigmaMean<D> for WrappedAngleMean {
    fn mean(&self, points: &SigmaPoints<D>, weights: &Weights) -> SVector<f64, D> {
        let mut mean = WeightedMean.mean(points, weights);
        let anchor = points[0][self.index];
        let offset: f64 = points
            .iter()
            .zip(weights.mean.iter())
            .map(|(p, w)| w * wrap(p[self.index] - anchor))
            .sum();
        mean[self.index] = wrap(anchor + offset);
        mean
    }
}

impl<const D: usize, F> SigmaMean<D> for F
where
    F: Fn(&SigmaPoints<D>, &Weights) -> SVector<f64, D>,
{
    fn mean(&self, points: &SigmaPoints<D>, weights: &Weights) -> SVector<f64, D> {
        self(points, weights)
    }
}

/// Moments recovered from a sigma point set.
#[derive(Debug, Clone, Copy)]
pub struct Transformed<const D: usize> {
    pub mean: SVector<f64, D>,
    pub covariance: SMatrix<f64, D, D>,
    /// `χᵢ - mean` per point, angle component wrapped.
    pub deviations: SigmaPoints<D>,
}

/// Reconstruct mean and covariance from `points`, adding `noise_cov`.
///
/// If `angle_index` is set that component of every deviation is wrapped
/// before it enters the covariance. The result is symmetrized.
pub fn unscented_transform<const D: usize, M>(
    points: &SigmaPoints<D>,
    weights: &Weights,
    noise_cov: &SMatrix<f64, D, D>,
    mean_fn: &M,
    angle_index: Option<usize>,
) -> Transformed<D>
where
    M: SigmaMean<D> + ?Sized,
{
    let mean = mean_fn.mean(points, weights);

    let mut deviations = [SVector::<f64, D>::zeros(); SIGMA_POINTS];
    for (dev, point) in deviations.iter_mut().zip(points.iter()) {
        *dev = point - mean;
        if let Some(i) = angle_index {
            dev[i] = wrap(dev[i]);
        }
    }

    let mut covariance = *noise_cov;
    for (dev, w) in deviations.iter().zip(weights.covariance.iter()) {
        covariance += dev * dev.transpose() * *w;
    }

    Transformed {
        mean,
        covariance: symmetrize(&covariance),
        deviations,
    }
}
