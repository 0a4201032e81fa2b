//! Small linear algebra helpers shared by the filter and the simulators.

use std::f64::consts::{PI, TAU};

use nalgebra::{SMatrix, Vector2};

use crate::error::{UkfError, UkfResult};
use crate::Covariance;

/// Map an angle into (-π, π].
///
/// Angles already inside the interval are returned unchanged, so `wrap` is
/// exactly idempotent. Both π and -π map to π.
pub fn wrap(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// Rotate a 2-D vector counter-clockwise by `angle`.
pub fn rotate(angle: f64, v: &Vector2<f64>) -> Vector2<f64> {
    let (s, c) = angle.sin_cos();
    Vector2::new(c * v[0] - s * v[1], s * v[0] + c * v[1])
}

/// Lower-triangular Cholesky factor of `m + jitter·I`.
///
/// The jitter only papers over rounding that pushes a semi-definite matrix
/// slightly negative. It does not make an indefinite matrix valid.
pub fn cholesky<const D: usize>(
    m: &SMatrix<f64, D, D>,
    jitter: f64,
) -> UkfResult<SMatrix<f64, D, D>> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(UkfError::NonPositiveDefinite { jitter });
    }
    let regularized = m + SMatrix::<f64, D, D>::identity() * jitter;
    regularized
        .cholesky()
        .map(|c| c.l())
        .ok_or(UkfError::NonPositiveDefinite { jitter })
}

/// `(M + Mᵗ) / 2`
pub fn symmetrize<const D: usize>(m: &SMatrix<f64, D, D>) -> SMatrix<f64, D, D> {
    (m + m.transpose()) * 0.5
}

/// Largest absolute difference between `m` and its transpose.
pub fn asymmetry<const D: usize>(m: &SMatrix<f64, D, D>) -> f64 {
    (m - m.transpose()).amax()
}

/// Project a symmetric matrix onto the positive semi-definite cone by
/// clamping negative eigenvalues to zero.
pub fn clip_psd(m: &Covariance) -> Covariance {
    let mut eigen = symmetrize(m).symmetric_eigen();
    eigen.eigenvalues = eigen.eigenvalues.map(|v| v.max(0.0));
    symmetrize(&eigen.recompose())
}
