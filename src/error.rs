//! Error types for the observer.

use thiserror::Error;

/// Result type for filter operations
pub type UkfResult<T> = Result<T, UkfError>;

/// Failures the filter can report from construction or a predict/update cycle.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum UkfError {
    /// The state covariance could not be factored even after regularization.
    /// Treat as filter divergence.
    #[error("covariance is not positive definite (regularized with jitter {jitter:e})")]
    NonPositiveDefinite { jitter: f64 },

    /// The predicted measurement covariance cannot be inverted, so no Kalman
    /// gain exists for this cycle. The filter keeps its predicted belief.
    #[error("innovation covariance is singular, measurement update skipped")]
    SingularInnovationCovariance,

    /// The sigma point spread parameters give `n+λ ≤ 0` or non-finite
    /// weights. Only raised when a filter is built.
    #[error("sigma point spread n+λ = {scale:e} must be positive with finite weights")]
    InvalidSpread { scale: f64 },
}
