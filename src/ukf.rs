//! The unscented Kalman filter observer.
//!
//! Each call to [`UnscentedKalmanFilter::step`] runs one full cycle in fixed order: draw sigma points from the current belief, push them through the process model, collapse them with the unscented transform (angle deviations wrapped, additive Q), map the *propagated* points through the measurement model, collapse those (additive R), form the cross covariance and Kalman gain, and fuse the measurement.
//!
//! A filter only exists once it has been given a prior, so there is no uninitialized state to guard against. It keeps tracking for as long as the caller keeps stepping it.

use log::{error, trace, warn};

use crate::config::{AngleMean, ObserverConfig, Regularization, SpreadParams};
use crate::error::{UkfError, UkfResult};
use crate::linalg::{asymmetry, clip_psd, symmetrize, wrap};
use crate::model::{MeasurementModel, ProcessModel};
use crate::sigma::{SigmaPointGenerator, SigmaPoints};
use crate::transform::{unscented_transform, WeightedMean, WrappedAngleMean};
use crate::{
    Control, Covariance, CrossCovariance, KalmanGain, Output, OutputCovariance, State, OMEGA,
    STATE_DIM, THETA,
};

/// The estimator's knowledge of the motor: state estimate and its covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Belief {
    pub state: State,
    pub covariance: Covariance,
}

/// Result of a time update, consumed by [`UnscentedKalmanFilter::update`].
///
/// A prediction is only good for the belief it was drawn from, so it is moved
/// into the update and cannot be fused twice.
#[derive(Debug)]
pub struct Prediction {
    /// Sigma points after the process model.
    pub sigma_points: SigmaPoints<STATE_DIM>,
    pub state: State,
    pub covariance: Covariance,
    deviations: SigmaPoints<STATE_DIM>,
}

impl Prediction {
    pub fn belief(&self) -> Belief {
        Belief {
            state: self.state,
            covariance: self.covariance,
        }
    }

    fn is_finite(&self) -> bool {
        self.state.iter().chain(self.covariance.iter()).all(|v| v.is_finite())
    }
}

/// Running counters for the health of the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Calls to `step`.
    pub steps: u64,
    /// Measurement updates dropped because the innovation covariance was singular.
    pub skipped_updates: u64,
    /// Covariance factorizations that needed the larger retry jitter.
    pub jitter_retries: u64,
}

/// Unscented Kalman filter over the motor state `(Id, Iq, θ, ω)`. Owns its belief, its noise model and the motor model `M` used for both the process and measurement functions.
#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter<M> {
    state: State,
    covariance: Covariance,
    model: M,
    spread: SpreadParams,
    sigma: SigmaPointGenerator,
    process_noise: Covariance,
    measurement_noise: OutputCovariance,
    angle_mean: AngleMean,
    clip_covariance: bool,
    diagnostics: Diagnostics,
}

impl<M> UnscentedKalmanFilter<M>
where
    M: ProcessModel + MeasurementModel,
{
    /// Set up the filter from a prior belief, the additive process noise `q`, the measurement noise `r` and the sigma point spread parameters.
    ///
    /// The prior may be far from the truth as long as `prior_covariance` says so. Regularization, angle averaging and covariance clipping start at their defaults and can be changed with the `with_*` methods. Fails with [`UkfError::InvalidSpread`] if `spread` cannot produce a valid sigma point set.
    pub fn initialize(
        model: M,
        prior_state: State,
        prior_covariance: Covariance,
        q: Covariance,
        r: OutputCovariance,
        spread: SpreadParams,
    ) -> UkfResult<Self> {
        let sigma = SigmaPointGenerator::new(&spread, Regularization::default())?;

        let mut state = prior_state;
        state[THETA] = wrap(state[THETA]);

        Ok(Self {
            state,
            covariance: prior_covariance,
            model,
            spread,
            sigma,
            process_noise: q,
            measurement_noise: r,
            angle_mean: AngleMean::default(),
            clip_covariance: false,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Build a filter with every setting taken from `config`.
    pub fn from_config(
        model: M,
        prior_state: State,
        prior_covariance: Covariance,
        config: &ObserverConfig,
    ) -> UkfResult<Self> {
        let filter = Self::initialize(
            model,
            prior_state,
            prior_covariance,
            config.process_noise_cov(),
            config.measurement_noise_cov(),
            config.spread,
        )?;
        Ok(filter
            .with_regularization(config.regularization)
            .with_angle_mean(config.angle_mean)
            .with_covariance_clipping(config.clip_covariance))
    }

    pub fn with_regularization(mut self, regularization: Regularization) -> Self {
        self.sigma = self.sigma.with_regularization(regularization);
        self
    }

    pub fn with_angle_mean(mut self, angle_mean: AngleMean) -> Self {
        self.angle_mean = angle_mean;
        self
    }

    pub fn with_covariance_clipping(mut self, clip: bool) -> Self {
        self.clip_covariance = clip;
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn covariance(&self) -> &Covariance {
        &self.covariance
    }

    pub fn belief(&self) -> Belief {
        Belief {
            state: self.state,
            covariance: self.covariance,
        }
    }

    /// Estimated electrical angle [rad], in (-π, π].
    pub fn theta(&self) -> f64 {
        self.state[THETA]
    }

    /// Estimated electrical speed [rad/s].
    pub fn omega(&self) -> f64 {
        self.state[OMEGA]
    }

    pub fn spread(&self) -> &SpreadParams {
        &self.spread
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run one full predict and update cycle for the control input `u` applied over `dt` and the measurement `y` taken at the end of it.
    ///
    /// Returns the new belief. On [`UkfError::SingularInnovationCovariance`] the filter has already moved to the predicted belief, so the caller may simply carry on with the next step. On [`UkfError::NonPositiveDefinite`] the belief is left untouched and the filter should be considered diverged.
    pub fn step(&mut self, u: &Control, y: &Output, dt: f64) -> UkfResult<Belief> {
        self.diagnostics.steps += 1;
        let prediction = self.predict(u, dt)?;
        let belief = self.update(prediction, y)?;
        trace!(
            "step {}: theta {:.5} rad, omega {:.3} rad/s",
            self.diagnostics.steps,
            belief.state[THETA],
            belief.state[OMEGA]
        );
        Ok(belief)
    }

    /// Time update. Draws sigma points from the current belief and propagates them through the process model. The filter's belief is not changed until [`Self::update`] consumes the prediction.
    pub fn predict(&mut self, u: &Control, dt: f64) -> UkfResult<Prediction> {
        let (points, retried) = self.sigma.generate(&self.state, &self.covariance).map_err(|e| {
            error!("sigma point generation failed: {}", e);
            e
        })?;
        if retried {
            self.diagnostics.jitter_retries += 1;
        }

        let model = &self.model;
        let propagated = points.map(|p| model.propagate(&p, u, dt));

        let weights = self.sigma.weights();
        let q = &self.process_noise;
        let mut moments = match self.angle_mean {
            AngleMean::Arithmetic => {
                unscented_transform(&propagated, weights, q, &WeightedMean, Some(THETA))
            }
            AngleMean::Wrapped => {
                let mean = WrappedAngleMean { index: THETA };
                unscented_transform(&propagated, weights, q, &mean, Some(THETA))
            }
        };
        moments.mean[THETA] = wrap(moments.mean[THETA]);

        Ok(Prediction {
            sigma_points: propagated,
            state: moments.mean,
            covariance: moments.covariance,
            deviations: moments.deviations,
        })
    }

    /// Measurement update. Fuses `y` into `prediction` and makes the result the filter's belief.
    ///
    /// If the innovation covariance cannot be inverted the prediction becomes the belief, the skip is counted and logged, and the error is returned. A prediction that is no longer finite is never committed: the belief stays as it was and [`UkfError::NonPositiveDefinite`] is returned.
    ///
    /// ```
    /// use sensorless_ukf::{Control, Covariance, ObserverConfig, Output, SalientPmsm, State};
    /// use sensorless_ukf::UnscentedKalmanFilter;
    ///
    /// let config = ObserverConfig::default();
    /// let p = Covariance::from_diagonal_element(1e-3);
    /// let mut ukf =
    ///     UnscentedKalmanFilter::from_config(SalientPmsm::default(), State::zeros(), p, &config)
    ///         .unwrap();
    /// let prediction = ukf.predict(&Control::zeros(), 1e-4).unwrap();
    /// let belief = ukf.update(prediction, &Output::zeros()).unwrap();
    /// assert_eq!(&belief.state, ukf.state());
    /// ```
    ///
    /// The prediction is consumed, so it cannot be fused a second time:
    ///
    /// ```compile_fail
    /// use sensorless_ukf::{Control, Covariance, ObserverConfig, Output, SalientPmsm, State};
    /// use sensorless_ukf::UnscentedKalmanFilter;
    ///
    /// let config = ObserverConfig::default();
    /// let p = Covariance::from_diagonal_element(1e-3);
    /// let mut ukf =
    ///     UnscentedKalmanFilter::from_config(SalientPmsm::default(), State::zeros(), p, &config)
    ///         .unwrap();
    /// let prediction = ukf.predict(&Control::zeros(), 1e-4).unwrap();
    /// let _ = ukf.update(prediction, &Output::zeros());
    /// let _ = ukf.update(prediction, &Output::zeros());
    /// ```
    pub fn update(&mut self, prediction: Prediction, y: &Output) -> UkfResult<Belief> {
        let model = &self.model;
        let measured = prediction.sigma_points.map(|p| model.measure(&p));

        let weights = self.sigma.weights();
        let r = &self.measurement_noise;
        let innovation = unscented_transform(&measured, weights, r, &WeightedMean, None);

        let mut cross = CrossCovariance::zeros();
        for i in 0..measured.len() {
            cross += prediction.deviations[i]
                * innovation.deviations[i].transpose()
                * weights.covariance[i];
        }

        let s_inv = match innovation_inverse(&innovation.covariance, r) {
            Ok(s_inv) => s_inv,
            Err(e) if !prediction.is_finite() => {
                let jitter = self.sigma.regularization().retry_jitter;
                error!("{}; prediction is no longer finite, filter diverged", e);
                return Err(UkfError::NonPositiveDefinite { jitter });
            }
            Err(e) => {
                self.state = prediction.state;
                self.covariance = prediction.covariance;
                self.diagnostics.skipped_updates += 1;
                warn!(
                    "{}; running on prediction only ({} skipped so far)",
                    e, self.diagnostics.skipped_updates
                );
                return Err(e);
            }
        };
        let gain: KalmanGain = cross * s_inv;

        let mut state = prediction.state + gain * (y - innovation.mean);
        state[THETA] = wrap(state[THETA]);

        let correction = gain * innovation.covariance * gain.transpose();
        let mut covariance = symmetrize(&(prediction.covariance - correction));
        if self.clip_covariance {
            covariance = clip_psd(&covariance);
        }
        debug_assert!(
            asymmetry(&covariance) <= f64::EPSILON * covariance.amax(),
            "covariance lost symmetry"
        );

        self.state = state;
        self.covariance = covariance;
        Ok(self.belief())
    }
}

/// Inverse of the innovation covariance `s`. It has to be finite and positive definite, and the measurement noise floor `r` has to be positive definite as well, otherwise the gain would trust the sensor without limit.
fn innovation_inverse(
    s: &OutputCovariance,
    r: &OutputCovariance,
) -> UkfResult<OutputCovariance> {
    if s.iter().any(|v| !v.is_finite()) || r.cholesky().is_none() {
        return Err(UkfError::SingularInnovationCovariance);
    }
    s.cholesky()
        .map(|c| c.inverse())
        .ok_or(UkfError::SingularInnovationCovariance)
}
