//! Ground-truth motor simulation for generating synthetic measurements.

use crate::config::MotorParams;
use crate::model::{MeasurementModel, ProcessModel, SalientPmsm};
use crate::{Control, Output, State, OMEGA, THETA};

/// A simulated salient PMSM whose true state the observers try to recover.
///
/// Uses the same discretization as [`SalientPmsm`], so a filter running the
/// matching model sees no model mismatch beyond the measurement noise the
/// harness adds.
#[derive(Debug, Clone)]
pub struct MotorPlant {
    model: SalientPmsm,
    state: State,
}

impl MotorPlant {
    pub fn new(params: MotorParams, initial: State) -> Self {
        Self {
            model: SalientPmsm::new(params),
            state: initial,
        }
    }

    /// Motor at rest at electrical angle `theta`, turning at `omega`.
    pub fn spinning(params: MotorParams, theta: f64, omega: f64) -> Self {
        Self::new(params, State::new(0.0, 0.0, theta, omega))
    }

    pub fn advance(&mut self, u: &Control, dt: f64) {
        self.state = self.model.propagate(&self.state, u, dt);
    }

    /// Noise-free stator-frame currents.
    pub fn currents(&self) -> Output {
        self.model.measure(&self.state)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn theta(&self) -> f64 {
        self.state[THETA]
    }

    pub fn omega(&self) -> f64 {
        self.state[OMEGA]
    }

    /// Impose a new electrical speed, e.g. for a speed step.
    pub fn set_speed(&mut self, omega: f64) {
        self.state[OMEGA] = omega;
    }
}
