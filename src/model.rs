//! Motor dynamics and measurement models used to propagate sigma points.

use nalgebra::Vector2;

use crate::config::MotorParams;
use crate::linalg::{rotate, wrap};
use crate::{Control, Output, State, ID, IQ, OMEGA, THETA};

/// One discrete step of the state dynamics.
pub trait ProcessModel {
    /// Advance `x` by `dt` under the stator-frame control input `u`.
    fn propagate(&self, x: &State, u: &Control, dt: f64) -> State;
}

/// Maps a state to the quantity a sensor observes.
pub trait MeasurementModel {
    fn measure(&self, x: &State) -> Output;
}

/// Salient-pole PMSM in its own rotor (d, q) frame.
///
/// State is `(Id, Iq, θ, ω)`, control is the stator-frame voltage `(Vα, Vβ)`
/// and the measurement is the stator-frame current `(Iα, Iβ)`. Speed is held
/// constant over a step; changes in ω come in through process noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalientPmsm {
    pub params: MotorParams,
}

impl SalientPmsm {
    pub fn new(params: MotorParams) -> Self {
        Self { params }
    }
}

impl Default for SalientPmsm {
    fn default() -> Self {
        Self::new(MotorParams::default())
    }
}

impl ProcessModel for SalientPmsm {
    /// Forward Euler on the dq current equations including the ω cross
    /// coupling, then `θ ← wrap(θ + ω·dt)`.
    fn propagate(&self, x: &State, u: &Control, dt: f64) -> State {
        let MotorParams { ld, lq, rs } = self.params;
        let (id, iq, theta, omega) = (x[ID], x[IQ], x[THETA], x[OMEGA]);

        let v = rotate(-theta, u);
        let (vd, vq) = (v[0], v[1]);

        State::new(
            id + dt / ld * (vd - rs * id + omega * lq * iq),
            iq + dt / lq * (vq - rs * iq - omega * ld * id),
            wrap(theta + omega * dt),
            omega,
        )
    }
}

impl MeasurementModel for SalientPmsm {
    /// Rotate the dq current into the stator frame.
    fn measure(&self, x: &State) -> Output {
        rotate(x[THETA], &Vector2::new(x[ID], x[IQ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn zero_voltage_at_rest_stays_at_rest() {
        let model = SalientPmsm::default();
        let x = State::new(0.0, 0.0, 0.3, 0.0);
        assert_eq!(model.propagate(&x, &Control::zeros(), 1e-4), x);
    }

    #[test]
    fn voltage_on_d_axis_charges_d_current() {
        let model = SalientPmsm::default();
        let theta = 0.7;
        let x = State::new(0.0, 0.0, theta, 0.0);
        // 10 V along the rotor d-axis, expressed in the stator frame
        let u = rotate(theta, &Vector2::new(10.0, 0.0));
        let next = model.propagate(&x, &u, 1e-4);

        assert_relative_eq!(next[ID], 1e-4 / 1e-3 * 10.0, epsilon = 1e-12);
        assert_relative_eq!(next[IQ], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn saliency_skews_the_current_response() {
        let model = SalientPmsm::default();
        let x = State::zeros();
        let u = Control::new(1.0, 1.0);
        let next = model.propagate(&x, &u, 1e-4);
        // Lq > Ld, so the q current grows slower
        assert_relative_eq!(next[ID] / next[IQ], 1.4, epsilon = 1e-12);
    }

    #[test]
    fn cross_coupling_and_resistance() {
        let params = MotorParams::default();
        let model = SalientPmsm::new(params);
        let x = State::new(2.0, -1.0, 0.0, 100.0);
        let dt = 1e-5;
        let next = model.propagate(&x, &Control::zeros(), dt);

        let expected_id = 2.0 + dt / params.ld * (-params.rs * 2.0 + 100.0 * params.lq * -1.0);
        let expected_iq = -1.0 + dt / params.lq * (params.rs * 1.0 - 100.0 * params.ld * 2.0);
        assert_relative_eq!(next[ID], expected_id, epsilon = 1e-12);
        assert_relative_eq!(next[IQ], expected_iq, epsilon = 1e-12);
        assert_relative_eq!(next[THETA], 1e-3, epsilon = 1e-15);
        assert_eq!(next[OMEGA], 100.0);
    }

    #[test]
    fn angle_wraps_past_pi() {
        let model = SalientPmsm::default();
        let x = State::new(0.0, 0.0, PI - 0.01, 1000.0);
        let next = model.propagate(&x, &Control::zeros(), 1e-4);
        assert_relative_eq!(next[THETA], -PI + 0.09, epsilon = 1e-12);
    }

    #[test]
    fn measurement_rotates_into_stator_frame() {
        let model = SalientPmsm::default();
        let x = State::new(1.0, 0.0, PI / 2.0, 0.0);
        assert_relative_eq!(model.measure(&x), Output::new(0.0, 1.0), epsilon = 1e-15);

        let x = State::new(3.0, 4.0, 1.234, 50.0);
        assert_relative_eq!(model.measure(&x).norm(), 5.0, epsilon = 1e-12);
    }
}
