//! Phase-locked loop observer with synchronous IQ demodulation.
//!
//! The loop injects the carrier along its own angle estimate, demodulates the
//! stator currents with the carrier sine through a single-pole low-pass, turns
//! the result into the estimated (γ, δ) frame and drives the δ component to
//! zero with a PI controller. Saliency makes the δ current vanish only when
//! the estimate lines up with the rotor d-axis (or its opposite).

use nalgebra::Vector2;

use crate::config::PllConfig;
use crate::injection::HfInjection;
use crate::linalg::{rotate, wrap};
use crate::{Control, Output};

/// Angle and speed reported by the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PllEstimate {
    pub theta: f64,
    pub omega: f64,
}

/// `y += a·(u - y)`
#[derive(Debug, Clone, Copy, Default)]
struct LowPass {
    y: Vector2<f64>,
}

impl LowPass {
    fn update(&mut self, u: Vector2<f64>, a: f64) -> Vector2<f64> {
        self.y += (u - self.y) * a;
        self.y
    }
}

#[derive(Debug, Clone)]
pub struct PllEstimator {
    config: PllConfig,
    injection: HfInjection,
    demod: LowPass,
    integral: f64,
    theta: f64,
    omega: f64,
    /// Last demodulated current in the estimated frame, `(γ, δ)`.
    gamma_delta: Vector2<f64>,
}

impl PllEstimator {
    pub fn new(config: PllConfig, theta0: f64) -> Self {
        Self {
            injection: HfInjection::new(config.injection),
            config,
            demod: LowPass::default(),
            integral: 0.0,
            theta: wrap(theta0),
            omega: 0.0,
            gamma_delta: Vector2::zeros(),
        }
    }

    /// Carrier voltage to apply during the step starting at `t`.
    pub fn injection_voltage(&self, t: f64) -> Control {
        self.injection.voltage(t, self.theta)
    }

    /// Feed the stator currents sampled at `t` and advance the estimate by `dt`.
    pub fn step(&mut self, t: f64, currents: &Output, dt: f64) -> PllEstimate {
        let a = dt / (self.config.lpf_time_constant + dt);
        let (sin_ref, _) = self.injection.carrier(t);

        // sin² averages to 1/2
        let envelope = self.demod.update(currents * sin_ref, a) * 2.0;
        self.gamma_delta = rotate(-self.theta, &envelope);

        let err = self.gamma_delta[1];
        self.integral += err * dt;
        self.omega = self.config.kp * err + self.config.ki * self.integral;
        self.theta = wrap(self.theta + self.omega * dt);

        self.estimate()
    }

    pub fn estimate(&self) -> PllEstimate {
        PllEstimate {
            theta: self.theta,
            omega: self.omega,
        }
    }

    pub fn demodulated_current(&self) -> &Vector2<f64> {
        &self.gamma_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn low_pass_settles_to_input() {
        let mut lpf = LowPass::default();
        let u = Vector2::new(1.0, -2.0);
        let mut y = Vector2::zeros();
        for _ in 0..200 {
            y = lpf.update(u, 0.1);
        }
        assert_relative_eq!(y, u, epsilon = 1e-6);
    }

    #[test]
    fn no_current_no_correction() {
        let mut pll = PllEstimator::new(PllConfig::default(), 0.4);
        for k in 0..100 {
            let est = pll.step(k as f64 * 1e-6, &Output::zeros(), 1e-6);
            let expected = PllEstimate {
                theta: 0.4,
                omega: 0.0,
            };
            assert_eq!(est, expected);
        }
    }

    #[test]
    fn delta_current_drives_the_angle() {
        let config = PllConfig {
            lpf_time_constant: 0.0,
            ..PllConfig::default()
        };
        let mut pll = PllEstimator::new(config, 0.0);
        // Carrier peak at t = 1/(4f): positive β current reads as positive δ error
        let t = 0.25e-3;
        let est = pll.step(t, &Output::new(0.0, 0.5), 1e-6);
        assert_relative_eq!(pll.demodulated_current()[1], 1.0, epsilon = 1e-9);
        assert!(est.omega > 0.0);
        assert!(est.theta > 0.0);
    }

    #[test]
    fn initial_angle_is_wrapped() {
        let pll = PllEstimator::new(PllConfig::default(), -4.0);
        assert_relative_eq!(pll.estimate().theta, -4.0 + std::f64::consts::TAU, epsilon = 1e-12);
    }
}
