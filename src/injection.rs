//! High-frequency voltage injection.

use std::f64::consts::TAU;

use nalgebra::Vector2;

use crate::config::InjectionParams;
use crate::linalg::rotate;
use crate::Control;

/// Pulsating carrier `Vγ = A·sin(ωh·t)`, `Vδ = 0` applied along an estimated
/// rotor axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HfInjection {
    amplitude: f64,
    omega_h: f64,
}

impl HfInjection {
    pub fn new(params: InjectionParams) -> Self {
        Self {
            amplitude: params.amplitude,
            omega_h: TAU * params.frequency,
        }
    }

    /// Carrier angular frequency [rad/s]
    pub fn omega_h(&self) -> f64 {
        self.omega_h
    }

    /// `(sin(ωh·t), cos(ωh·t))`
    pub fn carrier(&self, t: f64) -> (f64, f64) {
        (self.omega_h * t).sin_cos()
    }

    /// Stator-frame voltage for the carrier injected along `theta_est`.
    pub fn voltage(&self, t: f64, theta_est: f64) -> Control {
        let (s, _) = self.carrier(t);
        rotate(theta_est, &Vector2::new(self.amplitude * s, 0.0))
    }
}

impl Default for HfInjection {
    fn default() -> Self {
        Self::new(InjectionParams::default())
    }
}
