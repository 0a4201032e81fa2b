//! Tuning and physical parameters.
//!
//! Everything here is plain data with `serde` derives so a harness can load it
//! from whatever format it likes. Missing fields fall back to the defaults,
//! which are the reference tuning for a small salient-pole PMSM.

use serde::{Deserialize, Serialize};

use crate::{Covariance, Output, OutputCovariance, State, STATE_DIM};

/// Sigma point spread parameters.
///
/// - `alpha` spreads the points around the mean (1e-4 ≤ α ≤ 1)
/// - `beta` encodes prior knowledge of the distribution, 2 is optimal for Gaussians
/// - `kappa` is a secondary scaling, usually 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadParams {
    pub alpha: f64,
    pub beta: f64,
    pub kappa: f64,
}

impl Default for SpreadParams {
    fn default() -> Self {
        Self {
            alpha: 1e-3,
            beta: 2.0,
            kappa: 0.0,
        }
    }
}

impl SpreadParams {
    pub fn new(alpha: f64, beta: f64, kappa: f64) -> Self {
        Self { alpha, beta, kappa }
    }

    /// `λ = α²(n+κ) - n`
    pub fn lambda(&self, n: usize) -> f64 {
        let n = n as f64;
        self.alpha.powi(2) * (n + self.kappa) - n
    }

    /// `γ = √(n+λ)`
    pub fn gamma(&self, n: usize) -> f64 {
        (n as f64 + self.lambda(n)).sqrt()
    }
}

/// Diagonal jitter added before factoring the state covariance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regularization {
    pub jitter: f64,
    /// Used for the single retry after `jitter` was not enough.
    pub retry_jitter: f64,
}

impl Default for Regularization {
    fn default() -> Self {
        Self {
            jitter: 1e-12,
            retry_jitter: 1e-9,
        }
    }
}

/// How the angle component of the predicted state mean is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleMean {
    /// Plain weighted sum of the wrapped angles. Wrong when the points
    /// straddle ±π.
    #[default]
    Arithmetic,
    /// Weighted sum of wrapped differences to the central sigma point.
    Wrapped,
}

/// Observer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub spread: SpreadParams,
    /// Diagonal of Q for `(Id, Iq, θ, ω)`.
    pub process_noise: [f64; STATE_DIM],
    /// Diagonal of R for `(Iα, Iβ)`.
    pub measurement_noise: [f64; 2],
    pub regularization: Regularization,
    /// Clamp negative eigenvalues of the updated covariance.
    pub clip_covariance: bool,
    pub angle_mean: AngleMean,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            spread: SpreadParams::default(),
            process_noise: [1e-6, 1e-6, 1e-6, 10.0],
            measurement_noise: [1e-4, 1e-4],
            regularization: Regularization::default(),
            clip_covariance: false,
            angle_mean: AngleMean::default(),
        }
    }
}

impl ObserverConfig {
    pub fn process_noise_cov(&self) -> Covariance {
        Covariance::from_diagonal(&State::from(self.process_noise))
    }

    pub fn measurement_noise_cov(&self) -> OutputCovariance {
        OutputCovariance::from_diagonal(&Output::from(self.measurement_noise))
    }
}

/// Electrical parameters of a salient-pole PMSM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorParams {
    /// d-axis inductance [H]
    pub ld: f64,
    /// q-axis inductance [H]
    pub lq: f64,
    /// Stator resistance [Ω]
    pub rs: f64,
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            ld: 1e-3,
            lq: 1.4e-3,
            rs: 0.03,
        }
    }
}

/// High-frequency carrier injected along the estimated d-axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionParams {
    /// Amplitude [V]
    pub amplitude: f64,
    /// Frequency [Hz]
    pub frequency: f64,
}

impl Default for InjectionParams {
    fn default() -> Self {
        Self {
            amplitude: 25.0,
            frequency: 1000.0,
        }
    }
}

/// Gains of the demodulating phase-locked loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PllConfig {
    pub kp: f64,
    pub ki: f64,
    /// Demodulator low-pass time constant [s]
    pub lpf_time_constant: f64,
    pub injection: InjectionParams,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            kp: 2000.0,
            ki: 2000.0,
            lpf_time_constant: 5e-4,
            injection: InjectionParams {
                amplitude: 20.0,
                frequency: 1000.0,
            },
        }
    }
}
