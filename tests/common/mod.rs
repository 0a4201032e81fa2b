//! Closed-loop simulation helpers shared by the scenario tests

#![allow(dead_code)]

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

use rand::distributions::Distribution;
use sensorless_ukf::injection::HfInjection;
use sensorless_ukf::linalg::wrap;
use sensorless_ukf::plant::MotorPlant;
use sensorless_ukf::pll::PllEstimator;
use sensorless_ukf::{
    Covariance, InjectionParams, MotorParams, ObserverConfig, Output, SalientPmsm, State,
    UnscentedKalmanFilter,
};

/// Sampling period of the reference drive [s]
pub const DT: f64 = 1.0 / 3000.0;

/// 2000 rpm with 4 pole pairs [rad/s]
pub const RATED_OMEGA: f64 = 2000.0 / 60.0 * 2.0 * PI * 4.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Prior covariance reflecting a badly wrong initial guess
pub fn wide_prior() -> Covariance {
    Covariance::from_diagonal(&State::new(1e-3, 1e-3, (PI / 2.0).powi(2), 100.0_f64.powi(2)))
}

/// Filter at rest with its angle guess at `theta_deg` degrees
pub fn make_filter(theta_deg: f64, config: &ObserverConfig) -> UnscentedKalmanFilter<SalientPmsm> {
    UnscentedKalmanFilter::from_config(
        SalientPmsm::new(MotorParams::default()),
        State::new(0.0, 0.0, theta_deg.to_radians(), 0.0),
        wide_prior(),
        config,
    )
    .unwrap()
}

/// Additive Gaussian measurement noise with a fixed seed
pub struct SensorNoise {
    rng: StdRng,
    normal: Normal,
}

impl SensorNoise {
    pub fn new(std_dev: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            normal: Normal::new(0.0, std_dev).unwrap(),
        }
    }

    pub fn corrupt(&mut self, y: Output) -> Output {
        y + Output::new(self.normal.sample(&mut self.rng), self.normal.sample(&mut self.rng))
    }
}

/// Per-step record of a closed-loop run
#[derive(Debug, Default)]
pub struct Trace {
    /// Wrapped angle error in degrees
    pub theta_err_deg: Vec<f64>,
    pub omega_est: Vec<f64>,
    pub omega_true: Vec<f64>,
    pub covariances: Vec<Covariance>,
}

impl Trace {
    pub fn max_abs_theta_err(&self, from: usize) -> f64 {
        self.theta_err_deg[from..].iter().fold(0.0, |m, e| m.max(e.abs()))
    }

    pub fn max_abs_omega_err(&self, from: usize) -> f64 {
        self.omega_est[from..]
            .iter()
            .zip(&self.omega_true[from..])
            .fold(0.0, |m, (e, t)| m.max((e - t).abs()))
    }
}

/// Run the injection loop: the carrier follows the filter's own angle, the
/// plant is advanced and its currents are fed back as the measurement.
/// `speed_change` optionally imposes a new plant speed at a given step.
pub fn run_ukf(
    filter: &mut UnscentedKalmanFilter<SalientPmsm>,
    plant: &mut MotorPlant,
    steps: usize,
    mut noise: Option<SensorNoise>,
    speed_change: Option<(usize, f64)>,
) -> Trace {
    let injection = HfInjection::new(InjectionParams::default());
    let mut trace = Trace::default();

    for k in 0..steps {
        if let Some((at, omega)) = speed_change {
            if k == at {
                plant.set_speed(omega);
            }
        }

        let t = k as f64 * DT;
        let u = injection.voltage(t, filter.theta());
        plant.advance(&u, DT);

        let mut y = plant.currents();
        if let Some(noise) = noise.as_mut() {
            y = noise.corrupt(y);
        }

        let belief = filter.step(&u, &y, DT).unwrap();

        trace.theta_err_deg.push(wrap(filter.theta() - plant.theta()).to_degrees());
        trace.omega_est.push(filter.omega());
        trace.omega_true.push(plant.omega());
        trace.covariances.push(belief.covariance);
    }

    trace
}

/// Same loop for the PLL observer. Returns the wrapped angle error in degrees.
pub fn run_pll(pll: &mut PllEstimator, plant: &mut MotorPlant, steps: usize, dt: f64) -> Vec<f64> {
    let mut errors = Vec::with_capacity(steps);
    for k in 0..steps {
        let t = k as f64 * dt;
        let u = pll.injection_voltage(t);
        plant.advance(&u, dt);
        let est = pll.step(t, &plant.currents(), dt);
        errors.push(wrap(est.theta - plant.theta()).to_degrees());
    }
    errors
}
