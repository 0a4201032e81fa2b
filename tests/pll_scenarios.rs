//! Closed-loop scenarios for the demodulating PLL observer

mod common;

use common::{init_logging, run_pll};
use sensorless_ukf::plant::MotorPlant;
use sensorless_ukf::pll::PllEstimator;
use sensorless_ukf::{MotorParams, PllConfig};

const PLL_DT: f64 = 1e-6;

#[test]
fn test_pll_locks_from_either_side() {
    init_logging();
    for &offset_deg in &[-30.0_f64, 30.0] {
        let mut pll = PllEstimator::new(PllConfig::default(), offset_deg.to_radians());
        let mut plant = MotorPlant::spinning(MotorParams::default(), 0.0, 0.0);

        let errors = run_pll(&mut pll, &mut plant, 100_000, PLL_DT);

        assert!((errors[0] - offset_deg).abs() < 0.1);
        let settled = errors[50_000..].iter().fold(0.0_f64, |m, e| m.max(e.abs()));
        assert!(settled < 1.5, "offset {}: error {} deg", offset_deg, settled);
    }
}

#[test]
fn test_pll_locks_on_rotated_rotor() {
    let theta_true = 1.0;
    let mut pll = PllEstimator::new(PllConfig::default(), theta_true + 30.0_f64.to_radians());
    let mut plant = MotorPlant::spinning(MotorParams::default(), theta_true, 0.0);

    let errors = run_pll(&mut pll, &mut plant, 100_000, PLL_DT);

    assert!(errors.last().unwrap().abs() < 1.5);
    // Speed estimate winds down once locked
    assert!(pll.estimate().omega.abs() < 50.0, "omega {}", pll.estimate().omega);
}

#[test]
fn test_pll_error_shrinks_early() {
    let mut pll = PllEstimator::new(PllConfig::default(), (-30.0_f64).to_radians());
    let mut plant = MotorPlant::spinning(MotorParams::default(), 0.0, 0.0);

    let errors = run_pll(&mut pll, &mut plant, 20_000, PLL_DT);

    assert!(errors[19_999].abs() < errors[0].abs() / 2.0);
}
