use rand::{prelude::Distribution, rngs::StdRng, SeedableRng};
use sensorless_ukf::injection::HfInjection;
use sensorless_ukf::linalg::wrap;
use sensorless_ukf::plant::MotorPlant;
use sensorless_ukf::{
    Covariance, InjectionParams, MotorParams, ObserverConfig, Output, SalientPmsm, State, UkfError,
    UnscentedKalmanFilter,
};
use statrs::distribution::Normal;
use std::error::Error;
use std::f64::consts::PI;
use std::io::{self, BufWriter, Write};

/// One logged sample of the simulation.
struct Sample {
    t: f64,
    theta_true: f64,
    theta_est: f64,
    omega_true: f64,
    omega_est: f64,
}

/// Write the results of the simulation as CSV.
///
/// Output format is t,theta_true,theta_est,err_deg,omega_true,omega_est
fn save(samples: &[Sample], out: impl Write) -> io::Result<()> {
    let mut buf = BufWriter::new(out);
    writeln!(buf, "t,theta_true,theta_est,err_deg,omega_true,omega_est")?;
    for s in samples {
        writeln!(
            buf,
            "{},{},{},{},{},{}",
            s.t,
            s.theta_true.to_degrees(),
            s.theta_est.to_degrees(),
            wrap(s.theta_est - s.theta_true).to_degrees(),
            s.omega_true,
            s.omega_est
        )?;
    }
    buf.flush()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Sampling and duration
    let dt = 1.0 / 3000.0;
    let t_end = 0.05;
    let steps = (t_end / dt) as usize;

    // 2000 rpm, 4 pole pairs
    let omega_true = 2000.0 / 60.0 * 2.0 * PI * 4.0;

    let motor = MotorParams::default();
    let config = ObserverConfig::default();
    let injection = HfInjection::new(InjectionParams::default());

    // Truth starts at zero angle, the filter guesses 30 degrees and standstill
    let mut plant = MotorPlant::spinning(motor, 0.0, omega_true);
    let x0 = State::new(0.0, 0.0, 30.0_f64.to_radians(), 0.0);
    let p0 = Covariance::from_diagonal(&State::new(
        1e-3,
        1e-3,
        (PI / 2.0).powi(2),
        100.0_f64.powi(2),
    ));
    let mut ukf = UnscentedKalmanFilter::from_config(SalientPmsm::new(motor), x0, p0, &config)?;

    // Sensor noise matching R
    let mut rng = StdRng::seed_from_u64(0);
    let sensor_noise = Normal::new(0.0, config.measurement_noise[0].sqrt()).unwrap();

    let mut samples = Vec::with_capacity(steps);
    for k in 0..steps {
        let t = k as f64 * dt;

        // Carrier follows the estimated axis
        let u = injection.voltage(t, ukf.theta());
        plant.advance(&u, dt);
        let noise = Output::from_fn(|_, _| sensor_noise.sample(&mut rng));
        let y = plant.currents() + noise;

        match ukf.step(&u, &y, dt) {
            Ok(_) | Err(UkfError::SingularInnovationCovariance) => {}
            Err(e) => {
                eprintln!("Filter diverged at t = {}: {}", t, e);
                break;
            }
        }

        samples.push(Sample {
            t,
            theta_true: plant.theta(),
            theta_est: ukf.theta(),
            omega_true: plant.omega(),
            omega_est: ukf.omega(),
        });
    }

    eprintln!("{:?}", ukf.diagnostics());
    save(&samples, io::stdout().lock())?;
    Ok(())
}
