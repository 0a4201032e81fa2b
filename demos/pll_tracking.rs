use sensorless_ukf::linalg::wrap;
use sensorless_ukf::plant::MotorPlant;
use sensorless_ukf::pll::PllEstimator;
use sensorless_ukf::{MotorParams, PllConfig};
use std::io::{self, BufWriter, Write};

fn main() -> io::Result<()> {
    env_logger::init();

    let dt = 1e-6;
    let t_end = 0.2;
    let steps = (t_end / dt) as usize;
    // Only every n-th sample is written
    let decimation = 100;

    let theta_true = 0.0;
    let mut plant = MotorPlant::spinning(MotorParams::default(), theta_true, 0.0);
    let mut pll = PllEstimator::new(PllConfig::default(), (-30.0_f64).to_radians());

    let mut buf = BufWriter::new(io::stdout().lock());
    writeln!(buf, "t,theta_est,err_deg,i_gamma,i_delta")?;

    for k in 0..steps {
        let t = k as f64 * dt;
        let u = pll.injection_voltage(t);
        plant.advance(&u, dt);
        let est = pll.step(t, &plant.currents(), dt);

        if k % decimation == 0 {
            let i = pll.demodulated_current();
            writeln!(
                buf,
                "{},{},{},{},{}",
                t,
                est.theta.to_degrees(),
                wrap(est.theta - plant.theta()).to_degrees(),
                i[0],
                i[1]
            )?;
        }
    }

    buf.flush()
}
