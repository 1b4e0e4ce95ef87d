//! A complete generator session against the simulated peripheral

use approx::assert_abs_diff_eq;
use mercury::{
    fixed_point::RangeError,
    prelude::*,
};
use std::f64::consts::TAU;

fn sine(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| (i as f64 / len as f64 * TAU).sin())
        .collect()
}

#[test]
fn configure_and_run_a_finite_burst() -> anyhow::Result<()> {
    let asg = Generator::new(Mock::new().with_stop_latency(3));
    asg.control.reset()?;
    asg.set_waveform(&sine(1000))?;
    asg.set_frequency(125_000.0)?;
    asg.set_phase(180.0)?;
    asg.set_amplitude(0.8)?;
    asg.set_offset(-0.1)?;
    asg.set_burst(BurstMode::Finite, 1000, 2000, 10)?;

    assert_abs_diff_eq!(asg.frequency()?, 125_000.0, epsilon = 1e-6);
    assert_abs_diff_eq!(asg.phase()?, 180.0, epsilon = 1e-3);
    assert_abs_diff_eq!(asg.amplitude()?, 0.8, epsilon = 1.0 / 4096.0);
    assert_abs_diff_eq!(asg.offset()?, -0.1, epsilon = 1.0 / 8191.0);
    assert_eq!(asg.burst_mode()?, BurstMode::Finite);

    let table = asg.waveform()?;
    assert_eq!(table.len(), 1000);
    for (read, written) in table.iter().zip(sine(1000)) {
        assert_abs_diff_eq!(*read, written, epsilon = 1.0 / 8191.0);
    }

    asg.control.start()?;
    assert!(asg.control.is_running()?);
    asg.control.stop()?;
    let mut polls = 0;
    while !asg.control.is_stopped()? {
        polls += 1;
    }
    assert_eq!(polls, 3);
    Ok(())
}

#[test]
fn rejected_settings_leave_the_generator_alone() -> anyhow::Result<()> {
    let asg = Generator::new(Mock::new());
    asg.set_waveform(&sine(64))?;
    asg.set_frequency(1e6)?;
    let before = asg.dump()?;

    assert!(matches!(
        asg.set_frequency(FS),
        Err(Error::Range(RangeError { .. }))
    ));
    assert!(asg.set_amplitude(-1.5).is_err());
    assert!(asg.set_waveform(&[0.0, 2.0]).is_err());
    assert!(asg.set_burst_mode("sometimes").is_err());

    let after = asg.dump()?;
    // The status word is live, compare the configuration only
    assert_eq!(before[1..], after[1..]);
    Ok(())
}

#[test]
fn capture_session() -> anyhow::Result<()> {
    let data: Vec<i32> = (0..N as i32).map(|i| i % 8192 - 4096).collect();
    let mut acq = Acquisition::new(Mock::new().with_table(&data), 1.0)?;
    acq.set_trigger("+", 0.0, 0.01, (N / 2) as u32, (N / 2) as u32, 1)?;
    acq.set_decimation(4)?;
    acq.set_average(true)?;
    assert_eq!(acq.shift()?, 2);
    acq.set_input_range(20.0)?;
    assert!(acq.set_input_range(10.0).is_err());
    assert_abs_diff_eq!(acq.input_range(), 20.0);

    acq.control.start()?;
    acq.control.software_trigger()?;
    let samples = acq.read_samples()?;
    assert_abs_diff_eq!(samples[0], -4096.0 / 8191.0 * 20.0);
    assert_eq!(acq.edge()?, Edge::Positive);
    Ok(())
}
