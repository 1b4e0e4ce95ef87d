//! In this example, we will loop the generator into the acquisition channel: play a sine burst on
//! `asg0`, capture it on `acq0` around a software trigger and print what was recorded.

use mercury::prelude::*;
use std::{
    f64::consts::TAU,
    thread,
    time::Duration,
};
use tracing::info;

const SCREEN: u32 = 1024;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let asg = Generator::open(0)?;
    asg.control.reset()?;
    let table: Vec<f64> = (0..N)
        .map(|i| (i as f64 / N as f64 * TAU).sin())
        .collect();
    asg.set_waveform(&table)?;
    asg.set_frequency(1e6)?;
    asg.set_amplitude(0.5)?;
    asg.set_offset(0.0)?;
    asg.set_burst(BurstMode::Infinite, N as u32, 2 * N as u32, 0)?;

    let acq = Acquisition::open(0, 1.0)?;
    acq.control.reset()?;
    acq.set_trigger("pos", 0.0, 0.005, SCREEN / 2, SCREEN / 2, 1)?;
    acq.set_decimation(1)?;
    acq.set_average(false)?;

    asg.control.start()?;
    acq.control.start()?;
    acq.control.software_trigger()?;
    while !acq.control.is_stopped()? {
        thread::sleep(Duration::from_millis(1));
    }
    let ts = acq.timestamps()?;
    info!(
        pre = acq.trigger_pre_status()?,
        post = acq.trigger_post_status()?,
        length = ?ts.total(),
        "Capture finished"
    );

    // Without decimation the buffer advances one slot per tick from slot zero, so the capture ends
    // `stop - acquire` slots in and the trigger sits in the middle of the last screen
    let end = ts.stop.wrapping_sub(ts.acquire) as usize;
    let start = end.wrapping_sub(SCREEN as usize) % N;
    for (i, v) in acq.read_window(start, SCREEN as usize)?.iter().enumerate() {
        println!("{:>10.3e} {v:+.4}", (i as f64 - f64::from(SCREEN / 2)) / FS);
    }

    asg.control.stop()?;
    Ok(())
}
